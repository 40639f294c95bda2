#![no_main]

use libfuzzer_sys::fuzz_target;
use pdftk::ops::burst_file_name;
use pdftk::prompt::ScriptedPrompter;
use pdftk::session::Session;

fuzz_target!(|data: &[u8]| {
    let s = std::str::from_utf8(data).unwrap_or("");
    // `-` would block on stdin.
    let tokens: Vec<&str> = s.split_whitespace().filter(|t| *t != "-").collect();

    // PROMPT values get no answers, so parsing must end in a regular error
    // or a session, never a panic or an internal error.
    let mut prompter = ScriptedPrompter::default();
    if let Err(err) = Session::parse(&tokens, &mut prompter) {
        assert!(!err.is_bug(), "internal error for {tokens:?}: {err}");
    }

    if let Some(pattern) = tokens.first() {
        let _ = burst_file_name(pattern, tokens.len());
    }
});
