//! Interactive questions.
//!
//! Prompts are the only place pdftk blocks on the user: the `PROMPT`
//! sentinel for filenames and passwords, password retries in `do_ask`
//! mode, and overwrite confirmation. Questions go to stderr so stdout
//! stays clean for `output -`.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::error::{PdftkError, Result};

/// Source of answers to interactive questions.
pub trait Prompter {
    /// Ask a question and return the answer without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`PdftkError::Cancelled`] when input is closed.
    fn ask(&mut self, question: &str) -> Result<String>;

    /// Ask a yes/no question; anything but `y`/`yes` means no.
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{question} [y/N]: "))?;
        let answer = answer.trim().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Prompter reading answers from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl StdinPrompter {
    /// Create a new stdin prompter.
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{question}")?;
        stderr.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(PdftkError::Cancelled);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Prompter that replays a fixed list of answers.
///
/// Useful for scripted runs and tests; asking past the end of the list
/// behaves like closed input.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    questions: Vec<String>,
}

impl ScriptedPrompter {
    /// Create a prompter with the given answers.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }

    /// Questions asked so far.
    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or(PdftkError::Cancelled)
    }
}
