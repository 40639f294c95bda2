//! Message formatting and display.
//!
//! Every message goes to stderr; stdout is reserved for PDF output and
//! reports written to `-`.
//!
//! # Examples
//!
//! ```
//! use pdftk::output::formatter::{OutputFormatter, MessageLevel};
//!
//! let formatter = OutputFormatter::new(false);
//! formatter.warning("Missing InfoValue in record");
//! formatter.error("Unable to open input file");
//! ```

use crate::config::GlobalConfig;
use std::io::{self, Write};

/// Level of output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Informational message.
    Info,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
    /// Debug/verbose message.
    Debug,
}

/// Output formatter with configurable verbosity.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    /// Whether to show verbose output.
    verbose: bool,
    /// Whether to use colored output.
    colored: bool,
}

impl OutputFormatter {
    /// Create a new output formatter.
    ///
    /// # Arguments
    ///
    /// * `verbose` - Show informational and debug output
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            colored: Self::should_use_color(),
        }
    }

    /// Create a formatter from the pre-scanned global flags.
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.verbose)
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self::new(true)
    }

    /// Returns true if stderr is a TTY and TERM is set.
    fn should_use_color() -> bool {
        use std::io::IsTerminal;
        io::stderr().is_terminal() && std::env::var("TERM").is_ok()
    }

    /// Print an informational message.
    ///
    /// Only displayed in verbose mode; a successful run is silent.
    pub fn info(&self, message: &str) {
        if self.verbose {
            self.print_message(MessageLevel::Info, message);
        }
    }

    /// Print a warning message. Always displayed.
    pub fn warning(&self, message: &str) {
        self.print_message(MessageLevel::Warning, message);
    }

    /// Print an error message. Always displayed.
    pub fn error(&self, message: &str) {
        self.print_message(MessageLevel::Error, message);
    }

    /// Print a debug/verbose message.
    ///
    /// Only displayed in verbose mode.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            self.print_message(MessageLevel::Debug, message);
        }
    }

    fn print_message(&self, level: MessageLevel, message: &str) {
        let (prefix, color_code) = match level {
            MessageLevel::Info => ("", ""),
            MessageLevel::Warning => ("Warning: ", "\x1b[33m"), // Yellow
            MessageLevel::Error => ("Error: ", "\x1b[31m"),     // Red
            MessageLevel::Debug => ("", "\x1b[36m"),            // Cyan
        };

        let reset = "\x1b[0m";
        let mut stderr = io::stderr().lock();

        if self.colored && !color_code.is_empty() {
            writeln!(stderr, "{color_code}{prefix}{message}{reset}").ok();
        } else {
            writeln!(stderr, "{prefix}{message}").ok();
        }
    }

    /// Print a section header. Only shown in verbose mode.
    pub fn section(&self, title: &str) {
        if self.verbose {
            eprintln!("\n{title}");
        }
    }

    /// Print one labelled value. Only shown in verbose mode.
    ///
    /// # Arguments
    ///
    /// * `label` - Label for the information
    /// * `value` - Value to display
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            eprintln!("  {label}: {value}");
        }
    }

    /// Print the footer shown after an internal error.
    pub fn bug_footer(&self) {
        self.error(&format!(
            "this is a bug in {} {}. Please report it together with the \
             command line (without passwords) that triggered it.",
            crate::NAME,
            crate::VERSION
        ));
    }

    /// Check if verbose output should be shown.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AskMode;

    #[test]
    fn test_new_formatter() {
        let formatter = OutputFormatter::new(false);
        assert!(!formatter.is_verbose());
    }

    #[test]
    fn test_from_config() {
        let config = GlobalConfig {
            ask: AskMode::DontAsk,
            verbose: true,
        };
        assert!(OutputFormatter::from_config(&config).is_verbose());
    }

    #[test]
    fn test_messages_do_not_panic() {
        let formatter = OutputFormatter::verbose();
        formatter.info("Reading input");
        formatter.warning("Duplicate InfoKey");
        formatter.error("Unable to open file");
        formatter.debug("session dump");
        formatter.section("Session");
        formatter.detail("Operation", "cat");
    }

    #[test]
    fn test_message_levels() {
        assert_eq!(MessageLevel::Info, MessageLevel::Info);
        assert_ne!(MessageLevel::Info, MessageLevel::Error);
    }
}
