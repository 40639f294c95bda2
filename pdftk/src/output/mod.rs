//! User-facing diagnostics.
//!
//! # Examples
//!
//! ```
//! use pdftk::output::OutputFormatter;
//! use pdftk::config::GlobalConfig;
//!
//! let formatter = OutputFormatter::from_config(&GlobalConfig::default());
//! formatter.warning("Unexpected data in update_info file");
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use crate::error::PdftkError;
use crate::io::writer::WriteStatistics;

/// Print a fatal error, followed by the bug footer for internal errors.
pub fn display_error(formatter: &OutputFormatter, err: &PdftkError) {
    formatter.error(&err.to_string());
    if err.is_bug() {
        formatter.bug_footer();
    } else if matches!(err, PdftkError::Usage { .. } | PdftkError::PageOutOfRange { .. }) {
        formatter.error("No output created.");
    }
}

/// Print warnings collected while reading auxiliary input.
pub fn display_warnings(formatter: &OutputFormatter, warnings: &[String]) {
    for warning in warnings {
        formatter.warning(warning);
    }
}

/// Display write statistics in verbose mode.
pub fn display_write_statistics(formatter: &OutputFormatter, stats: &WriteStatistics) {
    formatter.info(&format!(
        "Wrote {} in {:.2}s: {}{}",
        stats.target.display_name(),
        stats.write_time.as_secs_f64(),
        stats.format_file_size(),
        if stats.encrypted { " (encrypted)" } else { "" }
    ));
}
