//! Error types for pdftk.
//!
//! Every fallible operation in the library returns [`PdftkError`]. The
//! variants follow the way failures are reported to the user: command-line
//! mistakes, page ranges that do not fit the document, credential problems,
//! I/O failures and internal invariant violations (bugs).
//!
//! # Error Categories
//!
//! - **Usage Errors**: malformed or contradictory command tokens
//! - **Range Errors**: a page number exceeds the document size
//! - **Credential Errors**: bad or missing input password
//! - **I/O Errors**: file open/write failures
//! - **Internal Errors**: invariant violations, reported with a bug footer

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pdftk operations.
pub type Result<T> = std::result::Result<T, PdftkError>;

/// Which end of a page range failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEndpoint {
    /// The first bound of the range.
    Beginning,
    /// The second bound of the range.
    End,
}

impl std::fmt::Display for RangeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beginning => f.write_str("beginning"),
            Self::End => f.write_str("end"),
        }
    }
}

/// Main error type for pdftk operations.
#[derive(Debug, Error)]
pub enum PdftkError {
    /// Malformed or contradictory command tokens.
    #[error("{message}")]
    Usage {
        /// What was wrong with the command line.
        message: String,
    },

    /// A page number in a range token exceeds the document size.
    #[error(
        "Page range {endpoint} is out of range: {token}\n  \
         The document has {page_count} page(s)"
    )]
    PageOutOfRange {
        /// The endpoint that failed.
        endpoint: RangeEndpoint,
        /// The original range token.
        token: String,
        /// Page count of the referenced document.
        page_count: u32,
    },

    /// The input password is missing or does not open the document.
    #[error("Failed to open PDF file: {}\n  Reason: {reason}", path.display())]
    Credential {
        /// Path of the encrypted input.
        path: PathBuf,
        /// Why authorization failed.
        reason: String,
    },

    /// Input file was not found.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Failed to parse a PDF file.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Output file already exists and the user declined to overwrite it.
    #[error("Output file already exists: {}", path.display())]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Failed to create an output file.
    #[error("Failed to create output file: {}\n  Reason: {source}", path.display())]
    FailedToCreateOutput {
        /// Path where output should be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to write to an output file.
    #[error("Failed to write to output file: {}\n  Reason: {source}", path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Error reported by the PDF object model.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// An internal invariant was violated.
    #[error("Internal Error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// User cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,
}

impl PdftkError {
    /// Create a Usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a PageOutOfRange error.
    pub fn page_out_of_range(endpoint: RangeEndpoint, token: &str, page_count: u32) -> Self {
        Self::PageOutOfRange {
            endpoint,
            token: token.to_string(),
            page_count,
        }
    }

    /// Create a Credential error.
    pub fn credential(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Credential {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileNotFound error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an OutputExists error.
    pub fn output_exists(path: impl Into<PathBuf>) -> Self {
        Self::OutputExists { path: path.into() }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors that indicate a defect rather than bad input.
    ///
    /// The CLI prints a bug-report footer after these.
    pub fn is_bug(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// True when a different password might succeed.
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Credential { .. })
    }

    /// Get the exit code for this error.
    ///
    /// Returns the appropriate process exit code based on error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage { .. } => 1,
            Self::PageOutOfRange { .. } => 1,
            Self::FileNotFound { .. } => 2,
            Self::Credential { .. } => 3,
            Self::FailedToLoadPdf { .. } => 3,
            Self::OutputExists { .. } => 4,
            Self::FailedToCreateOutput { .. } => 5,
            Self::FailedToWrite { .. } => 5,
            Self::Io { .. } => 5,
            Self::Pdf(_) => 6,
            Self::Internal { .. } => 70,
            Self::Cancelled => 130, // Standard exit code for SIGINT
        }
    }
}
