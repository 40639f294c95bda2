//! pdftk - Merge, split, rotate, encrypt, stamp and inspect PDF documents.
//!
//! This library implements the pdftk command language. It supports:
//!
//! - Page assembly: `cat`, `shuffle`, `burst` and `rotate` with handles,
//!   page ranges, qualifiers and rotations
//! - Filters: form filling, metadata updates, attachments, backgrounds and
//!   stamps
//! - Reports: `dump_data`, `dump_data_fields`, `dump_data_annots` and FDF
//!   generation
//! - Output options: encryption, permissions, compression, flattening and
//!   file identifiers
//!
//! # Examples
//!
//! ## Running a command
//!
//! ```no_run
//! use pdftk::prompt::StdinPrompter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tokens = ["A=in.pdf", "cat", "A1-3", "A5east", "output", "out.pdf"];
//! pdftk::ops::run(&tokens, &mut StdinPrompter::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Inspecting a parsed session
//!
//! ```no_run
//! use pdftk::prompt::ScriptedPrompter;
//! use pdftk::session::Session;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tokens = ["a.pdf", "b.pdf", "shuffle", "output", "-"];
//! let session = Session::parse(&tokens, &mut ScriptedPrompter::default())?;
//! println!("{} output pages", session.output_page_count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod config;
pub mod error;
pub mod io;
pub mod ops;
pub mod output;
pub mod pages;
pub mod prompt;
pub mod report;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use config::{GlobalConfig, OutputOptions};
pub use error::{PdftkError, Result};
pub use session::{Operation, Session};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
