//! Reading inputs and writing outputs.
//!
//! - [`reader`] opens sources (files or stdin) as decrypted documents
//! - [`pool`] keeps independent reader instances per input
//! - [`writer`] serializes, encrypts and writes the result

pub mod pool;
pub mod reader;
pub mod writer;

pub use pool::{InputDocument, ReaderId, ReaderInstance, ReaderPool};
pub use reader::{LoadedPdf, PdfReader};
pub use writer::{EncryptionSettings, OutputTarget, PdfWriter, WriteOptions, WriteStatistics};
