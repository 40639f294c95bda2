//! PDF writing and saving operations.
//!
//! This module provides PDF writing with:
//! - Atomic writes (write to temp file, then rename)
//! - Output to stdout for `output -`
//! - Stream compression and decompression
//! - RC4 encryption with owner/user passwords and permissions
//! - File identifier handling (`keep_first_id`, `keep_final_id`)
//!
//! # Examples
//!
//! ```no_run
//! use pdftk::io::writer::{OutputTarget, PdfWriter};
//! use lopdf::Document;
//!
//! # async fn example(doc: Document) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = PdfWriter::new();
//! writer.save(doc, &OutputTarget::from_token("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

use lopdf::encryption::{EncryptionState, EncryptionVersion};
use lopdf::{Document, Object, StringFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task;

use crate::config::{Compression, EncryptionStrength, Permissions, STDIO};
use crate::error::{PdftkError, Result};

/// Where a document is written.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum OutputTarget {
    /// Standard output.
    Stdout,
    /// A file on disk.
    File(PathBuf),
}

impl OutputTarget {
    /// Classify an `output` argument; `-` means stdout.
    pub fn from_token(token: &str) -> Self {
        if token == STDIO {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(token))
        }
    }

    /// The file path, unless writing to stdout.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdout => None,
            Self::File(path) => Some(path),
        }
    }

    /// Human-readable name for messages.
    pub fn display_name(&self) -> String {
        match self {
            Self::Stdout => "<stdout>".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Encryption parameters with passwords already resolved.
#[derive(Debug, Clone)]
pub struct EncryptionSettings {
    /// Key strength.
    pub strength: EncryptionStrength,
    /// Owner password (may be empty).
    pub owner_password: String,
    /// User password (may be empty).
    pub user_password: String,
    /// Permissions granted to the user password.
    pub permissions: Permissions,
}

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Use atomic writes (write to temp file, then rename).
    pub atomic: bool,

    /// Stream compression.
    pub compression: Compression,

    /// Renumber objects before writing.
    pub optimize: bool,

    /// Encrypt the output.
    pub encryption: Option<EncryptionSettings>,

    /// Trailer `/ID` to use; a fresh one is generated when `None`.
    pub file_id: Option<Object>,

    /// Buffer size for writing (in bytes).
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            compression: Compression::Unchanged,
            optimize: true,
            encryption: None,
            file_id: None,
            buffer_size: 8192,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to write the file.
    pub write_time: Duration,

    /// Number of bytes written.
    pub file_size: u64,

    /// Where the document was written.
    pub target: OutputTarget,

    /// Whether the output is encrypted.
    pub encrypted: bool,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// PDF writer with configurable behavior.
#[derive(Debug, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a new PDF writer with default options.
    pub fn new() -> Self {
        Self {
            options: WriteOptions::default(),
        }
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Save a PDF document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Encryption setup fails
    /// - Output directory doesn't exist or is not writable
    /// - Write operation fails
    pub async fn save(&self, doc: Document, target: &OutputTarget) -> Result<()> {
        let _stats = self.save_with_stats(doc, target).await?;
        Ok(())
    }

    /// Save a PDF and return statistics about the operation.
    ///
    /// Serialization runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// See [`PdfWriter::save`].
    pub async fn save_with_stats(
        &self,
        doc: Document,
        target: &OutputTarget,
    ) -> Result<WriteStatistics> {
        let options = self.options.clone();
        let target = target.clone();

        task::spawn_blocking(move || write_document(doc, &target, &options))
            .await
            .map_err(|e| PdftkError::internal(format!("Write task failed: {e}")))?
    }

    /// Serialize a document to bytes with this writer's options.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or serialization fails.
    pub fn to_bytes(&self, mut doc: Document) -> Result<Vec<u8>> {
        prepare(&mut doc, &self.options, "")?;
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Check if output file exists.
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }
}

fn write_document(
    mut doc: Document,
    target: &OutputTarget,
    options: &WriteOptions,
) -> Result<WriteStatistics> {
    let start = Instant::now();
    prepare(&mut doc, options, &target.display_name())?;

    let file_size = match target {
        OutputTarget::Stdout => {
            let mut buffer = Vec::new();
            doc.save_to(&mut buffer)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&buffer)?;
            stdout.flush()?;
            buffer.len() as u64
        }
        OutputTarget::File(path) => write_file(&mut doc, path, options)?,
    };

    log::debug!("wrote {} bytes to {}", file_size, target.display_name());

    Ok(WriteStatistics {
        write_time: start.elapsed(),
        file_size,
        target: target.clone(),
        encrypted: options.encryption.is_some(),
    })
}

fn write_file(doc: &mut Document, path: &Path, options: &WriteOptions) -> Result<u64> {
    // Determine write path (temp or final)
    let write_path = if options.atomic {
        path.with_extension("tmp")
    } else {
        path.to_path_buf()
    };

    let file =
        std::fs::File::create(&write_path).map_err(|e| PdftkError::FailedToCreateOutput {
            path: write_path.clone(),
            source: e,
        })?;

    let mut writer = std::io::BufWriter::with_capacity(options.buffer_size, file);

    doc.save_to(&mut writer)
        .map_err(|e| PdftkError::FailedToWrite {
            path: write_path.clone(),
            source: std::io::Error::other(e),
        })?;

    writer.flush().map_err(|e| PdftkError::FailedToWrite {
        path: write_path.clone(),
        source: e,
    })?;
    drop(writer);

    if options.atomic {
        std::fs::rename(&write_path, path).map_err(|e| PdftkError::FailedToWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    Ok(std::fs::metadata(path).map(|m| m.len()).unwrap_or(0))
}

/// Apply compression, identifiers and encryption in the order the
/// security handler needs: the `/ID` feeds key derivation.
fn prepare(doc: &mut Document, options: &WriteOptions, name: &str) -> Result<()> {
    match options.compression {
        Compression::Unchanged => {}
        Compression::Compress => doc.compress(),
        Compression::Uncompress => doc.decompress(),
    }

    if options.optimize {
        doc.prune_objects();
        doc.renumber_objects();
    }

    let id = match &options.file_id {
        Some(id) => id.clone(),
        None => fresh_file_id(doc, name),
    };
    doc.trailer.set("ID", id);

    if let Some(settings) = &options.encryption {
        encrypt(doc, settings)?;
    }
    Ok(())
}

fn encrypt(doc: &mut Document, settings: &EncryptionSettings) -> Result<()> {
    let permissions =
        lopdf::encryption::Permissions::from_bits_truncate(settings.permissions.bits() as _);

    let version = match settings.strength {
        EncryptionStrength::Rc4_40 => EncryptionVersion::V1 {
            document: &*doc,
            owner_password: &settings.owner_password,
            user_password: &settings.user_password,
            permissions,
        },
        EncryptionStrength::Rc4_128 => EncryptionVersion::V2 {
            document: &*doc,
            owner_password: &settings.owner_password,
            user_password: &settings.user_password,
            key_length: settings.strength.key_bits(),
            permissions,
        },
    };

    let state = EncryptionState::try_from(version)
        .map_err(|err| PdftkError::internal(format!("cannot set up encryption: {err}")))?;
    doc.encrypt(&state)
        .map_err(|err| PdftkError::internal(format!("cannot encrypt output: {err}")))?;
    Ok(())
}

/// Two identical MD5 digests of the clock, the output name and the
/// document's stream data.
fn fresh_file_id(doc: &Document, name: &str) -> Object {
    let mut context = md5::Context::new();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    context.consume(nanos.to_be_bytes());
    context.consume(name.as_bytes());
    context.consume(doc.max_id.to_be_bytes());
    for (id, object) in &doc.objects {
        if let Object::Stream(stream) = object {
            context.consume(id.0.to_be_bytes());
            context.consume(&stream.content);
        }
    }

    let digest = context.compute();
    let id = Object::String(digest.0.to_vec(), StringFormat::Hexadecimal);
    Object::Array(vec![id.clone(), id])
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
