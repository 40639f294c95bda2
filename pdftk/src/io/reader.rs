//! PDF reading and loading operations.
//!
//! [`PdfReader`] turns an input source (a path, or `-` for stdin) into an
//! opened, decrypted [`lopdf::Document`]. Source bytes are cached so a
//! document can be opened several times (the reader pool opens one copy
//! per reader instance) and stdin only has to be read once.
//!
//! # Examples
//!
//! ```no_run
//! use pdftk::io::reader::PdfReader;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = PdfReader::new();
//! let loaded = reader.load("input.pdf", None)?;
//! println!("{} pages", loaded.page_count);
//! # Ok(())
//! # }
//! ```

use lopdf::{Document, Object};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use crate::config::STDIO;
use crate::error::{PdftkError, Result};

/// A loaded PDF document with metadata.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document, decrypted if it was encrypted.
    pub document: Document,

    /// Source the document was read from.
    pub source: String,

    /// Number of pages in the document.
    pub page_count: u32,

    /// Whether the file carried an encryption dictionary.
    pub encrypted: bool,

    /// File size in bytes.
    pub file_size: u64,
}

/// Reads input sources and opens them as PDF documents.
#[derive(Debug, Default)]
pub struct PdfReader {
    cache: HashMap<String, Arc<Vec<u8>>>,
}

impl PdfReader {
    /// Create a new reader with an empty source cache.
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Read the raw bytes of a source, caching them for later opens.
    ///
    /// # Arguments
    ///
    /// * `source` - a file path, or `-` for stdin
    ///
    /// # Errors
    ///
    /// Returns [`PdftkError::FileNotFound`] for missing files and
    /// [`PdftkError::Io`] for other read failures.
    pub fn read_bytes(&mut self, source: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(bytes) = self.cache.get(source) {
            return Ok(Arc::clone(bytes));
        }

        let bytes = if source == STDIO {
            let mut buffer = Vec::new();
            io::stdin().lock().read_to_end(&mut buffer)?;
            buffer
        } else {
            std::fs::read(source).map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => PdftkError::file_not_found(source),
                _ => PdftkError::Io { source: err },
            })?
        };

        log::debug!("read {} bytes from {source}", bytes.len());
        let bytes = Arc::new(bytes);
        self.cache.insert(source.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Load and, if needed, decrypt a PDF document.
    ///
    /// # Arguments
    ///
    /// * `source` - a file path, or `-` for stdin
    /// * `password` - owner or user password for encrypted inputs
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The source cannot be read
    /// - The bytes are not a PDF
    /// - The document is encrypted and the password does not open it
    pub fn load(&mut self, source: &str, password: Option<&str>) -> Result<LoadedPdf> {
        let bytes = self.read_bytes(source)?;
        let mut document = Document::load_mem(&bytes)
            .map_err(|err| PdftkError::failed_to_load_pdf(source, err.to_string()))?;

        let encrypted = document.is_encrypted();
        if encrypted {
            document = if document.encryption_state.is_some() {
                // lopdf opened it with the empty user password while parsing.
                if let Some(password) = password.filter(|pw| !pw.is_empty()) {
                    document.authenticate_password(password).map_err(|err| {
                        PdftkError::credential(
                            source,
                            format!("the input password is not correct ({err})"),
                        )
                    })?;
                }
                strip_encryption(&mut document);
                document
            } else {
                decrypt_with_password(source, &bytes, &document, password)?
            };
            log::debug!("decrypted {source}");
        }

        let page_count = document.get_pages().len();
        if encrypted && page_count == 0 {
            return Err(PdftkError::credential(
                source,
                "the document has no readable pages after decryption",
            ));
        }
        let page_count = u32::try_from(page_count)
            .map_err(|_| PdftkError::failed_to_load_pdf(source, "too many pages"))?;

        Ok(LoadedPdf {
            document,
            source: source.to_string(),
            page_count,
            encrypted,
            file_size: bytes.len() as u64,
        })
    }

    /// Check whether a source can be read without loading it.
    pub fn exists(source: &str) -> bool {
        source == STDIO || Path::new(source).is_file()
    }
}

/// Trailer key and object stream type, renamed in place so lopdf parses an
/// encrypted file like a plain one. Replacements keep every byte offset.
const ENCRYPT_KEY: (&[u8], &[u8]) = (b"/Encrypt", b"/Encryp_");
const OBJECT_STREAM_TYPE: (&[u8], &[u8]) = (b"/ObjStm", b"/ObjSt_");

/// Open a document whose user password is not empty.
///
/// lopdf only decrypts during parsing when the empty user password works,
/// and otherwise leaves the objects unparsed. The file is parsed again with
/// the encryption entry hidden, then decrypted with `password`. The file
/// key of RC4 and AES-128 handlers derives from the user password, so an
/// owner password alone is refused.
fn decrypt_with_password(
    source: &str,
    bytes: &[u8],
    encrypted: &Document,
    password: Option<&str>,
) -> Result<Document> {
    let Some(password) = password.filter(|pw| !pw.is_empty()) else {
        return Err(PdftkError::credential(
            source,
            "an owner or user password is required",
        ));
    };
    if encrypted.authenticate_user_password(password).is_err() {
        let reason = if encrypted.authenticate_owner_password(password).is_ok() {
            "this file needs its user password to be decrypted"
        } else {
            "the input password is not correct"
        };
        return Err(PdftkError::credential(source, reason));
    }

    let mut masked = bytes.to_vec();
    replace_name(&mut masked, ENCRYPT_KEY.0, ENCRYPT_KEY.1);
    replace_name(&mut masked, OBJECT_STREAM_TYPE.0, OBJECT_STREAM_TYPE.1);
    let mut document = Document::load_mem(&masked)
        .map_err(|err| PdftkError::failed_to_load_pdf(source, err.to_string()))?;

    let hidden = &ENCRYPT_KEY.1[1..];
    if let Ok(reference) = document.trailer.get(hidden).cloned() {
        document.trailer.remove(hidden);
        document.trailer.set("Encrypt", reference);
    }
    for object in document.objects.values_mut() {
        if let Object::Stream(stream) = object
            && stream.dict.has_type(&OBJECT_STREAM_TYPE.1[1..])
        {
            stream.dict.set("Type", Object::Name(b"ObjStm".to_vec()));
        }
    }

    document.decrypt(password).map_err(|err| {
        PdftkError::credential(source, format!("the input password is not correct ({err})"))
    })?;
    Ok(document)
}

/// Rename every PDF name `from` (same length as `to`) that ends at a
/// delimiter.
fn replace_name(bytes: &mut [u8], from: &[u8], to: &[u8]) {
    let mut index = 0;
    while index + from.len() <= bytes.len() {
        let ends_name = bytes
            .get(index + from.len())
            .is_none_or(|next| !next.is_ascii_alphanumeric());
        if &bytes[index..index + from.len()] == from && ends_name {
            bytes[index..index + from.len()].copy_from_slice(to);
            index += from.len();
        } else {
            index += 1;
        }
    }
}

/// Drop the encryption dictionary of a document lopdf already decrypted.
fn strip_encryption(document: &mut Document) {
    if let Some(Object::Reference(id)) = document.trailer.remove(b"Encrypt") {
        document.objects.remove(&id);
    }
}
