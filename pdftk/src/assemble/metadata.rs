//! Document Info dictionary and trailer identifier helpers.

use lopdf::{Dictionary, Document, Object};

use crate::error::{PdftkError, Result};
use crate::utils::resolve;

/// The document's Info dictionary, if it has one.
pub fn info(doc: &Document) -> Option<&Dictionary> {
    let obj = doc.trailer.get(b"Info").ok()?;
    resolve(doc, obj).as_dict().ok()
}

/// The Info dictionary, created and linked from the trailer if missing.
///
/// # Errors
///
/// Returns an internal error if the new dictionary cannot be reached
/// after it was inserted.
pub fn info_mut(doc: &mut Document) -> Result<&mut Dictionary> {
    let info_id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) if doc.get_dictionary(id).is_ok() => id,
        _ => {
            // Inline Info dictionaries are moved into an indirect object.
            let existing = match doc.trailer.get(b"Info") {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            };
            let id = doc.add_object(existing);
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };

    doc.get_object_mut(info_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| PdftkError::internal("Info dictionary disappeared while updating it"))
}

/// Copy the string entries of `source`'s Info dictionary into `target`.
///
/// # Errors
///
/// Returns an error if the target Info dictionary cannot be created.
pub fn copy_info(target: &mut Document, source: &Document) -> Result<()> {
    let Some(source_info) = info(source) else {
        return Ok(());
    };

    let entries: Vec<(Vec<u8>, Object)> = source_info
        .iter()
        .filter_map(|(key, value)| match resolve(source, value) {
            obj @ Object::String(..) => Some((key.clone(), obj.clone())),
            _ => None,
        })
        .collect();

    if entries.is_empty() {
        return Ok(());
    }
    let target_info = info_mut(target)?;
    for (key, value) in entries {
        target_info.set(key, value);
    }
    Ok(())
}

/// The trailer `/ID` array, if present and well formed.
pub fn file_id(doc: &Document) -> Option<(Vec<u8>, Vec<u8>)> {
    let ids = doc.trailer.get(b"ID").ok()?;
    let ids = resolve(doc, ids).as_array().ok()?;
    match ids.as_slice() {
        [Object::String(first, _), Object::String(second, _)] => {
            Some((first.clone(), second.clone()))
        }
        _ => None,
    }
}

/// Lowercase hex rendering of an identifier.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
