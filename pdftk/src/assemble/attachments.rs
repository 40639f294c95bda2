//! Embedded files: attaching at document or page level, and extracting.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::Path;

use super::content::{page_box, page_mut};
use crate::error::{PdftkError, Result};
use crate::report::encoding::{decode_object, encode_text};
use crate::utils::{get_array, get_dict, resolve};

/// A named file payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name without directories.
    pub name: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Build an attachment named after the last component of `path`.
    pub fn from_path(path: &str, data: Vec<u8>) -> Self {
        Self {
            name: file_name(path),
            data,
        }
    }
}

/// Last path component, or the whole string if it has none.
fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Embed `files` in the document.
///
/// Without a page they go into the `/EmbeddedFiles` name tree; with one
/// each becomes a file attachment annotation on that page, stacked down
/// the left margin.
///
/// # Errors
///
/// Returns a usage error if `to_page` is past the end of the document.
pub fn attach_files(doc: &mut Document, files: &[Attachment], to_page: Option<u32>) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }

    match to_page {
        None => attach_to_document(doc, files),
        Some(page) => {
            let page_id = doc.get_pages().get(&page).copied().ok_or_else(|| {
                PdftkError::usage(format!(
                    "Attachment page number {page} is out of range; the document has {} page(s)",
                    doc.get_pages().len()
                ))
            })?;
            attach_to_page(doc, files, page_id)
        }
    }
}

fn file_spec(doc: &mut Document, file: &Attachment) -> ObjectId {
    let stream = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Params" => dictionary! { "Size" => file.data.len() as i64 },
        },
        file.data.clone(),
    ));
    doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(file.name.as_str()),
        "UF" => encode_text(&file.name),
        "EF" => dictionary! { "F" => stream },
    })
}

fn attach_to_document(doc: &mut Document, files: &[Attachment]) -> Result<()> {
    let catalog = doc.catalog()?;
    let mut names = get_dict(doc, catalog, b"Names").cloned().unwrap_or_default();

    let mut entries: Vec<(Vec<u8>, Object)> = Vec::new();
    if let Some(tree) = get_dict(doc, &names, b"EmbeddedFiles") {
        collect_name_tree(doc, tree, &mut entries, 0);
    }

    for file in files {
        let spec = file_spec(doc, file);
        let key = encode_text(&file.name);
        let Object::String(key_bytes, _) = &key else {
            continue;
        };
        entries.retain(|(existing, _)| existing != key_bytes);
        entries.push((key_bytes.clone(), Object::Reference(spec)));
        log::debug!("attached {} ({} bytes) to the document", file.name, file.data.len());
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let flat: Vec<Object> = entries
        .into_iter()
        .flat_map(|(key, value)| [Object::String(key, lopdf::StringFormat::Literal), value])
        .collect();
    let tree = doc.add_object(dictionary! { "Names" => flat });
    names.set("EmbeddedFiles", Object::Reference(tree));
    doc.catalog_mut()?.set("Names", Object::Dictionary(names));
    Ok(())
}

fn collect_name_tree(doc: &Document, node: &Dictionary, out: &mut Vec<(Vec<u8>, Object)>, depth: usize) {
    if depth > 32 {
        return;
    }
    if let Some(pairs) = get_array(doc, node, b"Names") {
        for pair in pairs.chunks(2) {
            if let [key, value] = pair
                && let Object::String(key, _) = resolve(doc, key)
            {
                out.push((key.clone(), value.clone()));
            }
        }
    }
    if let Some(kids) = get_array(doc, node, b"Kids") {
        for kid in kids {
            if let Ok(kid) = resolve(doc, kid).as_dict() {
                collect_name_tree(doc, kid, out, depth + 1);
            }
        }
    }
}

fn attach_to_page(doc: &mut Document, files: &[Attachment], page_id: ObjectId) -> Result<()> {
    let [llx, _, _, ury] = page_box(doc, page_id);
    let mut annots: Vec<Object> = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| get_array(doc, page, b"Annots"))
        .cloned()
        .unwrap_or_default();

    for (slot, file) in files.iter().enumerate() {
        let spec = file_spec(doc, file);
        let top = ury - 36.0 - 24.0 * slot as f64;
        let left = llx + 18.0;
        let annot = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "FileAttachment",
            "Rect" => vec![
                Object::Real(left as f32),
                Object::Real((top - 20.0) as f32),
                Object::Real((left + 14.0) as f32),
                Object::Real(top as f32),
            ],
            "FS" => spec,
            "Contents" => encode_text(&file.name),
            "Name" => "PushPin",
            "P" => page_id,
        });
        annots.push(Object::Reference(annot));
        log::debug!("attached {} to page object {page_id:?}", file.name);
    }

    page_mut(doc, page_id)?.set("Annots", Object::Array(annots));
    Ok(())
}

/// Every embedded file: the document name tree first, then page
/// attachment annotations in page order.
pub fn embedded_files(doc: &Document) -> Vec<Attachment> {
    let mut specs: Vec<&Object> = Vec::new();

    let mut entries = Vec::new();
    if let Ok(catalog) = doc.catalog()
        && let Some(names) = get_dict(doc, catalog, b"Names")
        && let Some(tree) = get_dict(doc, names, b"EmbeddedFiles")
    {
        collect_name_tree(doc, tree, &mut entries, 0);
    }
    let mut files: Vec<Attachment> = entries
        .iter()
        .filter_map(|(_, spec)| extract(doc, spec))
        .collect();

    for page_id in doc.get_pages().values() {
        let Ok(page) = doc.get_dictionary(*page_id) else {
            continue;
        };
        let Some(annots) = get_array(doc, page, b"Annots") else {
            continue;
        };
        for annot in annots {
            let Ok(annot) = resolve(doc, annot).as_dict() else {
                continue;
            };
            let is_attachment = annot
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|s| s == b"FileAttachment");
            if is_attachment && let Ok(spec) = annot.get(b"FS") {
                specs.push(spec);
            }
        }
    }
    files.extend(specs.into_iter().filter_map(|spec| extract(doc, spec)));
    files
}

fn extract(doc: &Document, spec: &Object) -> Option<Attachment> {
    let spec = resolve(doc, spec).as_dict().ok()?;
    let name = [b"UF".as_slice(), b"F"]
        .into_iter()
        .find_map(|key| spec.get(key).ok())
        .map(|n| decode_object(resolve(doc, n)))?;

    let ef = get_dict(doc, spec, b"EF")?;
    let stream_ref = ef.get(b"F").or_else(|_| ef.get(b"UF")).ok()?;
    let stream = resolve(doc, stream_ref).as_stream().ok()?;
    let data = if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone())
    } else {
        stream.content.clone()
    };

    Some(Attachment {
        name: file_name(&name),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fields::tests::form_document;

    fn files() -> Vec<Attachment> {
        vec![
            Attachment::from_path("/tmp/notes/b.txt", b"second".to_vec()),
            Attachment::from_path("a.bin", vec![0, 159, 255]),
        ]
    }

    #[test]
    fn test_attach_to_document_then_extract() {
        let mut doc = form_document();
        attach_files(&mut doc, &files(), None).unwrap();

        let found = embedded_files(&doc);
        assert_eq!(found.len(), 2);
        // Name tree keys are sorted.
        assert_eq!(found[0].name, "a.bin");
        assert_eq!(found[0].data, vec![0, 159, 255]);
        assert_eq!(found[1].name, "b.txt");
    }

    #[test]
    fn test_attach_keeps_existing_entries() {
        let mut doc = form_document();
        attach_files(&mut doc, &files()[..1], None).unwrap();
        attach_files(&mut doc, &files()[1..], None).unwrap();
        assert_eq!(embedded_files(&doc).len(), 2);
    }

    #[test]
    fn test_attach_to_page_adds_annotations() {
        let mut doc = form_document();
        attach_files(&mut doc, &files(), Some(1)).unwrap();

        let page_id = doc.get_pages()[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        let annots = page.get(b"Annots").unwrap().as_array().unwrap();
        // Three widgets plus two attachments.
        assert_eq!(annots.len(), 5);

        let found = embedded_files(&doc);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].data, b"second".to_vec());
    }

    #[test]
    fn test_attach_to_missing_page() {
        let mut doc = form_document();
        let err = attach_files(&mut doc, &files(), Some(4)).unwrap_err();
        assert!(matches!(err, PdftkError::Usage { .. }));
    }

    #[test]
    fn test_extract_strips_directories() {
        let mut doc = form_document();
        let sneaky = Attachment {
            name: "../../etc/passwd".to_string(),
            data: b"x".to_vec(),
        };
        attach_files(&mut doc, &[sneaky], None).unwrap();
        assert_eq!(embedded_files(&doc)[0].name, "passwd");
    }
}
