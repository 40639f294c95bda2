//! Forms Data Format: generating FDF from a form and reading FDF values.
//!
//! FDF files use PDF object syntax behind a `%FDF-` header. They are read
//! and written with lopdf by swapping the header.

use lopdf::{Dictionary, Document, Object, dictionary};

use super::encoding::{decode_object, encode_text};
use super::fields::{FieldKind, FieldNode, read_fields};
use crate::error::{PdftkError, Result};
use crate::utils::{get_array, get_dict, resolve};

/// A value to put into a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdfValue {
    /// Text (string object).
    Text(String),
    /// Button state (name object).
    State(String),
    /// Several selected choices.
    List(Vec<String>),
}

/// Field values read from an FDF file, keyed by full field name.
#[derive(Debug, Clone, Default)]
pub struct FdfData {
    /// `(full name, value)` pairs in file order.
    pub values: Vec<(String, FdfValue)>,
}

impl FdfData {
    /// Parse FDF bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PdftkError::FailedToLoadPdf`] if the data is not FDF.
    pub fn parse(source: &str, bytes: &[u8]) -> Result<Self> {
        let body = bytes
            .strip_prefix(b"%FDF")
            .ok_or_else(|| PdftkError::failed_to_load_pdf(source, "missing %FDF header"))?;
        let mut as_pdf = Vec::with_capacity(bytes.len());
        as_pdf.extend_from_slice(b"%PDF");
        as_pdf.extend_from_slice(body);

        let doc = Document::load_mem(&as_pdf)
            .map_err(|err| PdftkError::failed_to_load_pdf(source, err.to_string()))?;

        let fields = doc
            .trailer
            .get(b"Root")
            .ok()
            .and_then(|root| resolve(&doc, root).as_dict().ok())
            .and_then(|root| get_dict(&doc, root, b"FDF"))
            .and_then(|fdf| get_array(&doc, fdf, b"Fields"))
            .ok_or_else(|| {
                PdftkError::failed_to_load_pdf(source, "FDF data has no /FDF /Fields array")
            })?;

        let mut data = Self::default();
        for field in fields {
            collect_values(&doc, field, "", &mut data.values, 0);
        }
        Ok(data)
    }

    /// Value for a full field name.
    pub fn get(&self, name: &str) -> Option<&FdfValue> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

fn collect_values(
    doc: &Document,
    obj: &Object,
    parent: &str,
    out: &mut Vec<(String, FdfValue)>,
    depth: usize,
) {
    if depth > 64 {
        return;
    }
    let Ok(dict) = resolve(doc, obj).as_dict() else {
        return;
    };

    let partial = dict
        .get(b"T")
        .map(|t| decode_object(resolve(doc, t)))
        .unwrap_or_default();
    let name = match (parent.is_empty(), partial.is_empty()) {
        (true, _) => partial,
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}.{partial}"),
    };

    if let Ok(value) = dict.get(b"V") {
        let value = match resolve(doc, value) {
            Object::Name(state) => Some(FdfValue::State(String::from_utf8_lossy(state).into_owned())),
            Object::Array(items) => Some(FdfValue::List(
                items
                    .iter()
                    .map(|item| decode_object(resolve(doc, item)))
                    .collect(),
            )),
            obj @ Object::String(..) => Some(FdfValue::Text(decode_object(obj))),
            _ => None,
        };
        if let Some(value) = value {
            out.push((name.clone(), value));
        }
    }

    if let Some(kids) = get_array(doc, dict, b"Kids") {
        for kid in kids {
            collect_values(doc, kid, &name, out, depth + 1);
        }
    }
}

/// Build an FDF document mirroring the form's field hierarchy.
///
/// Every named field appears; terminal fields carry their current value
/// (an empty string when unset).
///
/// # Errors
///
/// Returns an error if the FDF cannot be serialized.
pub fn generate_fdf(doc: &Document) -> Result<Vec<u8>> {
    let mut fdf = Document::with_version("1.2");
    let fields: Vec<Object> = read_fields(doc).iter().map(fdf_field).collect();

    let catalog = fdf.add_object(dictionary! {
        "FDF" => dictionary! { "Fields" => fields },
    });
    fdf.trailer.set("Root", Object::Reference(catalog));

    let mut bytes = Vec::new();
    fdf.save_to(&mut bytes)?;
    if bytes.starts_with(b"%PDF") {
        bytes[..4].copy_from_slice(b"%FDF");
    }
    Ok(bytes)
}

fn fdf_field(node: &FieldNode) -> Object {
    let mut dict = Dictionary::new();
    dict.set("T", encode_text(&node.partial_name));

    if node.is_terminal() {
        let value = match (node.kind, node.value.as_slice()) {
            (Some(FieldKind::Button), [state]) => Object::Name(state.as_bytes().to_vec()),
            (_, [single]) => encode_text(single),
            (_, []) => encode_text(""),
            (_, many) => Object::Array(many.iter().map(|v| encode_text(v)).collect()),
        };
        dict.set("V", value);
    } else {
        dict.set(
            "Kids",
            Object::Array(node.children.iter().map(fdf_field).collect()),
        );
    }
    Object::Dictionary(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fields::tests::form_document;

    #[test]
    fn test_generate_fdf_has_header_and_values() {
        let doc = form_document();
        let bytes = generate_fdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%FDF-1.2"));

        let data = FdfData::parse("generated.fdf", &bytes).unwrap();
        assert_eq!(data.get("name"), Some(&FdfValue::Text("Ada".to_string())));
        assert_eq!(data.get("agree"), Some(&FdfValue::State("Off".to_string())));
        assert_eq!(data.get("address.city"), Some(&FdfValue::Text(String::new())));
    }

    #[test]
    fn test_parse_rejects_pdf_header() {
        let err = FdfData::parse("x.pdf", b"%PDF-1.5\n").unwrap_err();
        assert!(matches!(err, PdftkError::FailedToLoadPdf { .. }));
    }
}
