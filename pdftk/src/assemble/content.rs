//! Page-level helpers: inherited attributes, resources and content streams.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{PdftkError, Result};
use crate::utils::{as_number, resolve};

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when a page has no usable media box.
const DEFAULT_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Look up `key` on the page or the nearest ancestor that has it.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page dictionary with every inheritable attribute made explicit.
///
/// # Errors
///
/// Returns an internal error if `page_id` is not a dictionary.
pub fn flattened_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|_| PdftkError::internal(format!("page object {page_id:?} is not a dictionary")))?
        .clone();
    for key in INHERITABLE {
        if !page.has(key)
            && let Some(value) = inherited(doc, page_id, key)
        {
            page.set(key.to_vec(), value.clone());
        }
    }
    Ok(page)
}

/// Effective `/Rotate` of a page, inherited if needed.
pub fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(|r| resolve(doc, r).as_i64().ok())
        .unwrap_or(0)
}

/// Set a page's `/Rotate`.
///
/// # Errors
///
/// Returns an internal error if `page_id` is not a dictionary.
pub fn set_rotation(doc: &mut Document, page_id: ObjectId, degrees: i64) -> Result<()> {
    page_mut(doc, page_id)?.set("Rotate", Object::Integer(degrees.rem_euclid(360)));
    Ok(())
}

/// Visible page area: the crop box, or the media box, as
/// `[llx, lly, urx, ury]`.
pub fn page_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .into_iter()
        .find_map(|key| inherited(doc, page_id, key).and_then(|b| rectangle(doc, b)))
        .unwrap_or(DEFAULT_BOX)
}

/// Parse a rectangle array, normalizing the corner order.
pub fn rectangle(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let values = resolve(doc, obj).as_array().ok()?;
    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|v| as_number(resolve(doc, v)))
        .collect();
    match numbers.as_slice() {
        [x1, y1, x2, y2] => Some([x1.min(*x2), y1.min(*y2), x1.max(*x2), y1.max(*y2)]),
        _ => None,
    }
}

/// Mutable page dictionary.
///
/// # Errors
///
/// Returns an internal error if `page_id` is not a dictionary.
pub fn page_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| PdftkError::internal(format!("page object {page_id:?} is not a dictionary")))
}

/// Register `xobject` in the page's `/XObject` resources under a fresh
/// name starting with `prefix`, and return the name.
///
/// The page's resources become a direct dictionary owned by the page, so
/// pages that shared a resource dictionary are not affected.
///
/// # Errors
///
/// Returns an internal error if `page_id` is not a dictionary.
pub fn add_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: &str,
    xobject: ObjectId,
) -> Result<String> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|r| resolve(doc, r).as_dict().ok())
        .cloned()
        .unwrap_or_default();
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve(doc, x).as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let name = (0..)
        .map(|n| format!("{prefix}{n}"))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string());
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject));
    resources.set("XObject", Object::Dictionary(xobjects));

    page_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Add content before and/or after a page's existing content streams.
///
/// The existing content is wrapped in `q`/`Q` so graphics state changes in
/// it cannot leak into content drawn after it.
///
/// # Errors
///
/// Returns an internal error if `page_id` is not a dictionary.
pub fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    before: Option<Vec<u8>>,
    after: Option<Vec<u8>>,
) -> Result<()> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id).ok().and_then(|p| p.get(b"Contents").ok())
    {
        Some(Object::Array(items)) => items.clone(),
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 4);
    if let Some(before) = before {
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), before)),
        ));
    }
    if after.is_some() && !existing.is_empty() {
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec())),
        ));
        contents.extend(existing);
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec())),
        ));
    } else {
        contents.extend(existing);
    }
    if let Some(after) = after {
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), after)),
        ));
    }

    page_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Content that paints a form XObject with the given matrix.
pub fn paint_xobject(name: &str, matrix: [f64; 6]) -> Vec<u8> {
    let [a, b, c, d, e, f] = matrix.map(format_number);
    format!("q {a} {b} {c} {d} {e} {f} cm /{name} Do Q\n").into_bytes()
}

/// Compact decimal rendering for content streams.
fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

/// Matrix that scales `source` to fit inside `target`, centered, keeping
/// the aspect ratio.
pub fn fit_matrix(source: [f64; 4], target: [f64; 4]) -> [f64; 6] {
    let (sw, sh) = (source[2] - source[0], source[3] - source[1]);
    let (tw, th) = (target[2] - target[0], target[3] - target[1]);
    if sw <= 0.0 || sh <= 0.0 {
        return [1.0, 0.0, 0.0, 1.0, target[0], target[1]];
    }

    let scale = (tw / sw).min(th / sh);
    let dx = target[0] + (tw - sw * scale) / 2.0 - source[0] * scale;
    let dy = target[1] + (th - sh * scale) / 2.0 - source[1] * scale;
    [scale, 0.0, 0.0, scale, dx, dy]
}

/// Matrix that maps `source` exactly onto `target`.
pub fn stretch_matrix(source: [f64; 4], target: [f64; 4]) -> [f64; 6] {
    let (sw, sh) = (source[2] - source[0], source[3] - source[1]);
    let sx = if sw > 0.0 { (target[2] - target[0]) / sw } else { 1.0 };
    let sy = if sh > 0.0 { (target[3] - target[1]) / sh } else { 1.0 };
    [sx, 0.0, 0.0, sy, target[0] - source[0] * sx, target[1] - source[1] * sy]
}
