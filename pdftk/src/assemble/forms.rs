//! Form filling, flattening and form-related output options.

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::content::{add_xobject, paint_xobject, rectangle, stretch_matrix, wrap_contents};
use crate::error::Result;
use crate::report::encoding::encode_text;
use crate::report::fdf::{FdfData, FdfValue};
use crate::report::fields::{FieldKind, all_fields, read_fields};
use crate::utils::{get_array, get_dict, resolve};

/// Widget annotation flag: hidden.
const HIDDEN: i64 = 1 << 1;

/// Outcome of [`fill_form`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FillReport {
    /// Number of fields that received a value.
    pub filled: usize,
    /// FDF field names with no matching field in the document.
    pub unmatched: Vec<String>,
}

struct Target {
    id: ObjectId,
    kind: Option<FieldKind>,
    widgets: Vec<ObjectId>,
}

/// Set field values from FDF data.
///
/// Text and choice fields get their `/V`; buttons get a state name and
/// matching `/AS` on their widgets. The form is marked so viewers rebuild
/// the appearance of filled text.
///
/// # Errors
///
/// Returns an error if the document has no catalog.
pub fn fill_form(doc: &mut Document, data: &FdfData) -> Result<FillReport> {
    let roots = read_fields(doc);
    let fields: Vec<(String, Target)> = all_fields(&roots)
        .into_iter()
        .filter_map(|node| {
            node.id.map(|id| {
                (
                    node.full_name.clone(),
                    Target {
                        id,
                        kind: node.kind,
                        widgets: node.widgets.clone(),
                    },
                )
            })
        })
        .collect();

    let mut report = FillReport::default();
    let mut text_changed = false;

    for (name, value) in &data.values {
        let Some((_, target)) = fields.iter().find(|(full_name, _)| full_name == name) else {
            log::debug!("no form field named {name}");
            report.unmatched.push(name.clone());
            continue;
        };

        match target.kind {
            Some(FieldKind::Button) => {
                let state = match value {
                    FdfValue::State(s) | FdfValue::Text(s) => s.clone(),
                    FdfValue::List(items) => items.first().cloned().unwrap_or_default(),
                };
                set_button(doc, target, &state);
            }
            _ => {
                let pdf_value = match value {
                    FdfValue::Text(s) | FdfValue::State(s) => encode_text(s),
                    FdfValue::List(items) => {
                        Object::Array(items.iter().map(|item| encode_text(item)).collect())
                    }
                };
                if let Ok(field) = doc.get_object_mut(target.id).and_then(Object::as_dict_mut) {
                    field.set("V", pdf_value);
                }
                text_changed = true;
            }
        }
        report.filled += 1;
    }

    if text_changed {
        need_appearances(doc)?;
    }
    log::debug!(
        "filled {} field(s), {} unmatched",
        report.filled,
        report.unmatched.len()
    );
    Ok(report)
}

fn set_button(doc: &mut Document, target: &Target, state: &str) {
    if let Ok(field) = doc.get_object_mut(target.id).and_then(Object::as_dict_mut) {
        field.set("V", Object::Name(state.as_bytes().to_vec()));
    }

    for widget_id in &target.widgets {
        let has_state = doc
            .get_dictionary(*widget_id)
            .ok()
            .and_then(|w| get_dict(doc, w, b"AP"))
            .and_then(|ap| get_dict(doc, ap, b"N"))
            .is_some_and(|normal| normal.has(state.as_bytes()));
        let appearance = if has_state { state } else { "Off" };
        if let Ok(widget) = doc.get_object_mut(*widget_id).and_then(Object::as_dict_mut) {
            widget.set("AS", Object::Name(appearance.as_bytes().to_vec()));
        }
    }
}

/// Mutable AcroForm dictionary, wherever the catalog keeps it.
fn acroform_mut(doc: &mut Document) -> Result<Option<&mut Dictionary>> {
    let form_id = match doc.catalog()?.get(b"AcroForm") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(Object::Dictionary(_)) => None,
        _ => return Ok(None),
    };
    Ok(match form_id {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut).ok(),
        None => doc
            .catalog_mut()?
            .get_mut(b"AcroForm")
            .and_then(Object::as_dict_mut)
            .ok(),
    })
}

/// Ask viewers to regenerate field appearances.
///
/// # Errors
///
/// Returns an error if the document has no catalog.
pub fn need_appearances(doc: &mut Document) -> Result<bool> {
    Ok(match acroform_mut(doc)? {
        Some(form) => {
            form.set("NeedAppearances", Object::Boolean(true));
            true
        }
        None => false,
    })
}

/// Remove XFA form data, leaving the AcroForm fields.
///
/// # Errors
///
/// Returns an error if the document has no catalog.
pub fn drop_xfa(doc: &mut Document) -> Result<bool> {
    Ok(acroform_mut(doc)?.is_some_and(|form| form.remove(b"XFA").is_some()))
}

/// Remove the document-level XMP metadata stream.
///
/// # Errors
///
/// Returns an error if the document has no catalog.
pub fn drop_xmp(doc: &mut Document) -> Result<bool> {
    Ok(doc.catalog_mut()?.remove(b"Metadata").is_some())
}

struct Stamp {
    appearance: ObjectId,
    bbox: [f64; 4],
    rect: [f64; 4],
}

/// Paint every visible widget's normal appearance into its page and
/// remove the form.
///
/// Returns the number of widgets painted.
///
/// # Errors
///
/// Returns an error if the document has no catalog.
pub fn flatten(doc: &mut Document) -> Result<usize> {
    let mut painted = 0;
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    for page_id in page_ids {
        let Some(annots) = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| get_array(doc, page, b"Annots"))
            .cloned()
        else {
            continue;
        };

        let mut kept = Vec::with_capacity(annots.len());
        let mut stamps = Vec::new();
        let mut inline_appearances = Vec::new();
        for annot in annots {
            let Ok(dict) = resolve(doc, &annot).as_dict() else {
                kept.push(annot);
                continue;
            };
            let is_widget = dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|s| s == b"Widget");
            if !is_widget {
                kept.push(annot);
                continue;
            }

            let hidden = dict
                .get(b"F")
                .ok()
                .and_then(|f| resolve(doc, f).as_i64().ok())
                .is_some_and(|f| f & HIDDEN != 0);
            let Some(rect) = dict.get(b"Rect").ok().and_then(|r| rectangle(doc, r)) else {
                continue;
            };
            if hidden {
                continue;
            }

            match normal_appearance(doc, dict) {
                Some(Object::Reference(id)) => {
                    if let Ok(stream) = doc.get_object(*id).and_then(Object::as_stream) {
                        stamps.push(Stamp {
                            appearance: *id,
                            bbox: appearance_bbox(doc, &stream.dict, rect),
                            rect,
                        });
                    }
                }
                Some(Object::Stream(stream)) => {
                    inline_appearances.push((stream.clone(), rect));
                }
                _ => {}
            }
        }

        for (stream, rect) in inline_appearances {
            let bbox = appearance_bbox(doc, &stream.dict, rect);
            stamps.push(Stamp {
                appearance: doc.add_object(stream),
                bbox,
                rect,
            });
        }

        let mut paint = Vec::new();
        for stamp in &stamps {
            if let Ok(stream) = doc
                .get_object_mut(stamp.appearance)
                .and_then(Object::as_stream_mut)
            {
                stream.dict.set("Type", "XObject");
                stream.dict.set("Subtype", "Form");
            }
            let name = add_xobject(doc, page_id, "PdftkFlat", stamp.appearance)?;
            paint.extend(paint_xobject(&name, stretch_matrix(stamp.bbox, stamp.rect)));
        }
        painted += stamps.len();

        if !paint.is_empty() {
            wrap_contents(doc, page_id, None, Some(paint))?;
        }
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", Object::Array(kept));
            }
        }
    }

    doc.catalog_mut()?.remove(b"AcroForm");
    log::debug!("flattened {painted} widget appearance(s)");
    Ok(painted)
}

/// The widget's `/AP /N` entry, picking the `/AS` state when there are
/// several.
fn normal_appearance<'a>(doc: &'a Document, widget: &'a Dictionary) -> Option<&'a Object> {
    let ap = get_dict(doc, widget, b"AP")?;
    let normal = ap.get(b"N").ok()?;
    match resolve(doc, normal) {
        Object::Dictionary(states) => {
            let state = widget.get(b"AS").and_then(Object::as_name).ok()?;
            states.get(state).ok()
        }
        Object::Stream(_) => Some(normal),
        _ => None,
    }
}

fn appearance_bbox(doc: &Document, stream: &Dictionary, rect: [f64; 4]) -> [f64; 4] {
    stream
        .get(b"BBox")
        .ok()
        .and_then(|b| rectangle(doc, b))
        .unwrap_or([0.0, 0.0, rect[2] - rect[0], rect[3] - rect[1]])
}
