//! Backgrounds and stamps.
//!
//! Each overlay page becomes a form XObject in the target document. It is
//! painted under (background) or over (stamp) each target page, scaled to
//! fit the visible page area and turned to match the page's `/Rotate`.

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::collections::HashMap;

use super::content::{
    add_xobject, fit_matrix, inherited, page_box, paint_xobject, rotation, wrap_contents,
};
use crate::error::{PdftkError, Result};
use crate::io::ReaderId;
use crate::utils::{ObjectCopier, resolve};

/// Reader id under which overlay objects are copied.
const OVERLAY_READER: ReaderId = ReaderId::MAX;

/// Where the overlay goes relative to the page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// Under the page content.
    Background,
    /// Over the page content.
    Stamp,
}

impl OverlayKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Stamp => "stamp",
        }
    }
}

/// Paint `overlay` onto every page of `target`.
///
/// With `multi`, overlay page *n* goes on target page *n* and the last
/// overlay page repeats; otherwise overlay page 1 goes on every page.
/// Returns the number of pages changed.
///
/// # Errors
///
/// Returns a usage error if the overlay has no pages.
pub fn apply_overlay(
    target: &mut Document,
    overlay: &Document,
    kind: OverlayKind,
    multi: bool,
) -> Result<usize> {
    let overlay_pages: Vec<ObjectId> = overlay.get_pages().values().copied().collect();
    if overlay_pages.is_empty() {
        return Err(PdftkError::usage(format!(
            "The {} PDF has no pages",
            kind.label()
        )));
    }

    let pages_root = target
        .catalog()?
        .get(b"Pages")
        .and_then(Object::as_reference)?;
    let mut copier = ObjectCopier::new(pages_root);
    let mut forms: HashMap<usize, (ObjectId, [f64; 4])> = HashMap::new();

    let target_pages: Vec<ObjectId> = target.get_pages().values().copied().collect();
    for (position, page_id) in target_pages.iter().enumerate() {
        let index = if multi {
            position.min(overlay_pages.len() - 1)
        } else {
            0
        };

        let (form_id, bbox) = match forms.get(&index) {
            Some(form) => *form,
            None => {
                let form = page_to_form(target, overlay, overlay_pages[index], &mut copier)?;
                forms.insert(index, form);
                form
            }
        };

        let name = add_xobject(target, *page_id, "PdftkOverlay", form_id)?;
        let (display, to_page) = display_space(page_box(target, *page_id), rotation(target, *page_id));
        let matrix = multiply(fit_matrix(bbox, display), to_page);
        let paint = paint_xobject(&name, matrix);

        match kind {
            OverlayKind::Background => wrap_contents(target, *page_id, Some(paint), None)?,
            OverlayKind::Stamp => wrap_contents(target, *page_id, None, Some(paint))?,
        }
    }

    log::debug!(
        "applied {} from {} overlay page(s) to {} page(s)",
        kind.label(),
        forms.len(),
        target_pages.len()
    );
    Ok(target_pages.len())
}

/// Copy one overlay page into `target` as a form XObject.
fn page_to_form(
    target: &mut Document,
    overlay: &Document,
    page_id: ObjectId,
    copier: &mut ObjectCopier,
) -> Result<(ObjectId, [f64; 4])> {
    let content = overlay.get_page_content(page_id)?;
    let bbox = page_box(overlay, page_id);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => bbox.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
    };
    if let Some(resources) = inherited(overlay, page_id, b"Resources") {
        let resources = resolve(overlay, resources).clone();
        dict.set(
            "Resources",
            copier.copy(target, overlay, OVERLAY_READER, &resources),
        );
    }

    let form_id = target.add_object(Stream::new(dict, content));
    Ok((form_id, bbox))
}

/// The page box as the reader sees it, and the matrix taking that upright
/// space back to page space.
fn display_space(page: [f64; 4], rotate: i64) -> ([f64; 4], [f64; 6]) {
    let [llx, lly, urx, ury] = page;
    let (w, h) = (urx - llx, ury - lly);
    match rotate.rem_euclid(360) {
        90 => ([0.0, 0.0, h, w], [0.0, 1.0, -1.0, 0.0, llx + w, lly]),
        180 => ([0.0, 0.0, w, h], [-1.0, 0.0, 0.0, -1.0, llx + w, lly + h]),
        270 => ([0.0, 0.0, h, w], [0.0, -1.0, 1.0, 0.0, llx, lly + h]),
        _ => ([0.0, 0.0, w, h], [1.0, 0.0, 0.0, 1.0, llx, lly]),
    }
}

/// Matrix product: apply `first`, then `second`.
fn multiply(first: [f64; 6], second: [f64; 6]) -> [f64; 6] {
    let [a1, b1, c1, d1, e1, f1] = first;
    let [a2, b2, c2, d2, e2, f2] = second;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}
