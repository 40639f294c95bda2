//! The `dump_data_annots` report: link annotations with URI actions.

use lopdf::Document;

use super::encoding::{decode_object, escape_xml};
use crate::utils::{as_number, get_array, get_dict, resolve};

/// A link annotation that opens a URI.
#[derive(Debug, Clone, PartialEq)]
pub struct UriLink {
    /// 1-based page holding the annotation.
    pub page_number: u32,
    /// Annotation rectangle.
    pub rect: [f64; 4],
    /// Target URI.
    pub uri: String,
}

/// Every URI link in page order.
pub fn read_uri_links(doc: &Document) -> Vec<UriLink> {
    let mut links = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        let Some(annots) = get_array(doc, page, b"Annots") else {
            continue;
        };

        for annot in annots {
            let Ok(annot) = resolve(doc, annot).as_dict() else {
                continue;
            };
            let is_link = annot
                .get(b"Subtype")
                .and_then(lopdf::Object::as_name)
                .is_ok_and(|s| s == b"Link");
            if !is_link {
                continue;
            }

            let Some(action) = get_dict(doc, annot, b"A") else {
                continue;
            };
            let is_uri = action
                .get(b"S")
                .and_then(lopdf::Object::as_name)
                .is_ok_and(|s| s == b"URI");
            let Some(uri) = action.get(b"URI").ok().map(|u| decode_object(resolve(doc, u)))
            else {
                continue;
            };
            if !is_uri {
                continue;
            }

            let mut rect = [0.0; 4];
            if let Some(values) = get_array(doc, annot, b"Rect") {
                for (slot, value) in rect.iter_mut().zip(values) {
                    *slot = as_number(resolve(doc, value)).unwrap_or(0.0);
                }
            }

            links.push(UriLink {
                page_number,
                rect,
                uri,
            });
        }
    }
    links
}

/// Render the `dump_data_annots` report.
pub fn render_annots(doc: &Document) -> String {
    let mut out = String::new();

    let base = doc
        .catalog()
        .ok()
        .and_then(|catalog| get_dict(doc, catalog, b"URI"))
        .and_then(|uri| uri.get(b"Base").ok())
        .map(|base| decode_object(resolve(doc, base)));
    if let Some(base) = base {
        out.push_str(&format!("PdfUriBase: {}\n", escape_xml(&base)));
    }

    for link in read_uri_links(doc) {
        let [x1, y1, x2, y2] = link.rect;
        out.push_str("---\n");
        out.push_str("AnnotType: Link\n");
        out.push_str(&format!("AnnotRect: {x1} {y1} {x2} {y2}\n"));
        out.push_str(&format!("AnnotPageNumber: {}\n", link.page_number));
        out.push_str("AnnotActionType: URI\n");
        out.push_str(&format!("AnnotActionURI: {}\n", escape_xml(&link.uri)));
    }
    out
}
