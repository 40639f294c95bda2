//! Interactive form fields: reading the AcroForm field tree and the
//! `dump_data_fields` report.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

use super::encoding::{decode_object, escape_xml};
use crate::utils::{get_array, get_dict, resolve};

/// Field type, from the (inheritable) `/FT` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `/Tx`
    Text,
    /// `/Btn`: check boxes, radio buttons, push buttons.
    Button,
    /// `/Ch`: list and combo boxes.
    Choice,
    /// `/Sig`
    Signature,
}

impl FieldKind {
    fn from_pdf_name(name: &[u8]) -> Option<Self> {
        match name {
            b"Tx" => Some(Self::Text),
            b"Btn" => Some(Self::Button),
            b"Ch" => Some(Self::Choice),
            b"Sig" => Some(Self::Signature),
            _ => None,
        }
    }

    /// Name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Button => "Button",
            Self::Choice => "Choice",
            Self::Signature => "Signature",
        }
    }
}

/// One node of the field hierarchy.
#[derive(Debug, Clone, Default)]
pub struct FieldNode {
    /// The field dictionary's object id, when it is indirect.
    pub id: Option<ObjectId>,
    /// `/T`
    pub partial_name: String,
    /// Partial names of every ancestor and this node, joined with `.`.
    pub full_name: String,
    /// Inherited field type.
    pub kind: Option<FieldKind>,
    /// `/TU`
    pub alt_name: Option<String>,
    /// Inherited `/Ff`.
    pub flags: i64,
    /// `/V`, one entry per selected value.
    pub value: Vec<String>,
    /// `/DV`
    pub default_value: Vec<String>,
    /// Inherited `/Q`.
    pub justification: Option<i64>,
    /// Appearance states (buttons) or `/Opt` export values (choices).
    pub state_options: Vec<(String, Option<String>)>,
    /// Widget annotations of this field.
    pub widgets: Vec<ObjectId>,
    /// Named child fields.
    pub children: Vec<FieldNode>,
}

impl FieldNode {
    /// True if the node has no named children.
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first list of this node and its descendants.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a FieldNode>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Inherited {
    kind: Option<FieldKind>,
    flags: i64,
    justification: Option<i64>,
}

/// The document's AcroForm dictionary, if any.
pub fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    get_dict(doc, catalog, b"AcroForm")
}

/// Read the field hierarchy.
pub fn read_fields(doc: &Document) -> Vec<FieldNode> {
    let Some(form) = acroform(doc) else {
        return Vec::new();
    };
    let Some(fields) = get_array(doc, form, b"Fields") else {
        return Vec::new();
    };

    let mut visited = HashSet::new();
    fields
        .iter()
        .filter_map(|field| read_node(doc, field, "", Inherited::default(), &mut visited, 0))
        .collect()
}

/// Every field in depth-first order, terminal or not.
pub fn all_fields(roots: &[FieldNode]) -> Vec<&FieldNode> {
    let mut out = Vec::new();
    for root in roots {
        root.walk(&mut out);
    }
    out
}

fn read_node(
    doc: &Document,
    obj: &Object,
    parent_name: &str,
    inherited: Inherited,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) -> Option<FieldNode> {
    if depth > 64 {
        return None;
    }
    let id = obj.as_reference().ok();
    if let Some(id) = id
        && !visited.insert(id)
    {
        return None;
    }
    let dict = resolve(doc, obj).as_dict().ok()?;

    let partial_name = dict
        .get(b"T")
        .map(|t| decode_object(resolve(doc, t)))
        .unwrap_or_default();
    let full_name = match (parent_name.is_empty(), partial_name.is_empty()) {
        (true, _) => partial_name.clone(),
        (false, true) => parent_name.to_string(),
        (false, false) => format!("{parent_name}.{partial_name}"),
    };

    let inherited = Inherited {
        kind: dict
            .get(b"FT")
            .and_then(Object::as_name)
            .ok()
            .and_then(FieldKind::from_pdf_name)
            .or(inherited.kind),
        flags: dict
            .get(b"Ff")
            .ok()
            .and_then(|f| resolve(doc, f).as_i64().ok())
            .unwrap_or(inherited.flags),
        justification: dict
            .get(b"Q")
            .ok()
            .and_then(|q| resolve(doc, q).as_i64().ok())
            .or(inherited.justification),
    };

    let mut node = FieldNode {
        id,
        partial_name,
        full_name,
        kind: inherited.kind,
        alt_name: dict.get(b"TU").ok().map(|tu| decode_object(resolve(doc, tu))),
        flags: inherited.flags,
        value: dict
            .get(b"V")
            .map(|v| values(doc, v))
            .unwrap_or_default(),
        default_value: dict
            .get(b"DV")
            .map(|v| values(doc, v))
            .unwrap_or_default(),
        justification: inherited.justification,
        ..FieldNode::default()
    };

    if is_widget(dict)
        && let Some(id) = id
    {
        node.widgets.push(id);
    }

    if let Some(kids) = get_array(doc, dict, b"Kids") {
        for kid in kids {
            let Ok(kid_dict) = resolve(doc, kid).as_dict() else {
                continue;
            };
            if kid_dict.has(b"T") {
                if let Some(child) =
                    read_node(doc, kid, &node.full_name, inherited, visited, depth + 1)
                {
                    node.children.push(child);
                }
            } else if let Ok(kid_id) = kid.as_reference() {
                node.widgets.push(kid_id);
            }
        }
    }

    node.state_options = match node.kind {
        Some(FieldKind::Button) => button_states(doc, dict, &node.widgets),
        Some(FieldKind::Choice) => choice_options(doc, dict),
        _ => Vec::new(),
    };

    Some(node)
}

fn is_widget(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(Object::as_name)
        .is_ok_and(|s| s == b"Widget")
}

fn values(doc: &Document, obj: &Object) -> Vec<String> {
    match resolve(doc, obj) {
        Object::Array(items) => items
            .iter()
            .map(|item| decode_object(resolve(doc, item)))
            .collect(),
        other => vec![decode_object(other)],
    }
}

fn button_states(
    doc: &Document,
    field: &Dictionary,
    widgets: &[ObjectId],
) -> Vec<(String, Option<String>)> {
    let mut states: Vec<(String, Option<String>)> = Vec::new();
    let dicts = std::iter::once(field).chain(
        widgets
            .iter()
            .filter_map(|id| doc.get_dictionary(*id).ok()),
    );
    for dict in dicts {
        let Some(normal) =
            get_dict(doc, dict, b"AP").and_then(|ap| get_dict(doc, ap, b"N"))
        else {
            continue;
        };
        for (name, _) in normal.iter() {
            let name = String::from_utf8_lossy(name).into_owned();
            if !states.iter().any(|(s, _)| *s == name) {
                states.push((name, None));
            }
        }
    }
    states
}

fn choice_options(doc: &Document, field: &Dictionary) -> Vec<(String, Option<String>)> {
    let Some(opts) = get_array(doc, field, b"Opt") else {
        return Vec::new();
    };
    opts.iter()
        .map(|opt| match resolve(doc, opt) {
            Object::Array(pair) if pair.len() == 2 => (
                decode_object(resolve(doc, &pair[0])),
                Some(decode_object(resolve(doc, &pair[1]))),
            ),
            other => (decode_object(other), None),
        })
        .collect()
}

/// Render the `dump_data_fields` report.
///
/// Each field is a `---` separated record; only non-empty attributes are
/// written.
pub fn render_fields(doc: &Document, utf8: bool) -> String {
    let text = |value: &str| {
        if utf8 {
            value.to_string()
        } else {
            escape_xml(value)
        }
    };

    let roots = read_fields(doc);
    let mut out = String::new();
    for field in all_fields(&roots) {
        out.push_str("---\n");
        if let Some(kind) = field.kind {
            out.push_str(&format!("FieldType: {}\n", kind.name()));
        }
        out.push_str(&format!("FieldName: {}\n", text(&field.full_name)));
        if let Some(alt) = &field.alt_name {
            out.push_str(&format!("FieldNameAlt: {}\n", text(alt)));
        }
        out.push_str(&format!("FieldFlags: {}\n", field.flags));
        for value in &field.value {
            out.push_str(&format!("FieldValue: {}\n", text(value)));
        }
        for value in &field.default_value {
            out.push_str(&format!("FieldValueDefault: {}\n", text(value)));
        }
        let justification = match field.justification {
            Some(1) => "Center",
            Some(2) => "Right",
            _ => "Left",
        };
        out.push_str(&format!("FieldJustification: {justification}\n"));
        for (option, display) in &field.state_options {
            out.push_str(&format!("FieldStateOption: {}\n", text(option)));
            if let Some(display) = display {
                out.push_str(&format!("FieldStateOptionDisplay: {}\n", text(display)));
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// A one-page document with a text field `name`, a check box `agree`
    /// and a parent `address` with child `city`.
    pub(crate) fn form_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let on = doc.add_object(lopdf::Stream::new(dictionary! {}, Vec::new()));
        let text_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "TU" => Object::string_literal("Your name"),
            "V" => Object::string_literal("Ada"),
            "Q" => 1,
            "Rect" => vec![10.into(), 10.into(), 110.into(), 30.into()],
            "P" => page_id,
        });
        let check_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal("agree"),
            "V" => "Off",
            "AS" => "Off",
            "AP" => dictionary! { "N" => dictionary! { "Yes" => on, "Off" => on } },
            "Rect" => vec![10.into(), 40.into(), 20.into(), 50.into()],
            "P" => page_id,
        });
        let address_id = doc.new_object_id();
        let city_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "T" => Object::string_literal("city"),
            "Parent" => address_id,
            "Rect" => vec![10.into(), 60.into(), 110.into(), 80.into()],
            "P" => page_id,
        });
        doc.objects.insert(
            address_id,
            dictionary! {
                "FT" => "Tx",
                "T" => Object::string_literal("address"),
                "Kids" => vec![city_id.into()],
            }
            .into(),
        );

        doc.objects.insert(
            page_id,
            dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                "Annots" => vec![text_id.into(), check_id.into(), city_id.into()],
            }
            .into(),
        );
        doc.objects.insert(
            pages_id,
            dictionary! { "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1 }
                .into(),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => dictionary! {
                "Fields" => vec![text_id.into(), check_id.into(), address_id.into()],
            },
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_read_fields_hierarchy() {
        let doc = form_document();
        let roots = read_fields(&doc);
        assert_eq!(roots.len(), 3);

        let all = all_fields(&roots);
        let names: Vec<&str> = all.iter().map(|f| f.full_name.as_str()).collect();
        assert_eq!(names, vec!["name", "agree", "address", "address.city"]);

        let city = all[3];
        assert_eq!(city.kind, Some(FieldKind::Text));
        assert!(city.is_terminal());
        assert!(!all[2].is_terminal());
    }

    #[test]
    fn test_button_states() {
        let doc = form_document();
        let roots = read_fields(&doc);
        let states: Vec<&str> = roots[1]
            .state_options
            .iter()
            .map(|(s, _)| s.as_str())
            .collect();
        assert!(states.contains(&"Yes"));
        assert!(states.contains(&"Off"));
    }

    #[test]
    fn test_render_fields() {
        let doc = form_document();
        let report = render_fields(&doc, false);
        assert!(report.starts_with("---\nFieldType: Text\nFieldName: name\n"));
        assert!(report.contains("FieldNameAlt: Your name"));
        assert!(report.contains("FieldValue: Ada"));
        assert!(report.contains("FieldJustification: Center"));
        assert!(report.contains("FieldName: address.city"));
        assert_eq!(report.matches("---").count(), 4);
    }

    #[test]
    fn test_no_form() {
        let doc = Document::with_version("1.5");
        assert!(read_fields(&doc).is_empty());
        assert!(render_fields(&doc, true).is_empty());
    }
}
