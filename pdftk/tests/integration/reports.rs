use crate::common::{Workspace, load, pdftk, read_text};
use lopdf::{Document, Object, dictionary};
use pdftk::assemble::bookmarks::read_outline;

/// FDF bytes setting `name` to `Ada` and checking `agree`.
fn fdf_bytes() -> Vec<u8> {
    let mut fdf = Document::with_version("1.2");
    let root = fdf.add_object(dictionary! {
        "FDF" => dictionary! {
            "Fields" => vec![
                dictionary! {
                    "T" => Object::string_literal("name"),
                    "V" => Object::string_literal("Ada"),
                }.into(),
                dictionary! {
                    "T" => Object::string_literal("agree"),
                    "V" => "Yes",
                }.into(),
            ],
        },
    });
    fdf.trailer.set("Root", root);

    let mut bytes = Vec::new();
    fdf.save_to(&mut bytes).unwrap();
    bytes[..4].copy_from_slice(b"%FDF");
    bytes
}

#[tokio::test]
async fn test_dump_data_report() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 4, "Quarterly");
    let report = ws.path("report.txt");

    pdftk(&[a.as_str(), "dump_data", "output", &report])
        .await
        .unwrap();

    let text = read_text(&report);
    assert!(text.contains("InfoBegin\nInfoKey: Title\nInfoValue: Quarterly\n"));
    assert!(text.contains("NumberOfPages: 4"));
    assert!(text.contains("BookmarkTitle: a start\nBookmarkLevel: 1\nBookmarkPageNumber: 1\n"));
}

#[tokio::test]
async fn test_dump_data_without_outline_has_no_bookmarks() {
    let ws = Workspace::new();
    let mut doc = load(&ws.pdf("a", 2, "Plain"));
    doc.catalog_mut().unwrap().remove(b"Outlines");
    let plain = ws.save("plain.pdf", doc);
    let report = ws.path("report.txt");

    pdftk(&[plain.as_str(), "dump_data", "output", &report])
        .await
        .unwrap();

    let text = read_text(&report);
    assert!(text.contains("NumberOfPages: 2"));
    assert!(!text.contains("BookmarkBegin"));
}

#[tokio::test]
async fn test_update_info_round_trip() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 3, "Draft");
    let info = ws.write(
        "info.txt",
        b"InfoBegin\nInfoKey: Author\nInfoValue: Ada\n\
          InfoBegin\nInfoKey: Title\nInfoValue: Final\n\
          BookmarkBegin\nBookmarkTitle: Appendix\nBookmarkLevel: 1\nBookmarkPageNumber: 3\n",
    );
    let out = ws.path("updated.pdf");
    let report = ws.path("report.txt");

    pdftk(&[a.as_str(), "update_info", &info, "output", &out])
        .await
        .unwrap();
    pdftk(&[out.as_str(), "dump_data", "output", &report])
        .await
        .unwrap();

    let text = read_text(&report);
    assert!(text.contains("InfoKey: Author\nInfoValue: Ada"));
    assert!(text.contains("InfoKey: Title\nInfoValue: Final"));
    assert!(!text.contains("Draft"));

    let outline = read_outline(&load(&out));
    assert_eq!(outline.len(), 1);
    assert_eq!(outline[0].title, "Appendix");
    assert_eq!(outline[0].page_number, 3);
}

#[tokio::test]
async fn test_update_info_with_huge_bookmark_level() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Draft");
    let info = ws.write(
        "info.txt",
        b"BookmarkBegin\nBookmarkTitle: Deep\nBookmarkLevel: 200000\nBookmarkPageNumber: 2\n",
    );
    let out = ws.path("updated.pdf");

    pdftk(&[a.as_str(), "update_info", &info, "output", &out])
        .await
        .unwrap();

    let outline = read_outline(&load(&out));
    assert_eq!(outline.len(), 1);
    assert_eq!(outline[0].title, "Deep");
    assert_eq!(outline[0].level, 1);
    assert_eq!(outline[0].page_number, 2);
}

#[tokio::test]
async fn test_dump_data_fields_report() {
    let ws = Workspace::new();
    let form = ws.form("form.pdf");
    let report = ws.path("fields.txt");

    pdftk(&[form.as_str(), "dump_data_fields", "output", &report])
        .await
        .unwrap();

    let text = read_text(&report);
    assert!(text.starts_with("---\nFieldType: Text\nFieldName: name\n"));
    assert!(text.contains("FieldType: Button\nFieldName: agree\n"));
    assert!(text.contains("FieldStateOption: Off"));
    assert!(text.contains("FieldStateOption: Yes"));
}

#[tokio::test]
async fn test_fill_form_then_dump_fields() {
    let ws = Workspace::new();
    let form = ws.form("form.pdf");
    let data = ws.write("data.fdf", &fdf_bytes());
    let filled = ws.path("filled.pdf");
    let report = ws.path("fields.txt");

    pdftk(&[form.as_str(), "fill_form", &data, "output", &filled])
        .await
        .unwrap();
    pdftk(&[filled.as_str(), "dump_data_fields", "output", &report])
        .await
        .unwrap();

    let text = read_text(&report);
    assert!(text.contains("FieldName: name\nFieldFlags: 0\nFieldValue: Ada\n"));
    assert!(text.contains("FieldValue: Yes"));
}

#[tokio::test]
async fn test_fill_form_and_flatten() {
    let ws = Workspace::new();
    let form = ws.form("form.pdf");
    let data = ws.write("data.fdf", &fdf_bytes());
    let flat = ws.path("flat.pdf");

    pdftk(&[form.as_str(), "fill_form", &data, "output", &flat, "flatten"])
        .await
        .unwrap();

    let doc = load(&flat);
    assert!(!doc.catalog().unwrap().has(b"AcroForm"));
    let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
    let annots = page
        .get(b"Annots")
        .and_then(Object::as_array)
        .map(|a| a.len())
        .unwrap_or(0);
    assert_eq!(annots, 0);
}

#[tokio::test]
async fn test_generate_fdf_lists_fields() {
    let ws = Workspace::new();
    let form = ws.form("form.pdf");
    let out = ws.path("blank.fdf");

    pdftk(&[form.as_str(), "generate_fdf", "output", &out])
        .await
        .unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%FDF"));
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("(name)"));
    assert!(text.contains("(agree)"));
}
