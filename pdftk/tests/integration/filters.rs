use crate::common::{Workspace, load, page_text, pdftk};

#[tokio::test]
async fn test_attach_then_unpack() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Carrier");
    let notes = ws.write("notes.txt", b"remember the milk\n");
    let out = ws.path("carrier.pdf");
    let unpacked = ws.root().join("unpacked");

    pdftk(&[a.as_str(), "attach_files", &notes, "output", &out])
        .await
        .unwrap();
    pdftk(&[out.as_str(), "unpack_files", "output", &unpacked.to_string_lossy()])
        .await
        .unwrap();

    let data = std::fs::read(unpacked.join("notes.txt")).unwrap();
    assert_eq!(data, b"remember the milk\n");
}

#[tokio::test]
async fn test_attach_to_page_adds_annotation() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Carrier");
    let notes = ws.write("notes.txt", b"page note");
    let out = ws.path("carrier.pdf");

    pdftk(&[a.as_str(), "attach_files", &notes, "to_page", "2", "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    let page = doc.get_dictionary(doc.get_pages()[&2]).unwrap();
    assert!(page.has(b"Annots"));
}

#[tokio::test]
async fn test_stamp_paints_over_every_page() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Body");
    let mark = ws.pdf("mark", 1, "Stamp");
    let out = ws.path("stamped.pdf");

    pdftk(&[a.as_str(), "stamp", &mark, "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    for page in 1..=2 {
        let text = page_text(&doc, page);
        assert!(text.contains(&format!("a page {page}")));
        assert!(text.contains("PdftkOverlay"));
    }
}

#[tokio::test]
async fn test_background_goes_underneath() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Body");
    let paper = ws.pdf("paper", 1, "Letterhead");
    let out = ws.path("letter.pdf");

    pdftk(&[a.as_str(), "background", &paper, "output", &out])
        .await
        .unwrap();

    let text = page_text(&load(&out), 1);
    let overlay = text.find("PdftkOverlay").unwrap();
    let body = text.find("a page 1").unwrap();
    assert!(overlay < body);
}

#[tokio::test]
async fn test_uncompress_output() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Plain");
    let out = ws.path("plain.pdf");

    pdftk(&[a.as_str(), "output", &out, "uncompress"])
        .await
        .unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("% a page 1"));
}
