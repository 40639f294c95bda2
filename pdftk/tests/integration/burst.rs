use crate::common::{Workspace, load, page_text, pdftk, read_text};

#[tokio::test]
async fn test_burst_writes_pages_and_report() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 3, "Burst me");
    let pattern = ws.root().join("pages").join("page_%02d.pdf");
    std::fs::create_dir(ws.root().join("pages")).unwrap();

    pdftk(&[a.as_str(), "burst", "output", &pattern.to_string_lossy()])
        .await
        .unwrap();

    for n in 1..=3u32 {
        let path = ws.root().join("pages").join(format!("page_{n:02}.pdf"));
        let doc = load(&path);
        assert_eq!(doc.get_pages().len(), 1);
        assert!(page_text(&doc, 1).contains(&format!("a page {n}")));
    }

    let report = read_text(ws.root().join("pages").join("doc_data.txt"));
    assert!(report.contains("NumberOfPages: 3"));
    assert!(report.contains("InfoValue: Burst me"));
}

#[tokio::test]
async fn test_burst_pattern_without_conversion() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Doc");
    let pattern = ws.path("split.pdf");

    pdftk(&[a.as_str(), "burst", "output", &pattern]).await.unwrap();

    assert!(ws.root().join("split_0001.pdf").exists());
    assert!(ws.root().join("split_0002.pdf").exists());
}

#[tokio::test]
async fn test_burst_to_stdout_is_rejected() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Doc");

    let err = pdftk(&[a.as_str(), "burst", "output", "-"]).await.unwrap_err();
    assert!(matches!(err, pdftk::PdftkError::Usage { .. }));
}
