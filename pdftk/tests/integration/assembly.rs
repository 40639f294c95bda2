use crate::common::{Workspace, load, page_rotation, page_text, pdftk};
use pdftk::assemble::bookmarks::read_outline;
use rstest::rstest;

#[tokio::test]
async fn test_cat_with_handles_and_rotation() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 3, "First");
    let b = ws.pdf("b", 3, "Second");
    let out = ws.path("out.pdf");

    pdftk(&[
        format!("A={a}").as_str(),
        format!("B={b}").as_str(),
        "cat",
        "A1-2",
        "B3",
        "A3east",
        "output",
        &out,
    ])
    .await
    .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 4);
    assert!(page_text(&doc, 1).contains("a page 1"));
    assert!(page_text(&doc, 2).contains("a page 2"));
    assert!(page_text(&doc, 3).contains("b page 3"));
    assert!(page_text(&doc, 4).contains("a page 3"));
    assert_eq!(page_rotation(&doc, 3), 0);
    assert_eq!(page_rotation(&doc, 4), 90);
}

#[tokio::test]
async fn test_cat_whole_inputs_merges_outlines() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "First");
    let b = ws.pdf("b", 3, "Second");
    let out = ws.path("merged.pdf");

    pdftk(&[a.as_str(), b.as_str(), "cat", "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 5);

    let outline = read_outline(&doc);
    let entries: Vec<(&str, u32)> = outline
        .iter()
        .map(|b| (b.title.as_str(), b.page_number))
        .collect();
    assert_eq!(entries, vec![("a start", 1), ("b start", 3)]);
}

#[tokio::test]
async fn test_implicit_cat_for_several_inputs() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "First");
    let b = ws.pdf("b", 2, "Second");
    let out = ws.path("merged.pdf");

    pdftk(&[a.as_str(), b.as_str(), "output", &out]).await.unwrap();

    assert_eq!(load(&out).get_pages().len(), 3);
}

#[tokio::test]
async fn test_cat_even_odd_and_reverse_ranges() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 5, "Doc");
    let out = ws.path("out.pdf");

    pdftk(&[a.as_str(), "cat", "end-1odd", "r2", "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 4);
    assert!(page_text(&doc, 1).contains("a page 5"));
    assert!(page_text(&doc, 2).contains("a page 3"));
    assert!(page_text(&doc, 3).contains("a page 1"));
    assert!(page_text(&doc, 4).contains("a page 4"));
}

#[tokio::test]
async fn test_shuffle_interleaves_sequences() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 3, "Fronts");
    let b = ws.pdf("b", 3, "Backs");
    let out = ws.path("collated.pdf");

    pdftk(&[
        format!("A={a}").as_str(),
        format!("B={b}").as_str(),
        "shuffle",
        "A",
        "Bend-1",
        "output",
        &out,
    ])
    .await
    .unwrap();

    let doc = load(&out);
    let texts: Vec<String> = (1..=6).map(|n| page_text(&doc, n)).collect();
    let expected = [
        "a page 1", "b page 3", "a page 2", "b page 2", "a page 3", "b page 1",
    ];
    for (text, expected) in texts.iter().zip(expected) {
        assert!(text.contains(expected), "{text:?} should contain {expected:?}");
    }
}

#[tokio::test]
async fn test_rotate_keeps_other_pages() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 3, "Doc");
    let out = ws.path("rotated.pdf");

    pdftk(&[a.as_str(), "rotate", "2south", "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 3);
    assert_eq!(page_rotation(&doc, 1), 0);
    assert_eq!(page_rotation(&doc, 2), 180);
    assert_eq!(page_rotation(&doc, 3), 0);
    assert_eq!(read_outline(&doc).len(), 1);
}

#[tokio::test]
async fn test_encrypted_output() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Secret");
    let out = ws.path("secured.pdf");

    pdftk(&[
        a.as_str(),
        "output",
        &out,
        "owner_pw",
        "owner",
        "user_pw",
        "user",
        "allow",
        "printing",
    ])
    .await
    .unwrap();

    let bytes = std::fs::read(&out).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Encrypt"));
}

#[tokio::test]
async fn test_even_range_follows_its_own_input() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 10, "Long");
    let b = ws.pdf("b", 6, "Short");
    let out = ws.path("picked.pdf");

    pdftk(&[
        format!("A={a}").as_str(),
        format!("B={b}").as_str(),
        "cat",
        "A1-3",
        "Beven",
        "output",
        &out,
    ])
    .await
    .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 6);
    let expected = [
        "a page 1", "a page 2", "a page 3", "b page 2", "b page 4", "b page 6",
    ];
    for (n, expected) in (1..).zip(expected) {
        let text = page_text(&doc, n);
        assert!(text.contains(expected), "page {n}: {text:?} should contain {expected:?}");
    }
}

#[tokio::test]
async fn test_compass_rotation_replaces_existing_rotation() {
    let ws = Workspace::new();
    let mut doc = load(&ws.pdf("a", 3, "Turned"));
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    for id in page_ids {
        doc.get_dictionary_mut(id).unwrap().set("Rotate", 90);
    }
    let turned = ws.save("turned.pdf", doc);
    let out = ws.path("south.pdf");

    pdftk(&[turned.as_str(), "cat", "1-endsouth", "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 3);
    for n in 1..=3 {
        assert_eq!(page_rotation(&doc, n), 180, "page {n}");
    }
}

#[rstest]
#[case::rc4_40("encrypt_40bit")]
#[case::rc4_128("encrypt_128bit")]
#[tokio::test]
async fn test_owner_password_output_reopens(#[case] strength: &str) {
    let ws = Workspace::new();
    let a = ws.pdf("a", 3, "Locked");
    let secured = ws.path("secured.pdf");
    pdftk(&[a.as_str(), "output", &secured, strength, "owner_pw", "own"])
        .await
        .unwrap();

    let plain = ws.path("plain.pdf");
    pdftk(&[secured.as_str(), "cat", "output", &plain])
        .await
        .unwrap();
    let with_password = ws.path("with_password.pdf");
    pdftk(&[secured.as_str(), "input_pw", "own", "cat", "output", &with_password])
        .await
        .unwrap();

    for path in [&plain, &with_password] {
        let doc = load(path);
        assert_eq!(doc.get_pages().len(), 3);
        assert!(doc.trailer.get(b"Encrypt").is_err());
        for n in 1..=3 {
            assert!(page_text(&doc, n).contains(&format!("% a page {n}\n")));
        }
    }
}

#[rstest]
#[case::rc4_40("encrypt_40bit")]
#[case::rc4_128("encrypt_128bit")]
#[tokio::test]
async fn test_user_password_output_reopens(#[case] strength: &str) {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Locked");
    let secured = ws.path("secured.pdf");
    pdftk(&[
        a.as_str(),
        "output",
        &secured,
        strength,
        "owner_pw",
        "own",
        "user_pw",
        "usr",
    ])
    .await
    .unwrap();

    let out = ws.path("opened.pdf");
    pdftk(&[secured.as_str(), "input_pw", "usr", "cat", "output", &out])
        .await
        .unwrap();

    let doc = load(&out);
    assert_eq!(doc.get_pages().len(), 2);
    assert!(page_text(&doc, 1).contains("% a page 1\n"));
    assert!(page_text(&doc, 2).contains("% a page 2\n"));
    assert_eq!(read_outline(&doc).len(), 1);
}

#[tokio::test]
async fn test_keep_first_id() {
    let ws = Workspace::new();
    let first = ws.path("first.pdf");
    let a = ws.pdf("a", 1, "Doc");

    // Give the input an identifier by writing it through pdftk once.
    pdftk(&[a.as_str(), "output", &first]).await.unwrap();
    let id = file_id(&load(&first));

    let out = ws.path("same_id.pdf");
    pdftk(&[first.as_str(), "cat", "output", &out, "keep_first_id"])
        .await
        .unwrap();

    assert_eq!(file_id(&load(&out)), id);
}

fn file_id(doc: &lopdf::Document) -> Vec<Vec<u8>> {
    doc.trailer
        .get(b"ID")
        .and_then(|id| id.as_array())
        .unwrap()
        .iter()
        .map(|part| part.as_str().unwrap().to_vec())
        .collect()
}
