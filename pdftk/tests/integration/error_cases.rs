use crate::common::{Workspace, pdftk};
use pdftk::PdftkError;

#[tokio::test]
async fn test_missing_input() {
    let ws = Workspace::new();
    let missing = ws.path("missing.pdf");
    let out = ws.path("out.pdf");

    let err = pdftk(&[missing.as_str(), "cat", "output", &out])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftkError::FileNotFound { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_page_out_of_range() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Short");
    let out = ws.path("out.pdf");

    let err = pdftk(&[a.as_str(), "cat", "1-5", "output", &out])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftkError::PageOutOfRange { .. }));
    assert!(!std::path::Path::new(&out).exists());
}

#[tokio::test]
async fn test_page_zero_is_rejected() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Doc");
    let out = ws.path("out.pdf");

    let err = pdftk(&[a.as_str(), "cat", "0", "output", &out])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftkError::Usage { .. }));
}

#[tokio::test]
async fn test_output_may_not_overwrite_input() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Doc");

    let err = pdftk(&[a.as_str(), "cat", "output", &a]).await.unwrap_err();
    assert!(matches!(err, PdftkError::Usage { .. }));
}

#[tokio::test]
async fn test_second_operation_is_rejected() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Doc");
    let out = ws.path("out.pdf");

    let err = pdftk(&[a.as_str(), "cat", "burst", "output", &out])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftkError::Usage { .. }));
}

#[tokio::test]
async fn test_missing_output() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Doc");

    let err = pdftk(&[a.as_str(), "cat"]).await.unwrap_err();
    assert!(matches!(err, PdftkError::Usage { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_unknown_handle() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Doc");
    let out = ws.path("out.pdf");

    let err = pdftk(&[format!("A={a}").as_str(), "cat", "B1", "output", &out])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftkError::Usage { .. }));
}

#[tokio::test]
async fn test_not_a_pdf() {
    let ws = Workspace::new();
    let junk = ws.write("junk.pdf", b"this is not a pdf");
    let out = ws.path("out.pdf");

    let err = pdftk(&[junk.as_str(), "cat", "output", &out])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftkError::FailedToLoadPdf { .. }));
}

#[tokio::test]
async fn test_equal_output_passwords_write_nothing() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 1, "Doc");
    let out = ws.path("out.pdf");

    let err = pdftk(&[
        a.as_str(),
        "output",
        &out,
        "owner_pw",
        "same",
        "user_pw",
        "same",
    ])
    .await
    .unwrap_err();
    assert!(matches!(err, PdftkError::Usage { .. }));
    assert!(!std::path::Path::new(&out).exists());
}

#[tokio::test]
async fn test_user_protected_input_needs_the_right_password() {
    let ws = Workspace::new();
    let a = ws.pdf("a", 2, "Doc");
    let secured = ws.path("secured.pdf");
    pdftk(&[a.as_str(), "output", &secured, "owner_pw", "own", "user_pw", "usr"])
        .await
        .unwrap();

    for password in [None, Some("wrong"), Some("own")] {
        let out = ws.path("out.pdf");
        let mut args = vec![secured.as_str()];
        if let Some(password) = password {
            args.extend(["input_pw", password]);
        }
        args.extend(["cat", "output", out.as_str()]);

        let err = pdftk(&args).await.unwrap_err();
        assert!(
            matches!(err, PdftkError::Credential { .. }),
            "{password:?}: {err}"
        );
        assert!(!std::path::Path::new(&out).exists());
    }
}
