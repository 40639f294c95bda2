//! Shared helpers for the integration tests.
//!
//! Fixtures are generated with lopdf into a temporary directory, so every
//! test owns its files.

#![allow(dead_code)]

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use pdftk::assemble::bookmarks::{Bookmark, BookmarkTreeBuilder};
use pdftk::prompt::ScriptedPrompter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory with helpers for fixture and output paths.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Absolute path of `name` inside the workspace, as a token.
    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// The workspace directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a PDF whose pages carry `% <name> page <n>` comments, with an
    /// Info title and a single bookmark on page 1.
    pub fn pdf(&self, name: &str, pages: usize, title: &str) -> String {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (1..=pages)
            .map(|n| {
                let content = doc.add_object(Stream::new(
                    dictionary! {},
                    format!("% {name} page {n}\n").into_bytes(),
                ));
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content,
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }
            .into(),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let info = doc.add_object(dictionary! { "Title" => Object::string_literal(title) });
        doc.trailer.set("Info", info);

        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        BookmarkTreeBuilder::new(&page_ids)
            .build(&mut doc, &[Bookmark::new(format!("{name} start"), 1, 1)])
            .unwrap();

        self.save(name, doc)
    }

    /// Write a one-page form with a text field `name` and a check box
    /// `agree` (states `Yes`/`Off`).
    pub fn form(&self, name: &str) -> String {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();
        let appearance = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
            },
            b"0 0 10 10 re f".to_vec(),
        ));
        let text = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "Rect" => vec![10.into(), 10.into(), 110.into(), 30.into()],
            "P" => page_id,
        });
        let check = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal("agree"),
            "V" => "Off",
            "AS" => "Off",
            "AP" => dictionary! { "N" => dictionary! { "Yes" => appearance, "Off" => appearance } },
            "Rect" => vec![10.into(), 40.into(), 20.into(), 50.into()],
            "P" => page_id,
        });
        doc.objects.insert(
            page_id,
            dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                "Annots" => vec![text.into(), check.into()],
            }
            .into(),
        );
        doc.objects.insert(
            pages_id,
            dictionary! { "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1 }
                .into(),
        );
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => dictionary! { "Fields" => vec![text.into(), check.into()] },
        });
        doc.trailer.set("Root", catalog);
        self.save(name, doc)
    }

    /// Write `doc` into the workspace and return its path.
    pub fn save(&self, name: &str, mut doc: Document) -> String {
        let path = self.path(name);
        doc.save(&path).expect("Failed to save fixture");
        path
    }

    /// Write raw bytes into the workspace and return the path.
    pub fn write(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.path(name);
        std::fs::write(&path, bytes).expect("Failed to write fixture");
        path
    }
}

/// Run a pdftk command line without interactive answers.
pub async fn pdftk(tokens: &[&str]) -> pdftk::Result<()> {
    let mut prompter = ScriptedPrompter::default();
    pdftk::ops::run(tokens, &mut prompter).await
}

/// Load an output document.
pub fn load(path: impl AsRef<Path>) -> Document {
    Document::load(path.as_ref()).expect("Failed to load output")
}

/// Concatenated content of a page, as text.
pub fn page_text(doc: &Document, page: u32) -> String {
    let id = doc.get_pages()[&page];
    String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
}

/// Effective `/Rotate` of a page.
pub fn page_rotation(doc: &Document, page: u32) -> i64 {
    let id = doc.get_pages()[&page];
    pdftk::assemble::content::rotation(doc, id)
}

/// Read a text file in the workspace.
pub fn read_text(path: impl Into<PathBuf>) -> String {
    std::fs::read_to_string(path.into()).expect("Failed to read report")
}
