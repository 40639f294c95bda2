//! Building output documents.
//!
//! [`assembler`] imports pages into new documents for `cat`, `shuffle`,
//! `burst` and `rotate`. The other modules change a document in place for
//! `filter`: outlines, metadata, overlays, attachments and forms.

pub mod assembler;
pub mod attachments;
pub mod bookmarks;
pub mod content;
pub mod forms;
pub mod metadata;
pub mod overlay;

pub use assembler::OutputDocument;
pub use attachments::Attachment;
pub use bookmarks::{Bookmark, BookmarkTreeBuilder, TitleEncoding};
pub use overlay::OverlayKind;
