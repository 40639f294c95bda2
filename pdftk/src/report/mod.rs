//! Text and FDF reports about a document.
//!
//! Reports are plain strings; [`crate::ops`] decides where they go.

pub mod annots;
pub mod data;
pub mod encoding;
pub mod fdf;
pub mod fields;

pub use annots::render_annots;
pub use data::{DocumentData, NumberStyle, PageLabel};
pub use fdf::{FdfData, FdfValue, generate_fdf};
pub use fields::{FieldKind, FieldNode, read_fields, render_fields};
