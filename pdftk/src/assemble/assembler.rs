//! Page assembly: building a new document from claimed input pages.
//!
//! Pages are imported one at a time from the reader instance that claimed
//! them. Rotation is applied to that instance's page before copying, and
//! inherited attributes are made explicit so the page renders the same
//! under its new parent.

use lopdf::{Document, Object, ObjectId, dictionary};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::bookmarks::{AppendState, BookmarkTreeBuilder, read_outline};
use super::content::{flattened_page, rotation, set_rotation};
use super::metadata::copy_info;
use crate::error::{PdftkError, Result};
use crate::io::{ReaderId, ReaderPool};
use crate::pages::PageRef;
use crate::report::fields::acroform;
use crate::utils::{ObjectCopier, get_array, resolve};

/// A document under construction.
#[derive(Debug)]
pub struct OutputDocument {
    document: Document,
    pages_root: ObjectId,
    page_ids: Vec<ObjectId>,
    copier: ObjectCopier,
    form_fields: Vec<ObjectId>,
    form_defaults: Option<(ReaderId, usize)>,
    page_maps: HashMap<ReaderId, BTreeMap<u32, ObjectId>>,
}

impl OutputDocument {
    /// Create an empty document with a catalog and page tree root.
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_root = document.new_object_id();
        document.objects.insert(
            pages_root,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_root,
        });
        document.trailer.set("Root", catalog);

        Self {
            document,
            pages_root,
            page_ids: Vec::new(),
            copier: ObjectCopier::new(pages_root),
            form_fields: Vec::new(),
            form_defaults: None,
            page_maps: HashMap::new(),
        }
    }

    /// Output page ids in order.
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Number of pages imported so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// The document being built.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Import one page.
    ///
    /// The page must have been claimed with [`ReaderPool::claim`]; the
    /// claim is released here.
    ///
    /// # Errors
    ///
    /// Returns an internal error if no instance claims the page or the
    /// page number is out of range for the instance.
    pub fn import(&mut self, pool: &mut ReaderPool, page: &PageRef) -> Result<ObjectId> {
        let instance = pool.release(page.input, page.page)?;
        let reader = instance.id();

        let page_id = self
            .page_maps
            .entry(reader)
            .or_insert_with(|| instance.document().get_pages())
            .get(&page.page)
            .copied()
            .ok_or_else(|| {
                PdftkError::internal(format!(
                    "page {} of input {} vanished from its reader",
                    page.page, page.input
                ))
            })?;

        if page.rotates() {
            let doc = instance.document_mut();
            let degrees = page.resolve_rotation(rotation(doc, page_id));
            set_rotation(doc, page_id, degrees)?;
        }

        let source = instance.document();
        let dict = flattened_page(source, page_id)?;
        let new_id = self
            .copier
            .import_page(&mut self.document, source, reader, page_id, &dict);

        self.collect_form_fields(source, reader, page.input, &dict);
        self.add_to_tree(new_id)?;
        Ok(new_id)
    }

    /// Append a page id to the page tree root.
    fn add_to_tree(&mut self, page_id: ObjectId) -> Result<()> {
        let pages = self
            .document
            .get_object_mut(self.pages_root)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdftkError::internal("output page tree root is missing"))?;

        if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
            kids.push(Object::Reference(page_id));
        }
        self.page_ids.push(page_id);
        pages.set("Count", Object::Integer(self.page_ids.len() as i64));
        Ok(())
    }

    /// Record the top-level fields owning the page's widget annotations.
    fn collect_form_fields(
        &mut self,
        source: &Document,
        reader: ReaderId,
        input: usize,
        page: &lopdf::Dictionary,
    ) {
        let Some(annots) = get_array(source, page, b"Annots") else {
            return;
        };

        for annot in annots {
            let &Object::Reference(mut field_id) = annot else {
                continue;
            };
            let is_field = source
                .get_dictionary(field_id)
                .is_ok_and(|d| d.has(b"FT") || d.has(b"Parent") || d.has(b"T"));
            let is_widget = source.get_dictionary(field_id).is_ok_and(|d| {
                d.get(b"Subtype")
                    .and_then(Object::as_name)
                    .is_ok_and(|s| s == b"Widget")
            });
            if !is_field || !is_widget {
                continue;
            }

            for _ in 0..32 {
                match source
                    .get_dictionary(field_id)
                    .and_then(|d| d.get(b"Parent"))
                    .and_then(Object::as_reference)
                {
                    Ok(parent) => field_id = parent,
                    Err(_) => break,
                }
            }

            let copied = match self.copier.copied_id(reader, field_id) {
                Some(id) => id,
                None => {
                    let obj = Object::Reference(field_id);
                    match self.copier.copy(&mut self.document, source, reader, &obj) {
                        Object::Reference(id) => id,
                        _ => continue,
                    }
                }
            };
            if !self.form_fields.contains(&copied) {
                self.form_fields.push(copied);
            }
            self.form_defaults.get_or_insert((reader, input));
        }
    }

    /// Merge the inputs' outlines, in the order the inputs appear in
    /// `sequences`.
    ///
    /// Each sequence must be a whole input used once.
    ///
    /// # Errors
    ///
    /// Returns an error if the outline cannot be attached.
    pub fn merge_outlines(&mut self, pool: &ReaderPool, sequences: &[Vec<PageRef>]) -> Result<()> {
        let page_ids = self.page_ids.clone();
        let mut root = None;
        let mut state = AppendState::new();
        let mut offset = 0u32;

        for sequence in sequences {
            let Some(first) = sequence.first() else {
                continue;
            };
            let items = read_outline(pool.document(first.input)?);
            if !items.is_empty() {
                if root.is_none() {
                    root = Some(BookmarkTreeBuilder::create_root(&mut self.document)?);
                }
                if let Some(root) = root {
                    BookmarkTreeBuilder::new(&page_ids)
                        .with_page_offset(offset)
                        .append(&mut self.document, &items, root, &mut state)?;
                }
            }
            offset += sequence.len() as u32;
        }

        if let Some(root) = root {
            log::debug!("merged {} bookmarks", state.total_count());
            BookmarkTreeBuilder::finish(&mut self.document, root, state)?;
        }
        Ok(())
    }

    /// Close the document and hand it over for writing.
    ///
    /// Form fields found on imported pages get a fresh `/AcroForm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog is missing.
    pub fn finish(mut self, pool: &ReaderPool) -> Result<Document> {
        if !self.form_fields.is_empty() {
            let mut form = dictionary! {
                "Fields" => self
                    .form_fields
                    .iter()
                    .map(|id| Object::Reference(*id))
                    .collect::<Vec<_>>(),
            };

            if let Some((reader, input)) = self.form_defaults
                && let Ok(source) = pool.document(input)
                && let Some(source_form) = acroform(source)
            {
                for key in [b"DA".as_slice(), b"DR", b"Q"] {
                    if let Ok(value) = source_form.get(key) {
                        let value = resolve(source, value).clone();
                        form.set(
                            key.to_vec(),
                            self.copier.copy(&mut self.document, source, reader, &value),
                        );
                    }
                }
            }

            let form_id = self.document.add_object(form);
            self.document
                .catalog_mut()?
                .set("AcroForm", Object::Reference(form_id));
        }
        Ok(self.document)
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenate page sequences in order (`cat`).
///
/// Document information comes from the first input. Outlines are merged
/// when `merge_bookmarks` is set.
///
/// # Errors
///
/// Returns the first import error.
pub fn cat(pool: &mut ReaderPool, sequences: &[Vec<PageRef>], merge_bookmarks: bool) -> Result<Document> {
    let mut output = OutputDocument::new();
    for page in sequences.iter().flatten() {
        output.import(pool, page)?;
    }
    log::debug!("assembled {} pages from {} sequences", output.page_count(), sequences.len());

    finish_assembly(output, pool, sequences, merge_bookmarks)
}

/// Interleave page sequences (`shuffle`).
///
/// Takes the first page of every sequence, then the second, and so on.
/// Shorter sequences drop out when exhausted.
///
/// # Errors
///
/// Returns the first import error.
pub fn shuffle(pool: &mut ReaderPool, sequences: &[Vec<PageRef>]) -> Result<Document> {
    let mut output = OutputDocument::new();
    let longest = sequences.iter().map(Vec::len).max().unwrap_or(0);
    for position in 0..longest {
        for sequence in sequences {
            if let Some(page) = sequence.get(position) {
                output.import(pool, page)?;
            }
        }
    }
    log::debug!("shuffled {} pages from {} sequences", output.page_count(), sequences.len());

    finish_assembly(output, pool, sequences, false)
}

fn finish_assembly(
    mut output: OutputDocument,
    pool: &ReaderPool,
    sequences: &[Vec<PageRef>],
    merge_bookmarks: bool,
) -> Result<Document> {
    if merge_bookmarks {
        output.merge_outlines(pool, sequences)?;
    }
    let first_input = sequences
        .iter()
        .flatten()
        .next()
        .map(|page| page.input)
        .unwrap_or(0);
    if let Ok(first) = pool.document(first_input) {
        copy_info(output.document_mut(), first)?;
    }
    output.finish(pool)
}

/// One single-page document per page of input 0 (`burst`).
///
/// # Errors
///
/// Returns the first import error.
pub fn burst(pool: &mut ReaderPool) -> Result<Vec<Document>> {
    let page_count = pool.page_count(0)?;
    let mut documents = Vec::with_capacity(page_count as usize);
    for page in 1..=page_count {
        pool.claim(0, page)?;
        let mut output = OutputDocument::new();
        output.import(pool, &PageRef::unrotated(0, page))?;
        copy_info(output.document_mut(), pool.document(0)?)?;
        documents.push(output.finish(pool)?);
    }
    Ok(documents)
}

/// Apply the rotations in `sequence` to input 0 in place (`rotate`).
///
/// Everything else about the document is kept.
///
/// # Errors
///
/// Returns an internal error if a referenced page does not exist.
pub fn rotate(pool: &mut ReaderPool, sequence: &[PageRef]) -> Result<Document> {
    let mut doc = pool.take_document(0)?;
    let pages = doc.get_pages();
    let mut seen = BTreeSet::new();

    for page in sequence.iter().filter(|p| p.rotates()) {
        if !seen.insert(page.page) {
            continue;
        }
        let page_id = pages.get(&page.page).copied().ok_or_else(|| {
            PdftkError::internal(format!("page {} missing from the document", page.page))
        })?;
        let degrees = page.resolve_rotation(rotation(&doc, page_id));
        set_rotation(&mut doc, page_id, degrees)?;
    }
    Ok(doc)
}
