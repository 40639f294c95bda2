//! Bookmark (outline) reading and reconstruction.
//!
//! Outlines travel through pdftk as a flat, pre-ordered list of
//! [`Bookmark`]s whose `level` field encodes the tree: an item of level
//! *n* is a child of the nearest preceding item with a lower level. The
//! list comes from an existing outline ([`read_outline`]) or from a
//! dump_data file, and [`BookmarkTreeBuilder`] turns it back into linked
//! outline dictionaries.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{PdftkError, Result};
use crate::report::encoding::{decode_object, encode_text, unescape_xml};
use crate::utils::{get_dict, resolve};

/// One outline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    /// Display title.
    pub title: String,
    /// Nesting depth, 1 for top-level entries.
    pub level: u32,
    /// 1-based target page, 0 for no destination.
    pub page_number: u32,
}

impl Bookmark {
    /// Create a bookmark.
    pub fn new(title: impl Into<String>, level: u32, page_number: u32) -> Self {
        Self {
            title: title.into(),
            level,
            page_number,
        }
    }
}

/// Read the outline of a document as a flat, pre-ordered list.
///
/// Entries whose destination cannot be resolved to a page (named
/// destinations, non-GoTo actions, malformed arrays) are kept with
/// `page_number` 0.
pub fn read_outline(doc: &Document) -> Vec<Bookmark> {
    let Ok(catalog) = doc.catalog() else {
        return Vec::new();
    };
    let Some(outlines) = get_dict(doc, catalog, b"Outlines") else {
        return Vec::new();
    };

    let page_numbers: HashMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect();

    let mut bookmarks = Vec::new();
    let mut visited = HashSet::new();
    if let Ok(first) = outlines.get(b"First").and_then(Object::as_reference) {
        read_siblings(doc, first, 1, &page_numbers, &mut visited, &mut bookmarks);
    }
    bookmarks
}

/// Walk an outline in pre-order. Each stack entry is the next sibling
/// to visit at some level.
fn read_siblings(
    doc: &Document,
    first: ObjectId,
    level: u32,
    page_numbers: &HashMap<ObjectId, u32>,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<Bookmark>,
) {
    let mut pending = vec![(first, level)];
    while let Some((id, level)) = pending.pop() {
        if !visited.insert(id) {
            log::warn!("outline item {id:?} is linked more than once; stopping there");
            continue;
        }
        let Ok(item) = doc.get_dictionary(id) else {
            continue;
        };

        let title = item
            .get(b"Title")
            .map(|t| decode_object(resolve(doc, t)))
            .unwrap_or_default();
        let page_number = destination_page(doc, item, page_numbers);
        out.push(Bookmark::new(title, level, page_number));

        if let Ok(next) = item.get(b"Next").and_then(Object::as_reference) {
            pending.push((next, level));
        }
        if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
            pending.push((child, level + 1));
        }
    }
}

fn destination_page(
    doc: &Document,
    item: &Dictionary,
    page_numbers: &HashMap<ObjectId, u32>,
) -> u32 {
    let dest = match item.get(b"Dest") {
        Ok(dest) => Some(resolve(doc, dest)),
        Err(_) => get_dict(doc, item, b"A")
            .filter(|action| {
                action
                    .get(b"S")
                    .and_then(Object::as_name)
                    .is_ok_and(|s| s == b"GoTo")
            })
            .and_then(|action| action.get(b"D").ok())
            .map(|d| resolve(doc, d)),
    };

    let page = dest
        .and_then(|d| d.as_array().ok())
        .and_then(|array| array.first())
        .and_then(|target| target.as_reference().ok())
        .and_then(|id| page_numbers.get(&id).copied());
    page.unwrap_or(0)
}

/// How bookmark titles are encoded in the input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleEncoding {
    /// Titles are plain text.
    #[default]
    Utf8,
    /// Titles may contain XML entities (non-`_utf8` dump data).
    XmlEntities,
}

/// Progress of an outline built across several calls.
///
/// The trailing sibling is kept out of the document until the next sibling
/// (from a later call) or [`BookmarkTreeBuilder::finish`] completes its
/// `/Next` link.
#[derive(Debug, Default)]
pub struct AppendState {
    first: Option<ObjectId>,
    pending: Option<(ObjectId, Dictionary)>,
    children: i64,
    descendants: i64,
}

impl AppendState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outline items created so far, at every level.
    pub fn total_count(&self) -> i64 {
        self.descendants
    }

    /// Number of items created at the top level.
    pub fn child_count(&self) -> i64 {
        self.children
    }

    fn push(&mut self, doc: &mut Document, id: ObjectId, mut dict: Dictionary) {
        if let Some((prev_id, mut prev)) = self.pending.take() {
            prev.set("Next", Object::Reference(id));
            doc.objects.insert(prev_id, Object::Dictionary(prev));
            dict.set("Prev", Object::Reference(prev_id));
        }
        self.first.get_or_insert(id);
        self.pending = Some((id, dict));
        self.children += 1;
        self.descendants += 1;
    }

    /// Insert the trailing item and return the (first, last) ids.
    fn flush(&mut self, doc: &mut Document) -> Option<(ObjectId, ObjectId)> {
        let (last_id, last) = self.pending.take()?;
        doc.objects.insert(last_id, Object::Dictionary(last));
        self.first.map(|first| (first, last_id))
    }
}

/// Rebuilds linked outline dictionaries from a flat bookmark list.
#[derive(Debug, Clone)]
pub struct BookmarkTreeBuilder<'a> {
    page_ids: &'a [ObjectId],
    page_offset: u32,
    level_offset: u32,
    encoding: TitleEncoding,
}

impl<'a> BookmarkTreeBuilder<'a> {
    /// Create a builder resolving page numbers against `page_ids`
    /// (the output's pages in order).
    pub fn new(page_ids: &'a [ObjectId]) -> Self {
        Self {
            page_ids,
            page_offset: 0,
            level_offset: 0,
            encoding: TitleEncoding::Utf8,
        }
    }

    /// Shift every destination by `offset` pages.
    pub fn with_page_offset(mut self, offset: u32) -> Self {
        self.page_offset = offset;
        self
    }

    /// Nest every item `offset` levels deeper.
    pub fn with_level_offset(mut self, offset: u32) -> Self {
        self.level_offset = offset;
        self
    }

    /// Set how titles are encoded.
    pub fn with_encoding(mut self, encoding: TitleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replace the document's outline with one built from `items`.
    ///
    /// An empty list removes the outline.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no catalog.
    pub fn build(&self, doc: &mut Document, items: &[Bookmark]) -> Result<()> {
        if items.is_empty() {
            doc.catalog_mut()?.remove(b"Outlines");
            return Ok(());
        }

        let root = Self::create_root(doc)?;
        let mut state = AppendState::new();
        self.append(doc, items, root, &mut state)?;
        Self::finish(doc, root, state)
    }

    /// Create an empty outline root and attach it to the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no catalog.
    pub fn create_root(doc: &mut Document) -> Result<ObjectId> {
        let root = doc.add_object(dictionary! { "Type" => "Outlines" });
        doc.catalog_mut()?.set("Outlines", Object::Reference(root));
        Ok(root)
    }

    /// Append `items` under the outline root, continuing after whatever
    /// earlier calls with the same `state` produced.
    ///
    /// # Errors
    ///
    /// Returns an error if an item has level 0.
    pub fn append(
        &self,
        doc: &mut Document,
        items: &[Bookmark],
        root: ObjectId,
        state: &mut AppendState,
    ) -> Result<()> {
        if let Some(bad) = items.iter().find(|b| b.level == 0) {
            return Err(PdftkError::usage(format!(
                "Bookmark level must be at least 1: {}",
                bad.title
            )));
        }

        self.build_levels(doc, items, root, state);
        Ok(())
    }

    /// Link the trailing item and set the root's First, Last and Count.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the root is missing.
    pub fn finish(doc: &mut Document, root: ObjectId, mut state: AppendState) -> Result<()> {
        let ends = state.flush(doc);
        let root_dict = doc
            .get_object_mut(root)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdftkError::internal("outline root disappeared while building"))?;

        match ends {
            Some((first, last)) => {
                root_dict.set("First", Object::Reference(first));
                root_dict.set("Last", Object::Reference(last));
                root_dict.set("Count", Object::Integer(state.descendants));
            }
            None => {
                root_dict.set("Count", Object::Integer(0));
            }
        }
        Ok(())
    }

    fn item_level(&self, item: &Bookmark) -> u32 {
        item.level.saturating_add(self.level_offset)
    }

    /// Link `items` below `root` in pre-order.
    ///
    /// Open items wait on a stack until an item at their level or above
    /// closes them. Items deeper than the next child level get empty
    /// placeholder parents so no level is skipped.
    fn build_levels(
        &self,
        doc: &mut Document,
        items: &[Bookmark],
        root: ObjectId,
        state: &mut AppendState,
    ) {
        let mut open: Vec<OpenItem> = Vec::new();

        for item in items {
            let level = self.item_level(item);
            while open.last().is_some_and(|top| top.level >= level) {
                close_item(doc, &mut open, state);
            }

            loop {
                let child_level = open.last().map_or(1, |top| top.level + 1);
                let parent = open.last().map_or(root, |top| top.id);
                let mut node = if child_level == level {
                    self.materialize(item)
                } else {
                    log::debug!("inserting placeholder bookmark at level {child_level}");
                    dictionary! { "Title" => encode_text("") }
                };
                node.set("Parent", Object::Reference(parent));
                open.push(OpenItem {
                    id: doc.new_object_id(),
                    node,
                    level: child_level,
                    children: AppendState::new(),
                });
                if child_level == level {
                    break;
                }
            }
        }

        while !open.is_empty() {
            close_item(doc, &mut open, state);
        }
    }

    fn materialize(&self, item: &Bookmark) -> Dictionary {
        let title = match self.encoding {
            TitleEncoding::Utf8 => item.title.clone(),
            TitleEncoding::XmlEntities => unescape_xml(&item.title),
        };

        let mut node = dictionary! { "Title" => encode_text(&title) };
        if item.page_number > 0 {
            let index = item.page_number + self.page_offset - 1;
            match self.page_ids.get(index as usize) {
                Some(page_id) => {
                    node.set(
                        "Dest",
                        Object::Array(vec![Object::Reference(*page_id), Object::Name(b"Fit".to_vec())]),
                    );
                }
                None => log::warn!(
                    "bookmark {title:?} points past the last page; keeping it without a destination"
                ),
            }
        }
        node
    }
}

/// An outline item whose children are still being linked.
#[derive(Debug)]
struct OpenItem {
    id: ObjectId,
    node: Dictionary,
    level: u32,
    children: AppendState,
}

/// Finish the innermost open item and chain it to its parent's children,
/// or to `state` at the top.
fn close_item(doc: &mut Document, open: &mut Vec<OpenItem>, state: &mut AppendState) {
    let Some(OpenItem {
        id,
        mut node,
        mut children,
        ..
    }) = open.pop()
    else {
        return;
    };
    if let Some((first, last)) = children.flush(doc) {
        node.set("First", Object::Reference(first));
        node.set("Last", Object::Reference(last));
        node.set("Count", Object::Integer(children.children));
    }

    let chain = match open.last_mut() {
        Some(parent) => &mut parent.children,
        None => state,
    };
    chain.push(doc, id, node);
    chain.descendants += children.descendants;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with_pages(count: usize) -> (Document, Vec<ObjectId>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_ids: Vec<ObjectId> = (0..count)
            .map(|_| doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id }))
            .collect();
        let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
        doc.objects.insert(
            pages_id,
            dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count as i64 }.into(),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        (doc, page_ids)
    }

    fn outline_root(doc: &Document) -> &Dictionary {
        get_dict(doc, doc.catalog().unwrap(), b"Outlines").unwrap()
    }

    fn child<'d>(doc: &'d Document, dict: &Dictionary, key: &[u8]) -> &'d Dictionary {
        let id = dict.get(key).unwrap().as_reference().unwrap();
        doc.get_dictionary(id).unwrap()
    }

    fn title(dict: &Dictionary) -> String {
        decode_object(dict.get(b"Title").unwrap())
    }

    #[test]
    fn test_build_nested_tree() {
        let (mut doc, pages) = document_with_pages(3);
        let items = vec![
            Bookmark::new("T1", 1, 1),
            Bookmark::new("T2", 2, 2),
            Bookmark::new("T3", 2, 3),
        ];
        BookmarkTreeBuilder::new(&pages).build(&mut doc, &items).unwrap();

        let root = outline_root(&doc);
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 3);
        assert_eq!(root.get(b"First").unwrap(), root.get(b"Last").unwrap());

        let t1 = child(&doc, root, b"First");
        assert_eq!(title(t1), "T1");
        assert_eq!(t1.get(b"Count").unwrap().as_i64().unwrap(), 2);
        assert!(t1.get(b"Next").is_err());

        let t2 = child(&doc, t1, b"First");
        let t3 = child(&doc, t1, b"Last");
        assert_eq!(title(t2), "T2");
        assert_eq!(title(t3), "T3");
        assert_eq!(title(child(&doc, t2, b"Next")), "T3");
        assert_eq!(title(child(&doc, t3, b"Prev")), "T2");

        let dest = t3.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0], Object::Reference(pages[2]));
        assert_eq!(dest[1], Object::Name(b"Fit".to_vec()));
    }

    #[test]
    fn test_level_jump_inserts_placeholder() {
        let (mut doc, pages) = document_with_pages(1);
        let items = vec![Bookmark::new("T1", 2, 1)];
        BookmarkTreeBuilder::new(&pages).build(&mut doc, &items).unwrap();

        let root = outline_root(&doc);
        let placeholder = child(&doc, root, b"First");
        assert_eq!(title(placeholder), "");
        assert!(placeholder.get(b"Dest").is_err());
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 2);

        let t1 = child(&doc, placeholder, b"First");
        assert_eq!(title(t1), "T1");
    }

    #[test]
    fn test_deep_nesting_builds_and_reads_back() {
        let (mut doc, pages) = document_with_pages(1);
        let items: Vec<Bookmark> = (1..=100_000)
            .map(|level| Bookmark::new(format!("L{level}"), level, 1))
            .collect();
        BookmarkTreeBuilder::new(&pages).build(&mut doc, &items).unwrap();

        let root = outline_root(&doc);
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 100_000);
        assert_eq!(read_outline(&doc), items);
    }

    #[test]
    fn test_large_level_jump_fills_every_level() {
        let (mut doc, pages) = document_with_pages(1);
        let items = vec![Bookmark::new("Deep", 50_000, 1), Bookmark::new("Top", 1, 1)];
        BookmarkTreeBuilder::new(&pages).build(&mut doc, &items).unwrap();

        let outline = read_outline(&doc);
        assert_eq!(outline.len(), 50_001);
        assert_eq!(outline[49_999], Bookmark::new("Deep", 50_000, 1));
        assert_eq!(outline[50_000], Bookmark::new("Top", 1, 1));
        assert!(outline[..49_999].iter().all(|b| b.title.is_empty()));
    }

    #[test]
    fn test_serial_append_links_across_calls() {
        let (mut doc, pages) = document_with_pages(4);
        let root = BookmarkTreeBuilder::create_root(&mut doc).unwrap();
        let mut state = AppendState::new();

        let first_doc = vec![Bookmark::new("A", 1, 1), Bookmark::new("A.1", 2, 2)];
        BookmarkTreeBuilder::new(&pages)
            .append(&mut doc, &first_doc, root, &mut state)
            .unwrap();

        let second_doc = vec![Bookmark::new("B", 1, 1)];
        BookmarkTreeBuilder::new(&pages)
            .with_page_offset(2)
            .append(&mut doc, &second_doc, root, &mut state)
            .unwrap();
        assert_eq!(state.child_count(), 2);
        BookmarkTreeBuilder::finish(&mut doc, root, state).unwrap();

        let root = outline_root(&doc);
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 3);
        let a = child(&doc, root, b"First");
        let b = child(&doc, root, b"Last");
        assert_eq!(title(a), "A");
        assert_eq!(title(b), "B");
        assert_eq!(title(child(&doc, a, b"Next")), "B");
        assert_eq!(title(child(&doc, b, b"Prev")), "A");

        let dest = b.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0], Object::Reference(pages[2]));
    }

    #[test]
    fn test_read_outline_round_trip() {
        let (mut doc, pages) = document_with_pages(3);
        let items = vec![
            Bookmark::new("Intro", 1, 1),
            Bookmark::new("Detail", 2, 3),
            Bookmark::new("Orphan", 1, 0),
            Bookmark::new("Ünïcode", 1, 2),
        ];
        BookmarkTreeBuilder::new(&pages).build(&mut doc, &items).unwrap();

        assert_eq!(read_outline(&doc), items);
    }

    #[test]
    fn test_xml_entity_titles() {
        let (mut doc, pages) = document_with_pages(1);
        let items = vec![Bookmark::new("Caf&#233; &amp; Bar", 1, 1)];
        BookmarkTreeBuilder::new(&pages)
            .with_encoding(TitleEncoding::XmlEntities)
            .build(&mut doc, &items)
            .unwrap();
        assert_eq!(read_outline(&doc)[0].title, "Café & Bar");
    }

    #[test]
    fn test_named_destination_reads_as_page_zero() {
        let (mut doc, pages) = document_with_pages(1);
        BookmarkTreeBuilder::new(&pages)
            .build(&mut doc, &[Bookmark::new("Named", 1, 1)])
            .unwrap();

        let root_id = doc
            .catalog()
            .unwrap()
            .get(b"Outlines")
            .unwrap()
            .as_reference()
            .unwrap();
        let item_id = doc
            .get_dictionary(root_id)
            .unwrap()
            .get(b"First")
            .unwrap()
            .as_reference()
            .unwrap();
        let item = doc.get_object_mut(item_id).unwrap().as_dict_mut().unwrap();
        item.remove(b"Dest");
        item.set(
            "A",
            dictionary! { "S" => "GoTo", "D" => Object::String(b"chapter1".to_vec(), lopdf::StringFormat::Literal) },
        );

        assert_eq!(read_outline(&doc), vec![Bookmark::new("Named", 1, 0)]);
    }

    #[test]
    fn test_empty_list_removes_outline() {
        let (mut doc, pages) = document_with_pages(1);
        BookmarkTreeBuilder::new(&pages)
            .build(&mut doc, &[Bookmark::new("x", 1, 1)])
            .unwrap();
        BookmarkTreeBuilder::new(&pages).build(&mut doc, &[]).unwrap();
        assert!(read_outline(&doc).is_empty());
    }
}
