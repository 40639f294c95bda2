//! The `dump_data` / `update_info` record format.
//!
//! A report is a sequence of `Key: value` lines. Multi-line records start
//! with a `...Begin` line and run until the next `...Begin` line or the
//! end of the file:
//!
//! ```text
//! InfoBegin
//! InfoKey: Title
//! InfoValue: Annual Report
//! PdfID0: 8a3c...
//! PdfID1: 8a3c...
//! NumberOfPages: 12
//! BookmarkBegin
//! BookmarkTitle: Introduction
//! BookmarkLevel: 1
//! BookmarkPageNumber: 1
//! PageLabelBegin
//! PageLabelNewIndex: 1
//! PageLabelStart: 1
//! PageLabelNumStyle: LowercaseRomanNumerals
//! ```
//!
//! Unless the `_utf8` variant is used, non-ASCII text is written as XML
//! numeric entities and entities are decoded when reading.

use lopdf::{Dictionary, Document, Object};

use super::encoding::{decode_object, encode_text, escape_xml, unescape_xml};
use crate::assemble::bookmarks::{Bookmark, BookmarkTreeBuilder, TitleEncoding, read_outline};
use crate::assemble::metadata;
use crate::error::Result;
use crate::utils::{get_array, get_dict, resolve};

/// Numbering style of a page label range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStyle {
    /// 1, 2, 3
    DecimalArabicNumerals,
    /// I, II, III
    UppercaseRomanNumerals,
    /// i, ii, iii
    LowercaseRomanNumerals,
    /// A, B, C
    UppercaseLetters,
    /// a, b, c
    LowercaseLetters,
    /// Prefix only.
    NoNumber,
}

impl NumberStyle {
    const NAMES: [(&'static str, &'static [u8], NumberStyle); 5] = [
        ("DecimalArabicNumerals", b"D", NumberStyle::DecimalArabicNumerals),
        ("UppercaseRomanNumerals", b"R", NumberStyle::UppercaseRomanNumerals),
        ("LowercaseRomanNumerals", b"r", NumberStyle::LowercaseRomanNumerals),
        ("UppercaseLetters", b"A", NumberStyle::UppercaseLetters),
        ("LowercaseLetters", b"a", NumberStyle::LowercaseLetters),
    ];

    /// Name used in reports.
    pub fn name(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, _, style)| style == self)
            .map_or("NoNumber", |(name, _, _)| name)
    }

    /// Parse a report name.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "NoNumber" {
            return Some(Self::NoNumber);
        }
        Self::NAMES
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, _, style)| *style)
    }

    fn from_pdf_name(name: &[u8]) -> Self {
        Self::NAMES
            .iter()
            .find(|(_, n, _)| *n == name)
            .map_or(Self::NoNumber, |(_, _, style)| *style)
    }

    fn pdf_name(&self) -> Option<&'static [u8]> {
        Self::NAMES
            .iter()
            .find(|(_, _, style)| style == self)
            .map(|(_, n, _)| *n)
    }
}

/// One page label range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLabel {
    /// 1-based page where the range starts.
    pub new_index: u32,
    /// First number of the range.
    pub start: u32,
    /// Text placed before the number.
    pub prefix: Option<String>,
    /// Numbering style.
    pub num_style: NumberStyle,
}

/// Everything a `dump_data` report carries.
#[derive(Debug, Clone, Default)]
pub struct DocumentData {
    /// Info dictionary entries, in document order.
    pub info: Vec<(String, String)>,
    /// First trailer identifier, hex.
    pub id0: Option<String>,
    /// Second trailer identifier, hex.
    pub id1: Option<String>,
    /// Page count.
    pub number_of_pages: Option<u32>,
    /// Outline in pre-order.
    pub bookmarks: Vec<Bookmark>,
    /// How bookmark titles are stored in `bookmarks`.
    pub title_encoding: TitleEncoding,
    /// Page label ranges.
    pub page_labels: Vec<PageLabel>,
}

impl DocumentData {
    /// Collect the report data of a document.
    pub fn from_document(doc: &Document) -> Self {
        let info = metadata::info(doc)
            .map(|dict| {
                dict.iter()
                    .filter_map(|(key, value)| match resolve(doc, value) {
                        obj @ Object::String(..) => Some((
                            String::from_utf8_lossy(key).into_owned(),
                            decode_object(obj),
                        )),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (id0, id1) = match metadata::file_id(doc) {
            Some((first, second)) => (Some(metadata::hex(&first)), Some(metadata::hex(&second))),
            None => (None, None),
        };

        Self {
            info,
            id0,
            id1,
            number_of_pages: Some(doc.get_pages().len() as u32),
            bookmarks: read_outline(doc),
            title_encoding: TitleEncoding::Utf8,
            page_labels: read_page_labels(doc),
        }
    }

    /// Render the report. `utf8` keeps non-ASCII text as-is.
    pub fn render(&self, utf8: bool) -> String {
        let text = |value: &str| {
            if utf8 {
                value.to_string()
            } else {
                escape_xml(value)
            }
        };
        let mut out = String::new();

        for (key, value) in &self.info {
            out.push_str("InfoBegin\n");
            out.push_str(&format!("InfoKey: {}\n", text(key)));
            out.push_str(&format!("InfoValue: {}\n", text(value)));
        }
        if let Some(id0) = &self.id0 {
            out.push_str(&format!("PdfID0: {id0}\n"));
        }
        if let Some(id1) = &self.id1 {
            out.push_str(&format!("PdfID1: {id1}\n"));
        }
        if let Some(pages) = self.number_of_pages {
            out.push_str(&format!("NumberOfPages: {pages}\n"));
        }
        for bookmark in &self.bookmarks {
            let title = match (self.title_encoding, utf8) {
                (TitleEncoding::XmlEntities, true) => unescape_xml(&bookmark.title),
                (TitleEncoding::XmlEntities, false) => bookmark.title.clone(),
                (TitleEncoding::Utf8, _) => text(&bookmark.title),
            };
            out.push_str("BookmarkBegin\n");
            out.push_str(&format!("BookmarkTitle: {title}\n"));
            out.push_str(&format!("BookmarkLevel: {}\n", bookmark.level));
            out.push_str(&format!("BookmarkPageNumber: {}\n", bookmark.page_number));
        }
        for label in &self.page_labels {
            out.push_str("PageLabelBegin\n");
            out.push_str(&format!("PageLabelNewIndex: {}\n", label.new_index));
            out.push_str(&format!("PageLabelStart: {}\n", label.start));
            if let Some(prefix) = &label.prefix {
                out.push_str(&format!("PageLabelPrefix: {}\n", text(prefix)));
            }
            out.push_str(&format!("PageLabelNumStyle: {}\n", label.num_style.name()));
        }
        out
    }

    /// Parse a report. Problems are returned as warnings; the affected
    /// record is skipped.
    pub fn parse(input: &str, utf8: bool) -> (Self, Vec<String>) {
        let mut parser = RecordParser::new(utf8);
        for (number, line) in input.lines().enumerate() {
            parser.line(number + 1, line.trim_end_matches('\r'));
        }
        parser.finish()
    }

    /// Apply Info entries, bookmarks and page labels to a document.
    ///
    /// An empty `InfoValue` removes the key. Bookmarks and page labels
    /// replace the existing ones only when the report has any.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no catalog or a bookmark has
    /// level 0.
    pub fn apply(&self, doc: &mut Document) -> Result<()> {
        if !self.info.is_empty() {
            let info = metadata::info_mut(doc)?;
            for (key, value) in &self.info {
                if value.is_empty() {
                    info.remove(key.as_bytes());
                } else {
                    info.set(key.as_bytes().to_vec(), encode_text(value));
                }
            }
        }

        if !self.bookmarks.is_empty() {
            let page_ids: Vec<_> = doc.get_pages().into_values().collect();
            BookmarkTreeBuilder::new(&page_ids)
                .with_encoding(self.title_encoding)
                .build(doc, &self.bookmarks)?;
        }

        if !self.page_labels.is_empty() {
            write_page_labels(doc, &self.page_labels)?;
        }
        Ok(())
    }
}

/// Page labels from the catalog's number tree.
pub fn read_page_labels(doc: &Document) -> Vec<PageLabel> {
    let Ok(catalog) = doc.catalog() else {
        return Vec::new();
    };
    let Some(tree) = get_dict(doc, catalog, b"PageLabels") else {
        return Vec::new();
    };

    let mut labels = Vec::new();
    collect_labels(doc, tree, &mut labels, 0);
    labels.sort_by_key(|label| label.new_index);
    labels
}

fn collect_labels(doc: &Document, node: &Dictionary, labels: &mut Vec<PageLabel>, depth: usize) {
    if depth > 32 {
        return;
    }

    if let Some(nums) = get_array(doc, node, b"Nums") {
        for pair in nums.chunks(2) {
            let [index, label] = pair else { continue };
            let Ok(index) = resolve(doc, index).as_i64() else {
                continue;
            };
            let Ok(label) = resolve(doc, label).as_dict() else {
                continue;
            };

            let num_style = label
                .get(b"S")
                .and_then(Object::as_name)
                .map_or(NumberStyle::NoNumber, NumberStyle::from_pdf_name);
            let start = label
                .get(b"St")
                .ok()
                .and_then(|st| resolve(doc, st).as_i64().ok())
                .unwrap_or(1);
            let prefix = label
                .get(b"P")
                .ok()
                .map(|p| decode_object(resolve(doc, p)));

            labels.push(PageLabel {
                new_index: u32::try_from(index + 1).unwrap_or(1),
                start: u32::try_from(start).unwrap_or(1),
                prefix,
                num_style,
            });
        }
    }

    if let Some(kids) = get_array(doc, node, b"Kids") {
        for kid in kids {
            if let Ok(kid) = resolve(doc, kid).as_dict() {
                collect_labels(doc, kid, labels, depth + 1);
            }
        }
    }
}

fn write_page_labels(doc: &mut Document, labels: &[PageLabel]) -> Result<()> {
    let mut sorted = labels.to_vec();
    sorted.sort_by_key(|label| label.new_index);

    let mut nums = Vec::with_capacity(sorted.len() * 2);
    for label in &sorted {
        let mut dict = Dictionary::new();
        if let Some(style) = label.num_style.pdf_name() {
            dict.set("S", Object::Name(style.to_vec()));
        }
        if let Some(prefix) = &label.prefix {
            dict.set("P", encode_text(prefix));
        }
        if label.start != 1 {
            dict.set("St", Object::Integer(i64::from(label.start)));
        }
        nums.push(Object::Integer(i64::from(label.new_index.saturating_sub(1))));
        nums.push(Object::Dictionary(dict));
    }

    let mut tree = Dictionary::new();
    tree.set("Nums", Object::Array(nums));
    let tree_id = doc.add_object(tree);
    doc.catalog_mut()?.set("PageLabels", Object::Reference(tree_id));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Info,
    Bookmark,
    PageMedia,
    PageLabel,
}

impl RecordKind {
    fn from_begin(line: &str) -> Option<Self> {
        match line {
            "InfoBegin" => Some(Self::Info),
            "BookmarkBegin" => Some(Self::Bookmark),
            "PageMediaBegin" => Some(Self::PageMedia),
            "PageLabelBegin" => Some(Self::PageLabel),
            _ => None,
        }
    }

    /// Field prefix shared by every key of this record.
    fn prefix(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Bookmark => "Bookmark",
            Self::PageMedia => "PageMedia",
            Self::PageLabel => "PageLabel",
        }
    }
}

#[derive(Debug)]
struct Record {
    kind: RecordKind,
    line: usize,
    fields: Vec<(String, String)>,
}

impl Record {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct RecordParser {
    utf8: bool,
    data: DocumentData,
    warnings: Vec<String>,
    current: Option<Record>,
}

impl RecordParser {
    fn new(utf8: bool) -> Self {
        let data = DocumentData {
            title_encoding: if utf8 {
                TitleEncoding::Utf8
            } else {
                TitleEncoding::XmlEntities
            },
            ..DocumentData::default()
        };
        Self {
            utf8,
            data,
            warnings: Vec::new(),
            current: None,
        }
    }

    fn text(&self, value: &str) -> String {
        if self.utf8 {
            value.to_string()
        } else {
            unescape_xml(value)
        }
    }

    fn line(&mut self, number: usize, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        if let Some(kind) = RecordKind::from_begin(line.trim()) {
            self.close();
            self.current = Some(Record {
                kind,
                line: number,
                fields: Vec::new(),
            });
            return;
        }

        let Some((key, value)) = line.split_once(':') else {
            self.warnings
                .push(format!("line {number}: unexpected data: {line}"));
            return;
        };
        let key = key.trim();
        let value = value.strip_prefix(' ').unwrap_or(value);

        match key {
            "PdfID0" | "PdfID1" | "NumberOfPages" => {
                self.close();
                match key {
                    "PdfID0" => self.data.id0 = Some(value.trim().to_string()),
                    "PdfID1" => self.data.id1 = Some(value.trim().to_string()),
                    _ => self.data.number_of_pages = value.trim().parse().ok(),
                }
                return;
            }
            // Older reports list InfoKey/InfoValue pairs without InfoBegin.
            "InfoKey"
                if self
                    .current
                    .as_ref()
                    .is_none_or(|r| r.kind != RecordKind::Info || r.field("InfoKey").is_some()) =>
            {
                self.close();
                self.current = Some(Record {
                    kind: RecordKind::Info,
                    line: number,
                    fields: Vec::new(),
                });
            }
            _ => {}
        }

        let Some(record) = self.current.as_mut() else {
            self.warnings
                .push(format!("line {number}: {key} outside of a record"));
            return;
        };
        if !key.starts_with(record.kind.prefix()) {
            self.warnings.push(format!(
                "line {number}: {key} does not belong in a {}Begin record",
                record.kind.prefix()
            ));
            return;
        }
        if record.field(key).is_some() {
            self.warnings
                .push(format!("line {number}: duplicate {key}; keeping the first value"));
            return;
        }
        record.fields.push((key.to_string(), value.to_string()));
    }

    fn close(&mut self) {
        let Some(record) = self.current.take() else {
            return;
        };
        let incomplete = |warnings: &mut Vec<String>, missing: &str| {
            warnings.push(format!(
                "line {}: {}Begin record is missing {missing}; record ignored",
                record.line,
                record.kind.prefix()
            ));
        };

        match record.kind {
            RecordKind::Info => match (record.field("InfoKey"), record.field("InfoValue")) {
                (Some(key), Some(value)) => {
                    let entry = (self.text(key), self.text(value));
                    self.data.info.push(entry);
                }
                (None, _) => incomplete(&mut self.warnings, "InfoKey"),
                (_, None) => incomplete(&mut self.warnings, "InfoValue"),
            },
            RecordKind::Bookmark => {
                let title = record.field("BookmarkTitle");
                let level = record.field("BookmarkLevel").map(|l| l.trim().parse::<u32>());
                let page = record
                    .field("BookmarkPageNumber")
                    .map(|p| p.trim().parse::<u32>());
                match (title, level, page) {
                    (Some(title), Some(Ok(level)), Some(Ok(page))) if level > 0 => {
                        let deepest = self.data.bookmarks.last().map_or(1, |b| b.level + 1);
                        if level > deepest {
                            self.warnings.push(format!(
                                "line {}: BookmarkLevel {level} skips levels; using {deepest}",
                                record.line
                            ));
                        }
                        // Titles stay encoded; the tree builder decodes them.
                        self.data
                            .bookmarks
                            .push(Bookmark::new(title, level.min(deepest), page));
                    }
                    (None, _, _) => incomplete(&mut self.warnings, "BookmarkTitle"),
                    (_, None, _) => incomplete(&mut self.warnings, "BookmarkLevel"),
                    (_, _, None) => incomplete(&mut self.warnings, "BookmarkPageNumber"),
                    _ => incomplete(&mut self.warnings, "a valid level or page number"),
                }
            }
            RecordKind::PageMedia => {}
            RecordKind::PageLabel => {
                let index = record
                    .field("PageLabelNewIndex")
                    .and_then(|v| v.trim().parse::<u32>().ok())
                    .filter(|&v| v > 0);
                let start = record
                    .field("PageLabelStart")
                    .map_or(Some(1), |v| v.trim().parse::<u32>().ok());
                let style = record
                    .field("PageLabelNumStyle")
                    .map_or(Some(NumberStyle::DecimalArabicNumerals), |v| {
                        NumberStyle::from_name(v.trim())
                    });
                match (index, start, style) {
                    (Some(new_index), Some(start), Some(num_style)) => {
                        let prefix = record.field("PageLabelPrefix").map(|p| self.text(p));
                        self.data.page_labels.push(PageLabel {
                            new_index,
                            start,
                            prefix,
                            num_style,
                        });
                    }
                    (None, _, _) => incomplete(&mut self.warnings, "PageLabelNewIndex"),
                    (_, None, _) => incomplete(&mut self.warnings, "a valid PageLabelStart"),
                    (_, _, None) => incomplete(&mut self.warnings, "a valid PageLabelNumStyle"),
                }
            }
        }
    }

    fn finish(mut self) -> (DocumentData, Vec<String>) {
        self.close();
        (self.data, self.warnings)
    }
}
