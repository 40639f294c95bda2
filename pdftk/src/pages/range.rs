//! Page-range token resolution.
//!
//! Grammar of one token:
//!
//! ```text
//! [HANDLE][r](N|end)[-[r](N|end)][even|odd|north|south|east|west|left|right|down]...
//! ```
//!
//! `HANDLE` is a run of uppercase letters naming an input document; with no
//! handle the token refers to the first input. A leading `r` counts from
//! the end of the document (`r1` is the last page). An empty bound pair
//! means the whole document.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{PdftkError, RangeEndpoint, Result};
use crate::io::ReaderPool;
use crate::pages::{PageRef, Rotation};

/// Keyword suffixes accepted after the bounds, with the rotation they
/// select and whether it is absolute.
const ROTATIONS: &[(&str, Rotation, bool)] = &[
    ("north", Rotation::North, true),
    ("east", Rotation::East, true),
    ("south", Rotation::South, true),
    ("west", Rotation::West, true),
    ("left", Rotation::West, false),
    ("right", Rotation::East, false),
    ("down", Rotation::South, false),
];

/// A resolved page-range token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRange {
    /// Index of the referenced input document.
    pub input: usize,
    /// First page, 1-based. Greater than `end` for reversed ranges.
    pub begin: u32,
    /// Last page, 1-based.
    pub end: u32,
    /// Keep only even pages.
    pub even: bool,
    /// Keep only odd pages.
    pub odd: bool,
    /// Rotation keyword, if any, and whether it is absolute.
    pub rotation: Option<(Rotation, bool)>,
    /// The token named the whole, unfiltered document.
    pub full_document: bool,
}

impl PageRange {
    /// The whole of one input document, unfiltered and unrotated.
    pub fn whole(input: usize, page_count: u32) -> Self {
        Self {
            input,
            begin: 1,
            end: page_count,
            even: false,
            odd: false,
            rotation: None,
            full_document: true,
        }
    }

    /// Page numbers selected by this range, in output order.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdftk::pages::PageRange;
    ///
    /// let mut range = PageRange::whole(0, 3);
    /// range.begin = 3;
    /// range.end = 1;
    /// assert_eq!(range.pages(), vec![3, 2, 1]);
    /// ```
    pub fn pages(&self) -> Vec<u32> {
        if self.begin == 0 || self.end == 0 {
            return Vec::new();
        }

        let low = self.begin.min(self.end);
        let high = self.begin.max(self.end);
        let mut pages: Vec<u32> = (low..=high).filter(|&p| self.keeps(p)).collect();
        if self.begin > self.end {
            pages.reverse();
        }
        pages
    }

    fn keeps(&self, page: u32) -> bool {
        (!self.even || page % 2 == 0) && (!self.odd || page % 2 == 1)
    }

    /// Build page references for this range, claiming each page in the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot open another reader instance.
    pub fn claim(&self, pool: &mut ReaderPool) -> Result<Vec<PageRef>> {
        let (rotation, absolute) = self.rotation.unwrap_or((Rotation::North, false));
        self.pages()
            .into_iter()
            .map(|page| {
                pool.claim(self.input, page)?;
                Ok(PageRef {
                    input: self.input,
                    page,
                    rotation,
                    absolute,
                })
            })
            .collect()
    }
}

/// Resolves page-range tokens against the registered input handles.
#[derive(Debug, Clone, Copy)]
pub struct PageRangeResolver<'a> {
    handles: &'a BTreeMap<String, usize>,
}

impl<'a> PageRangeResolver<'a> {
    /// Create a resolver for the given handle table.
    pub fn new(handles: &'a BTreeMap<String, usize>) -> Self {
        Self { handles }
    }

    /// Parse one page-range token.
    ///
    /// # Arguments
    ///
    /// * `token` - the command-line token
    /// * `page_count` - looks up the page count of an input by index
    ///
    /// # Errors
    ///
    /// Returns a usage error for unknown handles, zero page numbers,
    /// repeated rotations or unrecognized trailing text, and
    /// [`PdftkError::PageOutOfRange`] for bounds past the last page.
    pub fn resolve<F>(&self, token: &str, mut page_count: F) -> Result<PageRange>
    where
        F: FnMut(usize) -> Result<u32>,
    {
        let handle_len = token
            .bytes()
            .take_while(|b| b.is_ascii_uppercase())
            .count();
        let (handle, rest) = token.split_at(handle_len);

        let input = if handle.is_empty() {
            0
        } else {
            *self.handles.get(handle).ok_or_else(|| {
                PdftkError::usage(format!(
                    "Handle {handle} in page range {token} was not assigned to an input file"
                ))
            })?
        };
        let count = page_count(input)?;

        let (begin, rest) = parse_bound(rest, token)?;
        let (end, rest) = match rest.strip_prefix('-') {
            Some(after_dash) => parse_bound(after_dash, token)?,
            None => (begin, rest),
        };

        let mut range = PageRange {
            input,
            begin: 0,
            end: 0,
            even: false,
            odd: false,
            rotation: None,
            full_document: false,
        };
        parse_trailing(rest, token, &mut range)?;

        match (begin, end) {
            (None, None) => {
                range.begin = count.min(1);
                range.end = count;
                range.full_document = !range.even && !range.odd;
            }
            (Some(begin), Some(end)) => {
                range.begin = begin.resolve(count, RangeEndpoint::Beginning, token)?;
                range.end = end.resolve(count, RangeEndpoint::End, token)?;
            }
            _ => {
                return Err(PdftkError::usage(format!(
                    "Page numbers include 0 in page range: {token}"
                )));
            }
        }

        Ok(range)
    }
}

/// An endpoint as written in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bound {
    value: BoundValue,
    reverse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundValue {
    Page(u32),
    End,
}

impl Bound {
    fn resolve(self, page_count: u32, endpoint: RangeEndpoint, token: &str) -> Result<u32> {
        let page = match self.value {
            BoundValue::End => page_count,
            BoundValue::Page(page) => page,
        };
        if page > page_count || page_count == 0 {
            return Err(PdftkError::page_out_of_range(endpoint, token, page_count));
        }
        if self.reverse {
            Ok(page_count - page + 1)
        } else {
            Ok(page)
        }
    }
}

/// Parse an optional bound from the front of `input`.
///
/// The `r` prefix only counts when a number or `end` follows it, so a
/// bare `right` suffix is left for the keyword parser.
fn parse_bound<'t>(input: &'t str, token: &str) -> Result<(Option<Bound>, &'t str)> {
    let (reverse, body) = match input.strip_prefix('r') {
        Some(body) if starts_bound(body) => (true, body),
        _ => (false, input),
    };

    if let Some(rest) = body.strip_prefix("end") {
        let bound = Bound {
            value: BoundValue::End,
            reverse,
        };
        return Ok((Some(bound), rest));
    }

    let digits = body.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Ok((None, input));
    }

    let (number, rest) = body.split_at(digits);
    let page: u32 = number
        .parse()
        .map_err(|_| PdftkError::usage(format!("Page number is too large in: {token}")))?;
    if page == 0 {
        return Err(PdftkError::usage(format!(
            "Page numbers include 0 in page range: {token}"
        )));
    }

    let bound = Bound {
        value: BoundValue::Page(page),
        reverse,
    };
    Ok((Some(bound), rest))
}

fn starts_bound(input: &str) -> bool {
    input.starts_with("end") || input.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

fn parse_trailing(mut rest: &str, token: &str, range: &mut PageRange) -> Result<()> {
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("even") {
            range.even = true;
            rest = after;
            continue;
        }
        if let Some(after) = rest.strip_prefix("odd") {
            range.odd = true;
            rest = after;
            continue;
        }

        let Some((keyword, rotation, absolute)) = ROTATIONS
            .iter()
            .find(|(keyword, _, _)| rest.starts_with(keyword))
        else {
            return Err(PdftkError::usage(format!(
                "Unexpected text in page range: {token}\n  \
                 Expected even, odd or one of north, south, east, west, left, right, down"
            )));
        };

        if range.rotation.is_some() {
            return Err(PdftkError::usage(format!(
                "More than one rotation given in page range: {token}"
            )));
        }
        range.rotation = Some((*rotation, *absolute));
        rest = &rest[keyword.len()..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn handles() -> BTreeMap<String, usize> {
        BTreeMap::from([("A".to_string(), 0), ("B".to_string(), 1), ("AB".to_string(), 2)])
    }

    fn counts(input: usize) -> Result<u32> {
        Ok([10, 6, 1][input])
    }

    fn resolve(token: &str) -> Result<PageRange> {
        let handles = handles();
        PageRangeResolver::new(&handles).resolve(token, counts)
    }

    #[rstest]
    #[case("1", 1)]
    #[case("7", 7)]
    #[case("10", 10)]
    #[case("A4", 4)]
    fn test_single_page(#[case] token: &str, #[case] page: u32) {
        let range = resolve(token).unwrap();
        assert_eq!((range.begin, range.end), (page, page));
        assert_eq!(range.pages(), vec![page]);
    }

    #[rstest]
    #[case("end", 10)]
    #[case("r1", 10)]
    #[case("rend", 1)]
    #[case("r3", 8)]
    #[case("Bend", 6)]
    #[case("Br2", 5)]
    fn test_symbolic_bounds(#[case] token: &str, #[case] page: u32) {
        assert_eq!(resolve(token).unwrap().pages(), vec![page]);
    }

    #[test]
    fn test_forward_and_reverse_share_pages() {
        let forward = resolve("1-3").unwrap().pages();
        let backward = resolve("3-1").unwrap().pages();
        assert_eq!(forward, vec![1, 2, 3]);
        assert_eq!(backward, vec![3, 2, 1]);

        let mut sorted = backward.clone();
        sorted.sort();
        assert_eq!(sorted, forward);
    }

    #[test]
    fn test_reverse_relative_range() {
        assert_eq!(resolve("r1-r3").unwrap().pages(), vec![10, 9, 8]);
        assert_eq!(resolve("Bend-1").unwrap().pages(), vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_parity_is_independent_of_rotation() {
        let plain = resolve("1-6even").unwrap();
        let rotated = resolve("1-6evennorth").unwrap();
        assert_eq!(plain.pages(), vec![2, 4, 6]);
        assert_eq!(plain.pages(), rotated.pages());
        assert_eq!(rotated.rotation, Some((Rotation::North, true)));
    }

    #[test]
    fn test_even_and_odd_select_nothing() {
        assert!(resolve("1-6evenodd").unwrap().pages().is_empty());
    }

    #[test]
    fn test_whole_document() {
        let range = resolve("B").unwrap();
        assert_eq!(range.input, 1);
        assert_eq!(range.pages(), vec![1, 2, 3, 4, 5, 6]);
        assert!(range.full_document);

        let odd = resolve("Bodd").unwrap();
        assert_eq!(odd.pages(), vec![1, 3, 5]);
        assert!(!odd.full_document);

        let explicit = resolve("1-end").unwrap();
        assert!(!explicit.full_document);
    }

    #[test]
    fn test_longest_handle_wins() {
        let range = resolve("AB1").unwrap();
        assert_eq!(range.input, 2);
    }

    #[rstest]
    #[case("1-endsouth", Rotation::South, true)]
    #[case("1left", Rotation::West, false)]
    #[case("2-3right", Rotation::East, false)]
    #[case("Adown", Rotation::South, false)]
    #[case("right", Rotation::East, false)]
    fn test_rotation_keywords(
        #[case] token: &str,
        #[case] rotation: Rotation,
        #[case] absolute: bool,
    ) {
        assert_eq!(resolve(token).unwrap().rotation, Some((rotation, absolute)));
    }

    #[test]
    fn test_out_of_range_names_endpoint() {
        match resolve("A1-12") {
            Err(PdftkError::PageOutOfRange {
                endpoint,
                token,
                page_count,
            }) => {
                assert_eq!(endpoint, RangeEndpoint::End);
                assert_eq!(token, "A1-12");
                assert_eq!(page_count, 10);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            resolve("B7-8"),
            Err(PdftkError::PageOutOfRange {
                endpoint: RangeEndpoint::Beginning,
                ..
            })
        ));
        assert!(matches!(
            resolve("r11"),
            Err(PdftkError::PageOutOfRange { .. })
        ));
    }

    #[rstest]
    #[case("0")]
    #[case("0-3")]
    #[case("-3")]
    #[case("C1")]
    #[case("1-3eastwest")]
    #[case("1-3sideways")]
    #[case("1x")]
    fn test_invalid_tokens(#[case] token: &str) {
        assert!(matches!(resolve(token), Err(PdftkError::Usage { .. })));
    }

    #[test]
    fn test_whole_empty_document_selects_nothing() {
        let handles = handles();
        let range = PageRangeResolver::new(&handles)
            .resolve("A", |_| Ok(0))
            .unwrap();
        assert!(range.pages().is_empty());
    }
}
