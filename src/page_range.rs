use crate::error::{ParseError, ValidationError};

/// Upper bound on the number of pages one specification may expand to.
pub const MAX_SELECTED_PAGES: usize = 10_000;

/// Which pages of a document to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSpec {
    All,
    /// 1-based page numbers, in print order. Repeats are kept.
    Pages(Vec<u32>),
}

/// One comma-separated token: a single page or an inclusive `start-end` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl PageRange {
    /// Parse a token like "5" or "1-5"
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        let invalid = || ParseError::InvalidFormat(s.to_string());

        let mut parts = s.split('-');
        let start = parts.next().ok_or_else(invalid)?;
        let end = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(PageRange {
            start: parse_page_number(start).ok_or_else(invalid)?,
            end: match end {
                Some(end) => Some(parse_page_number(end).ok_or_else(invalid)?),
                None => None,
            },
        })
    }

    /// Number of pages this token expands to. Reversed pairs are empty.
    pub fn page_count(&self) -> usize {
        match self.end {
            None => 1,
            Some(end) if end < self.start => 0,
            Some(end) => (end - self.start) as usize + 1,
        }
    }

    /// Expand into 1-based page numbers. `9-6` yields nothing.
    pub fn expand(&self) -> impl Iterator<Item = u32> {
        let end = self.end.unwrap_or(self.start);
        self.start..=end
    }
}

fn parse_page_number(s: &str) -> Option<u32> {
    let s = s.trim();
    // u32::from_str accepts a leading '+'
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a user page specification like "all" or "1-3,5".
pub fn parse(input: &str) -> Result<PageSpec, ParseError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Ok(PageSpec::All);
    }

    let ranges = input
        .split(',')
        .map(PageRange::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let selected: usize = ranges.iter().map(PageRange::page_count).sum();
    if selected > MAX_SELECTED_PAGES {
        return Err(ParseError::TooManyPages {
            limit: MAX_SELECTED_PAGES,
        });
    }

    let mut pages = Vec::with_capacity(selected);
    for range in ranges {
        pages.extend(range.expand());
    }
    Ok(PageSpec::Pages(pages))
}

/// Whether every page of `spec` exists in a document of `total_pages` pages.
pub fn validate(spec: &PageSpec, total_pages: u32) -> bool {
    check(spec, total_pages).is_ok()
}

/// Like [`validate`], but reports the first page that is out of range.
pub fn check(spec: &PageSpec, total_pages: u32) -> Result<(), ValidationError> {
    match spec {
        PageSpec::All => Ok(()),
        PageSpec::Pages(pages) => match pages.iter().find(|&&p| p == 0 || p > total_pages) {
            Some(&page) => Err(ValidationError {
                page,
                total: total_pages,
            }),
            None => Ok(()),
        },
    }
}
