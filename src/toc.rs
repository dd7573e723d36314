//! Table-of-contents parsing.
//!
//! One TOC row becomes one [`ArticleRecord`]. Rows missing a required field
//! (id, resort, page) are skipped and reported in [`TocParse::skipped`]; a
//! bad row never aborts the issue.

use scraper::{ElementRef, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TocConfig;
use crate::html::{HtmlPage, LookupError, element_text, parse_selector};

/// Class prefix in front of every article id.
const ITEM_CLASS_PREFIX: &str = "item_";

/// One table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Archive id of the article; differs per edition variant.
    pub id: String,
    /// Edition group tag (fourth `_` segment of the id), possibly empty.
    pub group: String,
    /// Display title, possibly empty.
    pub title: String,
    /// Editorial section label.
    pub resort: String,
    /// Physical page number, 1-based.
    pub page: u32,
    /// Excerpt fragments.
    pub description: Option<Vec<String>>,
    /// Abstract fragments.
    pub r#abstract: Option<Vec<String>>,
}

impl ArticleRecord {
    /// Derives the edition group tag from an article id.
    ///
    /// `OTZ__2024_0102_JE_07_1` has the tag `0102`; ids with fewer segments
    /// have an empty tag.
    #[must_use]
    pub fn group_of(id: &str) -> String {
        id.split('_').nth(3).unwrap_or_default().to_string()
    }
}

/// A TOC row that could not be turned into a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TocRowError {
    /// The row has no `item_` class token.
    #[error("row {row}: no article id")]
    MissingId {
        /// Zero-based row index.
        row: usize,
    },

    /// The resort cell is absent or empty.
    #[error("row {row} ({id}): no resort")]
    MissingResort {
        /// Zero-based row index.
        row: usize,
        /// Article id.
        id: String,
    },

    /// The page cell is absent.
    #[error("row {row} ({id}): no page label")]
    MissingPage {
        /// Zero-based row index.
        row: usize,
        /// Article id.
        id: String,
    },

    /// The page label is not a positive number after the prefix.
    #[error("row {row} ({id}): invalid page label \"{label}\"")]
    InvalidPage {
        /// Zero-based row index.
        row: usize,
        /// Article id.
        id: String,
        /// The raw label.
        label: String,
    },
}

/// Result of parsing one TOC listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocParse {
    /// Records in listing order.
    pub records: Vec<ArticleRecord>,
    /// Rows that were skipped.
    pub skipped: Vec<TocRowError>,
}

/// Parses TOC listings of one newspaper.
#[derive(Debug)]
pub struct TocParser {
    row: String,
    title: Selector,
    resort: Selector,
    page: Selector,
    description: Selector,
    r#abstract: Selector,
    page_label_prefix: String,
}

impl TocParser {
    /// Compiles the row and cell selectors.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidSelector`] for a malformed configured selector.
    pub fn new(config: &TocConfig, newspaper_id: &str) -> Result<Self, LookupError> {
        let row = format!("tr[class^=\"{ITEM_CLASS_PREFIX}{newspaper_id}__\"]");
        parse_selector(&row)?;
        Ok(Self {
            row,
            title: parse_selector(&config.title_selector)?,
            resort: parse_selector(&config.resort_selector)?,
            page: parse_selector(&config.page_selector)?,
            description: parse_selector(&config.description_selector)?,
            r#abstract: parse_selector(&config.abstract_selector)?,
            page_label_prefix: config.page_label_prefix.clone(),
        })
    }

    /// Parses a TOC listing.
    ///
    /// An empty listing yields no records; whether that is fatal is up to
    /// the caller.
    ///
    /// # Errors
    ///
    /// Only fails on an invalid row selector; row-level problems end up in
    /// [`TocParse::skipped`].
    pub fn parse(&self, markup: &str) -> Result<TocParse, LookupError> {
        let page = HtmlPage::parse(markup);
        let rows = page.select(&self.row)?;

        let mut parsed = TocParse::default();
        for (index, row) in rows.into_iter().enumerate() {
            match self.parse_row(index, row) {
                Ok(record) => parsed.records.push(record),
                Err(error) => {
                    warn!(%error, "skipping TOC row");
                    parsed.skipped.push(error);
                }
            }
        }
        debug!(
            records = parsed.records.len(),
            skipped = parsed.skipped.len(),
            "parsed TOC"
        );
        Ok(parsed)
    }

    fn parse_row(&self, index: usize, row: ElementRef<'_>) -> Result<ArticleRecord, TocRowError> {
        let id = row
            .value()
            .classes()
            .find_map(|class| class.strip_prefix(ITEM_CLASS_PREFIX))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or(TocRowError::MissingId { row: index })?;

        let resort = first_text(row, &self.resort)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| TocRowError::MissingResort {
                row: index,
                id: id.clone(),
            })?;

        let label = first_text(row, &self.page).ok_or_else(|| TocRowError::MissingPage {
            row: index,
            id: id.clone(),
        })?;
        let page = parse_page_label(&label, &self.page_label_prefix).ok_or_else(|| {
            TocRowError::InvalidPage {
                row: index,
                id: id.clone(),
                label: label.clone(),
            }
        })?;

        Ok(ArticleRecord {
            group: ArticleRecord::group_of(&id),
            title: first_text(row, &self.title).unwrap_or_default(),
            resort,
            page,
            description: fragments(row, &self.description),
            r#abstract: fragments(row, &self.r#abstract),
            id,
        })
    }
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector).next().map(|el| element_text(&el))
}

fn fragments(row: ElementRef<'_>, selector: &Selector) -> Option<Vec<String>> {
    let parts: Vec<String> = row
        .select(selector)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
        .collect();
    if parts.is_empty() { None } else { Some(parts) }
}

/// Parses `"S. 12"` style labels into the page number.
fn parse_page_label(label: &str, prefix: &str) -> Option<u32> {
    let number = label.strip_prefix(prefix).unwrap_or(label).trim();
    number.parse::<u32>().ok().filter(|page| *page > 0)
}
