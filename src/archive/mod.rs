//! Access to the page archive.
//!
//! The pipeline never talks HTTP directly; it asks an [`Archive`] for the
//! three things it needs: the day's TOC listing, the edition metadata of one
//! article and the one-page PDF behind it. [`GeniosArchive`] implements this
//! over the library portal; tests substitute in-memory fakes.
//!
//! # Architecture
//!
//! - [`Archive`] - async trait the resolver, materializer and pipeline use
//! - [`GeniosArchive`] - portal implementation over a [`Fetcher`](crate::fetch::Fetcher)
//! - [`session`] - portal login establishing the session cookies
//! - [`EditionMetadata`] / [`MetadataOutcome`] - per-article lookup result

#[cfg(test)]
pub(crate) mod fake;
mod genios;
pub mod session;

pub use genios::{ArchiveSettings, GeniosArchive, SNAPSHOT_PREFIX};
pub use session::Credentials;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::fetch::FetchError;

/// Archive access failures.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Request failed after the fetcher's retry budget.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A required selector matched nothing and no authorization banner was shown.
    #[error("no match for \"{selector}\" on {url}")]
    Lookup {
        /// Page that was inspected.
        url: String,
        /// Selector that matched nothing.
        selector: String,
        /// Kept copy of the raw page, when it could be written.
        snapshot: Option<PathBuf>,
    },

    /// A response lacked an expected embedded token.
    #[error("no {what} in response from {url}")]
    MissingToken {
        /// Request URL.
        url: String,
        /// What was looked for.
        what: &'static str,
    },
}

impl ArchiveError {
    /// True for connectivity failures that survived the retry budget.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetch(error) if error.is_network())
    }
}

/// Editions an article variant is published under, plus its PDF link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditionMetadata {
    /// Lower-cased edition names.
    pub editions: BTreeSet<String>,
    /// Link id used to request the page PDF.
    pub pdf_link: String,
}

impl EditionMetadata {
    /// Builds metadata from a raw edition field such as `"Jena; Gera"`.
    #[must_use]
    pub fn new(raw_editions: &str, separator: &str, pdf_link: impl Into<String>) -> Self {
        Self {
            editions: parse_editions(raw_editions, separator),
            pdf_link: pdf_link.into(),
        }
    }

    /// Case-insensitive edition membership.
    #[must_use]
    pub fn contains(&self, edition: &str) -> bool {
        self.editions.contains(&edition.trim().to_lowercase())
    }
}

impl fmt::Display for EditionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.editions.iter().map(String::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Splits an edition field into lower-cased, trimmed, non-empty names.
#[must_use]
pub fn parse_editions(raw: &str, separator: &str) -> BTreeSet<String> {
    raw.split(separator)
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Outcome of a metadata lookup that did not fail hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    /// Metadata was extracted.
    Found(EditionMetadata),
    /// The archive kept showing the authorization banner.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Source of TOC listings, edition metadata and page PDFs.
///
/// # Object Safety
///
/// Uses `async_trait` so the pipeline can hold a `&dyn Archive`.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Raw TOC listing markup for the issue of `date`.
    async fn table_of_contents(&self, date: NaiveDate) -> Result<String, ArchiveError>;

    /// Edition metadata of one article variant.
    async fn edition_metadata(&self, article_id: &str) -> Result<MetadataOutcome, ArchiveError>;

    /// The one-page PDF of an article variant.
    async fn page_pdf(&self, article_id: &str, pdf_link: &str) -> Result<Vec<u8>, ArchiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_editions_normalizes_names() {
        let editions = parse_editions(" Jena ;GERA;; ", ";");
        let names: Vec<&str> = editions.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["gera", "jena"]);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let meta = EditionMetadata::new("Schleiz", ";", "PDF_1");
        assert!(meta.contains("Schleiz"));
        assert!(meta.contains("schleiz"));
        assert!(!meta.contains("Jena"));
    }

    #[test]
    fn test_display_lists_editions() {
        let meta = EditionMetadata::new("Jena;Gera", ";", "PDF_1");
        assert_eq!(meta.to_string(), "gera, jena");
    }

    #[test]
    fn test_is_network_only_for_connectivity() {
        let timeout = ArchiveError::from(FetchError::timeout("https://archive.example"));
        assert!(timeout.is_network());

        let status = ArchiveError::from(FetchError::http_status("https://archive.example", 500));
        assert!(!status.is_network());

        let lookup = ArchiveError::Lookup {
            url: "https://archive.example/document/1".to_string(),
            selector: "span.boxItem a".to_string(),
            snapshot: None,
        };
        assert!(!lookup.is_network());
    }
}
