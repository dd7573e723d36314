//! Page materialization: download, validate, strip.

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;
use tracing::{debug, instrument};

use super::watermark::{StripReport, WatermarkStripper};
use crate::archive::{Archive, ArchiveError};
use crate::resolver::ResolvedPage;

/// Page attributes a page may inherit from its page tree ancestors.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains.
const MAX_TREE_DEPTH: usize = 32;

/// A retrieved page document that is not a single usable page.
#[derive(Debug, Error)]
pub enum SourceFormatError {
    /// The document does not contain exactly one page.
    #[error("page {page}: expected exactly one page in source document, found {found}")]
    PageCount {
        /// Issue page number.
        page: u32,
        /// Pages found.
        found: usize,
    },

    /// The bytes are not a readable PDF.
    #[error("page {page}: source document is not a readable PDF")]
    Decode {
        /// Issue page number.
        page: u32,
        /// Parser error.
        #[source]
        source: lopdf::Error,
    },

    /// The page structure or content stream is broken.
    #[error("page {page}: {reason}")]
    Malformed {
        /// Issue page number.
        page: u32,
        /// What is broken.
        reason: String,
    },
}

/// Materialization failures.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The page PDF could not be retrieved.
    #[error("page {page}: {source}")]
    Archive {
        /// Issue page number.
        page: u32,
        /// Underlying failure.
        #[source]
        source: ArchiveError,
    },

    /// The retrieved document is unusable.
    #[error(transparent)]
    Source(#[from] SourceFormatError),
}

impl MaterializeError {
    /// True for connectivity failures.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Archive { source, .. } if source.is_network())
    }
}

/// One cleaned page, exclusively owned until handed to the assembler.
#[derive(Debug)]
pub struct PageObject {
    number: u32,
    document: Document,
    page_id: ObjectId,
    report: StripReport,
}

impl PageObject {
    /// Decodes a single-page PDF and strips its watermark.
    ///
    /// Inheritable page attributes are copied onto the page first, so the
    /// page stays complete once detached from its page tree.
    ///
    /// # Errors
    ///
    /// Returns [`SourceFormatError::PageCount`] unless the document holds
    /// exactly one page, [`SourceFormatError::Decode`] for unreadable bytes
    /// and [`SourceFormatError::Malformed`] for broken page structures.
    pub fn from_pdf_bytes(
        number: u32,
        bytes: &[u8],
        stripper: &WatermarkStripper,
    ) -> Result<Self, SourceFormatError> {
        let mut document = Document::load_mem(bytes).map_err(|source| SourceFormatError::Decode {
            page: number,
            source,
        })?;

        let pages = document.get_pages();
        if pages.len() != 1 {
            return Err(SourceFormatError::PageCount {
                page: number,
                found: pages.len(),
            });
        }
        let page_id = pages
            .values()
            .next()
            .copied()
            .ok_or(SourceFormatError::PageCount {
                page: number,
                found: 0,
            })?;

        let malformed = |error: lopdf::Error| SourceFormatError::Malformed {
            page: number,
            reason: error.to_string(),
        };
        inherit_page_attributes(&mut document, page_id).map_err(malformed)?;
        let report = stripper
            .strip_page(&mut document, page_id)
            .map_err(|error| SourceFormatError::Malformed {
                page: number,
                reason: error.to_string(),
            })?;

        Ok(Self {
            number,
            document,
            page_id,
            report,
        })
    }

    /// Issue page number.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// What watermark stripping removed.
    #[must_use]
    pub fn strip_report(&self) -> &StripReport {
        &self.report
    }

    /// The page's own document.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn into_parts(self) -> (Document, ObjectId) {
        (self.document, self.page_id)
    }
}

fn inherit_page_attributes(document: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let inherited: Vec<(&[u8], Object)> = {
        let page = document.get_dictionary(page_id)?;
        INHERITABLE_KEYS
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| find_inherited(document, page, key).map(|value| (*key, value)))
            .collect()
    };
    if inherited.is_empty() {
        return Ok(());
    }

    let page = document.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

fn find_inherited(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Turns resolved pages into cleaned page objects.
#[derive(Debug, Clone)]
pub struct PageMaterializer {
    stripper: WatermarkStripper,
}

impl PageMaterializer {
    /// Creates a materializer using `stripper`.
    #[must_use]
    pub fn new(stripper: WatermarkStripper) -> Self {
        Self { stripper }
    }

    /// Downloads, validates and strips the chosen variant of one page.
    ///
    /// The downloaded bytes are dropped once decoded.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError::Archive`] when the download fails and
    /// [`MaterializeError::Source`] when the document is unusable.
    #[instrument(skip(self, resolved, archive), fields(page = resolved.page, article_id = %resolved.article_id))]
    pub async fn materialize(
        &self,
        resolved: &ResolvedPage,
        archive: &dyn Archive,
    ) -> Result<PageObject, MaterializeError> {
        let bytes = archive
            .page_pdf(&resolved.article_id, &resolved.pdf_link)
            .await
            .map_err(|source| MaterializeError::Archive {
                page: resolved.page,
                source,
            })?;
        let page = PageObject::from_pdf_bytes(resolved.page, &bytes, &self.stripper)?;
        debug!(
            bytes = bytes.len(),
            blanked = page.strip_report().blanked,
            "materialized page"
        );
        Ok(page)
    }
}
