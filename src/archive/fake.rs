//! In-memory archive for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Archive, ArchiveError, EditionMetadata, MetadataOutcome};
use crate::fetch::FetchError;

/// Canned metadata reply.
#[derive(Debug, Clone)]
pub(crate) enum FakeMetadata {
    Found(EditionMetadata),
    Exhausted,
    Timeout,
    Missing,
}

/// Archive answering from maps and recording which articles were probed.
#[derive(Debug, Default)]
pub(crate) struct FakeArchive {
    toc: Option<String>,
    metadata: HashMap<String, FakeMetadata>,
    pdfs: HashMap<String, Option<Vec<u8>>>,
    probed: Mutex<Vec<String>>,
}

impl FakeArchive {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_toc(mut self, markup: impl Into<String>) -> Self {
        self.toc = Some(markup.into());
        self
    }

    pub(crate) fn with_editions(mut self, id: &str, editions: &str) -> Self {
        let meta = EditionMetadata::new(editions, ";", format!("PDF_{id}"));
        self.metadata
            .insert(id.to_string(), FakeMetadata::Found(meta));
        self
    }

    pub(crate) fn with_metadata(mut self, id: &str, reply: FakeMetadata) -> Self {
        self.metadata.insert(id.to_string(), reply);
        self
    }

    pub(crate) fn with_pdf(mut self, id: &str, bytes: Vec<u8>) -> Self {
        self.pdfs.insert(id.to_string(), Some(bytes));
        self
    }

    pub(crate) fn with_pdf_timeout(mut self, id: &str) -> Self {
        self.pdfs.insert(id.to_string(), None);
        self
    }

    pub(crate) fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Archive for FakeArchive {
    async fn table_of_contents(&self, _date: NaiveDate) -> Result<String, ArchiveError> {
        self.toc
            .clone()
            .ok_or_else(|| FetchError::timeout("fake://toc").into())
    }

    async fn edition_metadata(&self, article_id: &str) -> Result<MetadataOutcome, ArchiveError> {
        self.probed.lock().unwrap().push(article_id.to_string());
        match self.metadata.get(article_id) {
            Some(FakeMetadata::Found(meta)) => Ok(MetadataOutcome::Found(meta.clone())),
            Some(FakeMetadata::Exhausted) => Ok(MetadataOutcome::Exhausted { attempts: 3 }),
            Some(FakeMetadata::Timeout) => {
                Err(FetchError::timeout(format!("fake://document/{article_id}")).into())
            }
            Some(FakeMetadata::Missing) | None => Err(ArchiveError::Lookup {
                url: format!("fake://document/{article_id}"),
                selector: "span.boxItem a".to_string(),
                snapshot: None,
            }),
        }
    }

    async fn page_pdf(&self, article_id: &str, _pdf_link: &str) -> Result<Vec<u8>, ArchiveError> {
        match self.pdfs.get(article_id) {
            Some(Some(bytes)) => Ok(bytes.clone()),
            Some(None) => Err(FetchError::timeout(format!("fake://pdf/{article_id}")).into()),
            None => Err(FetchError::http_status(format!("fake://pdf/{article_id}"), 404).into()),
        }
    }
}
