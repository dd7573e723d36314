//! Archive implementation over the GBI-Genios library portal.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use super::session::{self, Credentials};
use super::{Archive, ArchiveError, EditionMetadata, MetadataOutcome};
use crate::config::BinderConfig;
use crate::fetch::{Fetcher, HttpMethod, RetryPolicy};
use crate::html::{HtmlPage, LookupError};

/// File name prefix of kept lookup-failure snapshots.
pub const SNAPSHOT_PREFIX: &str = "newsbinder-lookup-";

/// Minimum length of the download path token in the console response.
const DOWNLOAD_TOKEN_MIN_LEN: usize = 100;

/// PDF page document type in the download console.
const PDF_DOCUMENT_TYPE: &str = "-7";

/// Endpoint and extraction settings of one portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    /// Portal base URL without trailing slash.
    pub base_url: String,
    /// Newspaper identifier.
    pub newspaper_id: String,
    /// TOC page-size cap.
    pub toc_max_entries: u32,
    /// Edition field selector.
    pub edition_selector: String,
    /// PDF link anchor selector.
    pub link_selector: String,
    /// Separator in the edition field.
    pub edition_separator: String,
    /// Authorization banner phrase.
    pub denied_phrase: String,
    /// Attempts while the banner is shown.
    pub metadata_attempts: u32,
    /// Retry policy of metadata requests.
    pub metadata_policy: RetryPolicy,
}

impl ArchiveSettings {
    /// Settings from the binder configuration.
    #[must_use]
    pub fn from_config(config: &BinderConfig) -> Self {
        Self {
            base_url: config.newspaper.base_url.trim_end_matches('/').to_string(),
            newspaper_id: config.newspaper.id.clone(),
            toc_max_entries: config.toc.max_entries,
            edition_selector: config.metadata.edition_selector.clone(),
            link_selector: config.metadata.link_selector.clone(),
            edition_separator: config.metadata.edition_separator.clone(),
            denied_phrase: config.metadata.authorization_denied_phrase.clone(),
            metadata_attempts: config.metadata.attempts,
            metadata_policy: config.fetch.metadata_retry_policy(),
        }
    }

    fn backoff_after(&self, attempt: u32) -> Duration {
        self.metadata_policy.delay_after(attempt)
    }
}

/// Portal-backed [`Archive`].
#[derive(Debug, Clone)]
pub struct GeniosArchive {
    fetcher: Fetcher,
    settings: ArchiveSettings,
}

impl GeniosArchive {
    /// Creates an archive over an existing fetcher session.
    #[must_use]
    pub fn new(fetcher: Fetcher, settings: ArchiveSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Logs the underlying session in.
    ///
    /// # Errors
    ///
    /// See [`session::login`].
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ArchiveError> {
        session::login(&self.fetcher, &self.settings.base_url, credentials).await
    }

    /// The fetcher this archive uses.
    #[must_use]
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// TOC listing URL of the issue of `date`, without the page-size query.
    #[must_use]
    pub fn toc_url(&self, date: NaiveDate) -> String {
        let id = &self.settings.newspaper_id;
        format!(
            "{base}/toc_list/{id}/{year}/DT%3D{compact}/Heft%2B{issue}/{id}",
            base = self.settings.base_url,
            year = date.format("%Y"),
            compact = date.format("%Y%m%d"),
            issue = date.format("%d.%m.%Y"),
        )
    }

    /// Article document URL.
    #[must_use]
    pub fn document_url(&self, article_id: &str) -> String {
        format!("{}/document/{article_id}", self.settings.base_url)
    }

    fn extract_metadata(&self, body: &str) -> Result<EditionMetadata, LookupError> {
        let page = HtmlPage::parse(body);
        let editions = page.select_text(&self.settings.edition_selector)?;
        let link = page.select_attr(&self.settings.link_selector, "id")?;
        Ok(EditionMetadata::new(
            &editions,
            &self.settings.edition_separator,
            link,
        ))
    }
}

#[async_trait]
impl Archive for GeniosArchive {
    #[instrument(skip(self), fields(newspaper = %self.settings.newspaper_id))]
    async fn table_of_contents(&self, date: NaiveDate) -> Result<String, ArchiveError> {
        let url = self.toc_url(date);
        let max = self.settings.toc_max_entries.to_string();
        let body = self
            .fetcher
            .fetch_text(&url, HttpMethod::Get, &[("max", max.as_str())])
            .await?;
        debug!(bytes = body.len(), "loaded TOC");
        Ok(body)
    }

    #[instrument(skip(self))]
    async fn edition_metadata(&self, article_id: &str) -> Result<MetadataOutcome, ArchiveError> {
        let url = self.document_url(article_id);
        let attempts = self.settings.metadata_attempts.max(1);

        for attempt in 1..=attempts {
            let body = self
                .fetcher
                .fetch_text_with(&url, HttpMethod::Get, &[], &self.settings.metadata_policy)
                .await?;

            let lookup = match self.extract_metadata(&body) {
                Ok(metadata) => return Ok(MetadataOutcome::Found(metadata)),
                Err(lookup) => lookup,
            };

            if !body.contains(&self.settings.denied_phrase) {
                let snapshot = write_snapshot(&lookup, &body);
                match &snapshot {
                    Some(path) => warn!(
                        %url,
                        error = %lookup,
                        snapshot = %path.display(),
                        "metadata lookup failed"
                    ),
                    None => warn!(%url, error = %lookup, "metadata lookup failed"),
                }
                return Err(ArchiveError::Lookup {
                    url,
                    selector: lookup.selector().to_string(),
                    snapshot,
                });
            }

            warn!(attempt, attempts, %url, "archive denied access to the article");
            if attempt < attempts {
                let delay = self.settings.backoff_after(attempt);
                info!(
                    next_attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "retrying metadata lookup"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Ok(MetadataOutcome::Exhausted { attempts })
    }

    #[instrument(skip(self))]
    async fn page_pdf(&self, article_id: &str, pdf_link: &str) -> Result<Vec<u8>, ArchiveError> {
        let console_url = format!("{}/stream/downloadConsole", self.settings.base_url);
        let params = [
            ("srcId", pdf_link),
            ("id", article_id),
            ("type", PDF_DOCUMENT_TYPE),
            ("sourceId", pdf_link),
        ];
        let console = self
            .fetcher
            .fetch_text(&console_url, HttpMethod::Post, &params)
            .await?;

        let path = extract_download_path(&console).ok_or(ArchiveError::MissingToken {
            url: console_url,
            what: "download path",
        })?;

        let pdf_url = format!("{}{path}", self.settings.base_url);
        let bytes = self.fetcher.fetch(&pdf_url, HttpMethod::Get, &[]).await?;
        debug!(bytes = bytes.len(), "downloaded page PDF");
        Ok(bytes)
    }
}

/// Finds the quoted download path in a download console response.
#[must_use]
pub fn extract_download_path(console: &str) -> Option<&str> {
    console
        .split('"')
        .find(|token| token.len() > DOWNLOAD_TOKEN_MIN_LEN)
}

/// Keeps the failing selector and the raw page in a temp file for offline diagnosis.
fn write_snapshot(error: &LookupError, raw: &str) -> Option<PathBuf> {
    let result = tempfile::Builder::new()
        .prefix(SNAPSHOT_PREFIX)
        .suffix(".html")
        .tempfile()
        .and_then(|mut file| {
            writeln!(file, "{error}")?;
            writeln!(file, "{}", "_*_ ".repeat(20))?;
            file.write_all(raw.as_bytes())?;
            file.keep().map(|(_, path)| path).map_err(|e| e.error)
        });
    match result {
        Ok(path) => Some(path),
        Err(error) => {
            warn!(%error, "could not write lookup snapshot");
            None
        }
    }
}
