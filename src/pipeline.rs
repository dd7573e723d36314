//! Issue assembly: TOC → pages → editions → cleaned pages → one document.
//!
//! Pages are processed one at a time in ascending order. Every per-page
//! failure excludes just that page; a run only fails when the TOC cannot be
//! loaded, lists no pages, or not a single page could be materialized.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::archive::{Archive, ArchiveError};
use crate::config::BinderConfig;
use crate::fetch::FetchStats;
use crate::grouper::group_by_page;
use crate::pdf::{
    AssembleError, DocumentAssembler, PageMaterializer, WatermarkStripper, output_file_name,
};
use crate::resolver::EditionResolver;
use crate::toc::TocParser;

/// Per-run state handed to the pipeline at construction.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Issue date.
    pub publish_date: NaiveDate,
    /// Fetch counters shared with the fetcher.
    pub stats: Arc<FetchStats>,
}

impl RunContext {
    /// Creates a context for the issue of `publish_date`.
    #[must_use]
    pub fn new(publish_date: NaiveDate, stats: Arc<FetchStats>) -> Self {
        Self {
            publish_date,
            stats,
        }
    }
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Connectivity was exhausted.
    #[error("network failure while {stage}: {detail}")]
    Network {
        /// What the run was doing.
        stage: &'static str,
        /// Failure details.
        detail: String,
    },

    /// The TOC request failed for a non-connectivity reason.
    #[error("failed to load table of contents")]
    Toc {
        /// Underlying failure.
        #[source]
        source: ArchiveError,
    },

    /// The TOC listed no usable page.
    #[error("no pages found in the table of contents of {date}")]
    NoPages {
        /// Issue date.
        date: NaiveDate,
    },

    /// Every page was excluded.
    #[error("none of {expected} pages could be assembled")]
    NothingAssembled {
        /// Pages listed in the TOC.
        expected: usize,
    },

    /// Binding or writing the document failed.
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// The configuration is unusable.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },
}

impl RunError {
    /// True when the whole run may be retried.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// A page left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedPage {
    /// Page number.
    pub page: u32,
    /// Why it was left out.
    pub reason: String,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReport {
    /// Written document.
    pub output_path: PathBuf,
    /// Page numbers in the document.
    pub assembled: Vec<u32>,
    /// Pages listed in the TOC (after the minimum-page filter).
    pub expected: usize,
    /// Pages left out, in page order.
    pub excluded: Vec<ExcludedPage>,
    /// TOC rows skipped as unparseable.
    pub skipped_rows: usize,
    /// Fetch calls made so far in this run context.
    pub fetches: usize,
    /// Retries made so far in this run context.
    pub retries: usize,
}

/// Assembles one edition of one issue.
#[derive(Debug)]
pub struct IssueBinder {
    context: RunContext,
    newspaper_id: String,
    edition_label: String,
    output_dir: PathBuf,
    include_weekday: bool,
    min_page: u32,
    run_attempts: u32,
    toc: TocParser,
    resolver: EditionResolver,
    materializer: PageMaterializer,
    assembler: DocumentAssembler,
}

impl IssueBinder {
    /// Builds the pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] when a configured selector is invalid.
    pub fn from_config(config: &BinderConfig, context: RunContext) -> Result<Self, RunError> {
        let toc = TocParser::new(&config.toc, &config.newspaper.id).map_err(|e| {
            RunError::Config {
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            context,
            newspaper_id: config.newspaper.id.clone(),
            edition_label: config.editions.desired.clone(),
            output_dir: config.output.directory.clone(),
            include_weekday: config.output.include_weekday,
            min_page: config.toc.min_page,
            run_attempts: config.fetch.run_attempts,
            toc,
            resolver: EditionResolver::from_config(config),
            materializer: PageMaterializer::new(WatermarkStripper::from_config(&config.watermark)),
            assembler: DocumentAssembler::new(),
        })
    }

    /// Path the bound issue is written to.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(output_file_name(
            &self.newspaper_id,
            self.context.publish_date,
            &self.edition_label,
            self.include_weekday,
        ))
    }

    /// Runs the pipeline, retrying the whole issue on network exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the last [`RunError`] once the run budget is spent, or the
    /// first non-network error immediately.
    pub async fn run_with_retry(&self, archive: &dyn Archive) -> Result<IssueReport, RunError> {
        let attempts = self.run_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.run(archive).await {
                Err(error) if error.is_network() && attempt < attempts => {
                    warn!(attempt, attempts, %error, "issue run failed, starting over");
                    attempt += 1;
                }
                Err(error) => {
                    error!(attempt, %error, "issue run failed");
                    return Err(error);
                }
                Ok(report) => return Ok(report),
            }
        }
    }

    /// Runs the pipeline once.
    ///
    /// # Errors
    ///
    /// See [`RunError`].
    #[instrument(skip(self, archive), fields(date = %self.context.publish_date, edition = %self.edition_label))]
    pub async fn run(&self, archive: &dyn Archive) -> Result<IssueReport, RunError> {
        let date = self.context.publish_date;
        let markup = archive.table_of_contents(date).await.map_err(|source| {
            if source.is_network() {
                RunError::Network {
                    stage: "loading the table of contents",
                    detail: source.to_string(),
                }
            } else {
                RunError::Toc { source }
            }
        })?;

        let parsed = self.toc.parse(&markup).map_err(|e| RunError::Config {
            reason: e.to_string(),
        })?;
        let skipped_rows = parsed.skipped.len();
        let mut groups = group_by_page(parsed.records);
        let below = groups.retain_from(self.min_page);
        if below > 0 {
            info!(skipped = below, min_page = self.min_page, "skipping leading pages");
        }
        if groups.is_empty() {
            error!(%date, skipped_rows, "no pages found");
            return Err(RunError::NoPages { date });
        }
        let expected = groups.len();
        info!(
            pages = expected,
            entries = groups.record_count(),
            skipped_rows,
            "loaded table of contents"
        );

        let mut pages = BTreeMap::new();
        let mut excluded = Vec::new();
        let mut network_failures = 0usize;

        for (&page, records) in &groups {
            let resolved = match self.resolver.resolve(page, records, archive).await {
                Ok(resolved) => resolved,
                Err(error) => {
                    warn!(page, %error, "page excluded");
                    network_failures += usize::from(error.is_network());
                    excluded.push(ExcludedPage {
                        page,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };
            info!(page, article_id = %resolved.article_id, "page {page}: {}", resolved.narrative);

            match self.materializer.materialize(&resolved, archive).await {
                Ok(object) => {
                    pages.insert(page, object);
                }
                Err(error) => {
                    warn!(page, %error, "page excluded");
                    network_failures += usize::from(error.is_network());
                    excluded.push(ExcludedPage {
                        page,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if pages.is_empty() {
            if network_failures > 0 {
                return Err(RunError::Network {
                    stage: "retrieving pages",
                    detail: format!(
                        "all {expected} pages failed, {network_failures} for connectivity reasons"
                    ),
                });
            }
            return Err(RunError::NothingAssembled { expected });
        }

        let document = self.assembler.assemble(pages)?;
        let assembled = document.page_numbers().to_vec();
        let output_path = self.output_path();
        fs::create_dir_all(&self.output_dir).map_err(|source| AssembleError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        document.write_to(&output_path)?;

        info!(
            assembled = assembled.len(),
            expected,
            excluded = excluded.len(),
            path = %output_path.display(),
            "issue bound"
        );

        Ok(IssueReport {
            output_path,
            assembled,
            expected,
            excluded,
            skipped_rows,
            fetches: self.context.stats.fetches(),
            retries: self.context.stats.retries(),
        })
    }
}
