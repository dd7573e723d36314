//! Edition resolution for one physical page.
//!
//! A page may exist in several regional variants. [`EditionResolver`] picks
//! exactly one of them:
//!
//! 1. classify the page as generic or regional ([`ResortClassifier`]);
//! 2. the target edition is the desired regional edition for regional pages
//!    and the default edition otherwise;
//! 3. probe the variants' edition metadata in listing order and take the
//!    first that carries the target edition;
//! 4. otherwise fall back to the first variant carrying the default edition,
//!    then (on generic pages) to the first carrying the desired edition, and
//!    failing that to the first variant whose metadata could be read.
//!
//! Edition ambiguity never fails a page. Only a page whose every variant's
//! metadata is unobtainable is [`ResolveError::Unresolved`].

mod classify;

pub use classify::{Classification, PageKind, ResortClassifier};

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::archive::{Archive, EditionMetadata, MetadataOutcome};
use crate::config::BinderConfig;
use crate::toc::ArticleRecord;

/// Resolution failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The page group was empty.
    #[error("page {page} has no entries")]
    NoEntries {
        /// Page number.
        page: u32,
    },

    /// No variant's metadata could be obtained.
    #[error("page {page}: edition metadata unavailable for all {failures} variant(s)")]
    Unresolved {
        /// Page number.
        page: u32,
        /// Variants whose lookup failed.
        failures: usize,
        /// True when at least one failure was a connectivity failure.
        network: bool,
    },
}

impl ResolveError {
    /// True when connectivity contributed to the failure.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Unresolved { network: true, .. })
    }
}

/// Which edition the chosen variant matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditionMatch {
    /// The named (lower-cased) edition is among the variant's editions.
    Edition(String),
    /// Neither target nor default edition was available.
    BestFit,
}

impl fmt::Display for EditionMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edition(name) => write!(f, "{name}"),
            Self::BestFit => write!(f, "best fit"),
        }
    }
}

/// Why a variant was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionReason {
    /// One of several variants carries the target edition.
    TargetPresent,
    /// The page has only one variant.
    SoleVariant,
    /// No variant carries the target; one carries the default edition.
    DefaultFallback,
    /// No variant carries the default edition of a generic page; one carries
    /// the desired edition.
    DesiredFallback,
    /// Neither target nor default edition is available.
    ForcedFallback,
}

/// The variant chosen for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    /// Page number.
    pub page: u32,
    /// Chosen article id.
    pub article_id: String,
    /// Link id of the chosen variant's PDF.
    pub pdf_link: String,
    /// Editions of the chosen variant.
    pub editions: BTreeSet<String>,
    /// Matched edition or best-fit marker.
    pub matched: EditionMatch,
    /// Why this variant.
    pub reason: ResolutionReason,
    /// Page classification.
    pub kind: PageKind,
    /// Human-readable account for the progress log.
    pub narrative: String,
}

/// Picks one edition variant per page.
#[derive(Debug, Clone)]
pub struct EditionResolver {
    desired: String,
    default: String,
    classifier: ResortClassifier,
}

impl EditionResolver {
    /// Creates a resolver; edition names compare case-insensitively.
    #[must_use]
    pub fn new(desired: &str, default: &str, classifier: ResortClassifier) -> Self {
        Self {
            desired: desired.trim().to_lowercase(),
            default: default.trim().to_lowercase(),
            classifier,
        }
    }

    /// Resolver from the binder configuration.
    #[must_use]
    pub fn from_config(config: &BinderConfig) -> Self {
        Self::new(
            &config.editions.desired,
            &config.editions.default,
            ResortClassifier::from_config(&config.classification),
        )
    }

    /// Target edition for a page kind.
    #[must_use]
    pub fn target_for(&self, kind: PageKind) -> &str {
        match kind {
            PageKind::Regional => &self.desired,
            PageKind::Generic => &self.default,
        }
    }

    /// Resolves the variant to use for `page`, listed as `records`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unresolved`] when no variant's metadata could
    /// be obtained, and [`ResolveError::NoEntries`] for an empty group.
    #[instrument(skip(self, records, archive), fields(entries = records.len()))]
    pub async fn resolve(
        &self,
        page: u32,
        records: &[ArticleRecord],
        archive: &dyn Archive,
    ) -> Result<ResolvedPage, ResolveError> {
        let first = records.first().ok_or(ResolveError::NoEntries { page })?;

        let classification = self.classifier.classify(&first.resort, records.len());
        match &classification {
            Classification::Inferred { advisory, .. } => info!(page, "{advisory}"),
            other => {
                if let Some(warning) = other.note() {
                    warn!(page, "{warning}");
                }
            }
        }
        let kind = classification.kind();
        let target = self.target_for(kind).to_string();

        let variants = distinct_variants(records);
        let sole = variants.len() == 1;
        debug!(page, %kind, %target, variants = variants.len(), "resolving edition");

        let mut observed: Vec<(&ArticleRecord, EditionMetadata)> = Vec::new();
        let mut failures = 0usize;
        let mut network = false;

        for variant in &variants {
            let metadata = match archive.edition_metadata(&variant.id).await {
                Ok(MetadataOutcome::Found(metadata)) => metadata,
                Ok(MetadataOutcome::Exhausted { attempts }) => {
                    warn!(page, article_id = %variant.id, attempts, "edition metadata unavailable");
                    failures += 1;
                    network = true;
                    continue;
                }
                Err(error) => {
                    warn!(page, article_id = %variant.id, %error, "edition metadata lookup failed");
                    failures += 1;
                    network |= error.is_network();
                    continue;
                }
            };

            if metadata.contains(&target) {
                let reason = if sole {
                    ResolutionReason::SoleVariant
                } else {
                    ResolutionReason::TargetPresent
                };
                let narrative = if sole {
                    format!("edition {target} present")
                } else {
                    format!("edition {target} present ({} variants)", variants.len())
                };
                return Ok(resolved(
                    page,
                    variant,
                    metadata,
                    EditionMatch::Edition(target),
                    reason,
                    kind,
                    narrative,
                ));
            }
            observed.push((variant, metadata));
        }

        if observed.is_empty() {
            return Err(ResolveError::Unresolved {
                page,
                failures,
                network,
            });
        }

        if sole {
            let (variant, metadata) = observed.swap_remove(0);
            let matched = if metadata.contains(&self.default) {
                EditionMatch::Edition(self.default.clone())
            } else {
                EditionMatch::BestFit
            };
            let narrative = format!("only edition {metadata} available");
            return Ok(resolved(
                page,
                variant,
                metadata,
                matched,
                ResolutionReason::SoleVariant,
                kind,
                narrative,
            ));
        }

        let total = variants.len();
        if let Some(position) = observed
            .iter()
            .position(|(_, metadata)| metadata.contains(&self.default))
        {
            let (variant, metadata) = observed.swap_remove(position);
            let narrative = format!(
                "edition {target} missing, default edition {} chosen from {total} variants",
                self.default
            );
            return Ok(resolved(
                page,
                variant,
                metadata,
                EditionMatch::Edition(self.default.clone()),
                ResolutionReason::DefaultFallback,
                kind,
                narrative,
            ));
        }

        if target != self.desired
            && let Some(position) = observed
                .iter()
                .position(|(_, metadata)| metadata.contains(&self.desired))
        {
            let (variant, metadata) = observed.swap_remove(position);
            let narrative = format!(
                "edition {target} missing, desired edition {} chosen from {total} variants",
                self.desired
            );
            return Ok(resolved(
                page,
                variant,
                metadata,
                EditionMatch::Edition(self.desired.clone()),
                ResolutionReason::DesiredFallback,
                kind,
                narrative,
            ));
        }

        let (variant, metadata) = observed.swap_remove(0);
        let missing = if target == self.default {
            format!("edition {target} not")
        } else {
            format!("neither {target} nor {}", self.default)
        };
        let narrative =
            format!("forced fallback: {missing} among {total} variants, took {metadata}");
        Ok(resolved(
            page,
            variant,
            metadata,
            EditionMatch::BestFit,
            ResolutionReason::ForcedFallback,
            kind,
            narrative,
        ))
    }
}

fn resolved(
    page: u32,
    variant: &ArticleRecord,
    metadata: EditionMetadata,
    matched: EditionMatch,
    reason: ResolutionReason,
    kind: PageKind,
    narrative: String,
) -> ResolvedPage {
    ResolvedPage {
        page,
        article_id: variant.id.clone(),
        pdf_link: metadata.pdf_link,
        editions: metadata.editions,
        matched,
        reason,
        kind,
        narrative,
    }
}

/// First record per distinct group tag, in listing order.
///
/// Records without a group tag are each their own variant.
fn distinct_variants(records: &[ArticleRecord]) -> Vec<&ArticleRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    records
        .iter()
        .filter(|record| record.group.is_empty() || seen.insert(record.group.as_str()))
        .collect()
}
