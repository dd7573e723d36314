//! Resort-based page classification.
//!
//! Regional pages carry many short per-locality items, generic pages a few
//! long wire items. The resort of the first entry is the primary signal, the
//! entry count confirms it or decides for unknown resorts.

use std::collections::BTreeSet;
use std::fmt;

use crate::config::ClassificationConfig;

/// Which edition a page should be taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// National/wire content; take the default edition.
    Generic,
    /// Local content; take the desired regional edition.
    Regional,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::Regional => write!(f, "regional"),
        }
    }
}

/// Classification of one page with its diagnostic, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Resort is in the generic set.
    Generic {
        /// Set when the entry count contradicts the resort.
        warning: Option<String>,
    },
    /// Resort is in the regional set.
    Regional {
        /// Set when the entry count contradicts the resort.
        warning: Option<String>,
    },
    /// Resort is unknown; the entry count decided.
    Inferred {
        /// Kind inferred from the count.
        kind: PageKind,
        /// Suggests which set the resort belongs to.
        advisory: String,
    },
}

impl Classification {
    /// The resulting page kind.
    #[must_use]
    pub fn kind(&self) -> PageKind {
        match self {
            Self::Generic { .. } => PageKind::Generic,
            Self::Regional { .. } => PageKind::Regional,
            Self::Inferred { kind, .. } => *kind,
        }
    }

    /// Warning or advisory text, if any.
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Generic { warning } | Self::Regional { warning } => warning.as_deref(),
            Self::Inferred { advisory, .. } => Some(advisory),
        }
    }
}

/// Classifies pages by resort membership and entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResortClassifier {
    generic: BTreeSet<String>,
    regional: BTreeSet<String>,
    frontier: usize,
}

impl ResortClassifier {
    /// Creates a classifier from two disjoint resort sets and the frontier.
    #[must_use]
    pub fn new(generic: BTreeSet<String>, regional: BTreeSet<String>, frontier: usize) -> Self {
        Self {
            generic,
            regional,
            frontier,
        }
    }

    /// Classifier from the `[classification]` section.
    #[must_use]
    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(
            config.generic_resorts.clone(),
            config.regional_resorts.clone(),
            config.article_frontier,
        )
    }

    /// Classifies a page whose first entry has `resort` and which lists `entries` entries.
    #[must_use]
    pub fn classify(&self, resort: &str, entries: usize) -> Classification {
        let frontier = self.frontier;
        if self.generic.contains(resort) {
            let warning = (entries > frontier).then(|| {
                format!(
                    "generic resort \"{resort}\" has {entries} entries, more than the frontier of {frontier}"
                )
            });
            return Classification::Generic { warning };
        }
        if self.regional.contains(resort) {
            let warning = (entries <= frontier).then(|| {
                format!(
                    "regional resort \"{resort}\" has only {entries} entries, at most the frontier of {frontier}"
                )
            });
            return Classification::Regional { warning };
        }

        let kind = if entries > frontier {
            PageKind::Regional
        } else {
            PageKind::Generic
        };
        let advisory = format!(
            "unknown resort \"{resort}\" with {entries} entries treated as {kind}; \
             consider adding it to the {kind} resorts"
        );
        Classification::Inferred { kind, advisory }
    }
}
