//! Binder configuration.
//!
//! Every tunable of the pipeline lives here: the archive endpoints, the two
//! edition names, the resort classification sets, the TOC and metadata
//! selectors, the watermark prefixes and the fetch budget. The file format is
//! TOML; every section and key is optional and falls back to the values below.
//!
//! ```toml
//! [editions]
//! desired = "Jena"
//! default = "Schleiz"
//!
//! [classification]
//! article_frontier = 15
//! regional_resorts = ["Lokalnachrichten", "Jena"]
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::fetch::{Backoff, FetchTimeouts, RetryPolicy};

/// Default newspaper identifier in archive URLs and output names.
pub const DEFAULT_NEWSPAPER_ID: &str = "OTZ";

/// Default archive portal.
pub const DEFAULT_BASE_URL: &str = "https://bib-jena.genios.de";

/// Default article-count frontier between generic and regional pages.
pub const DEFAULT_ARTICLE_FRONTIER: usize = 15;

/// Default TOC page-size cap.
pub const DEFAULT_TOC_MAX_ENTRIES: u32 = 500;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}'")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config: {message}")]
    Parse {
        /// Parser message including the offending location.
        message: String,
    },

    /// A value is out of range or inconsistent with another value.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete binder configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BinderConfig {
    /// Which newspaper and where its archive lives.
    pub newspaper: NewspaperConfig,
    /// Desired and fallback edition names.
    pub editions: EditionConfig,
    /// Resort classification heuristic.
    pub classification: ClassificationConfig,
    /// TOC request and row extraction.
    pub toc: TocConfig,
    /// Article metadata extraction.
    pub metadata: MetadataConfig,
    /// Watermark stripping.
    pub watermark: WatermarkConfig,
    /// Network budget.
    pub fetch: FetchConfig,
    /// Output location and naming.
    pub output: OutputConfig,
    /// Archive portal login.
    pub credentials: CredentialsConfig,
}

/// `[newspaper]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NewspaperConfig {
    /// Newspaper identifier, e.g. `OTZ`.
    pub id: String,
    /// Archive portal base URL, without trailing slash.
    pub base_url: String,
}

impl Default for NewspaperConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_NEWSPAPER_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// `[editions]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EditionConfig {
    /// Regional edition to assemble.
    pub desired: String,
    /// Edition used for non-regional pages and as fallback.
    pub default: String,
}

impl Default for EditionConfig {
    fn default() -> Self {
        Self {
            desired: "Jena".to_string(),
            default: "Schleiz".to_string(),
        }
    }
}

/// `[classification]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationConfig {
    /// Resorts that mark a page as generic (national, wire service).
    pub generic_resorts: BTreeSet<String>,
    /// Resorts that mark a page as regional.
    pub regional_resorts: BTreeSet<String>,
    /// Pages with more entries than this are expected to be regional.
    pub article_frontier: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        let generic = [
            "Titelseite",
            "Politik",
            "Wirtschaft",
            "Thüringen",
            "Kultur",
            "Sport",
            "Panorama",
            "Meinung",
            "Medien",
            "Ratgeber",
            "Wissen",
            "Reise",
        ];
        let regional = [
            "Lokalnachrichten",
            "Lokales",
            "Lokalsport",
            "Region",
            "Jena",
            "Gera",
            "Schleiz",
            "Saale-Holzland",
            "Saale-Orla",
        ];
        Self {
            generic_resorts: generic.iter().map(|s| (*s).to_string()).collect(),
            regional_resorts: regional.iter().map(|s| (*s).to_string()).collect(),
            article_frontier: DEFAULT_ARTICLE_FRONTIER,
        }
    }
}

/// `[toc]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TocConfig {
    /// Maximum entries requested from the archive in one TOC listing.
    pub max_entries: u32,
    /// Pages below this number are skipped.
    pub min_page: u32,
    /// Literal prefix in front of the page number, e.g. `S. 12`.
    pub page_label_prefix: String,
    /// Row cell holding the article title.
    pub title_selector: String,
    /// Row cell holding the resort label.
    pub resort_selector: String,
    /// Row cell holding the page label.
    pub page_selector: String,
    /// Excerpt fragments, zero or more per row.
    pub description_selector: String,
    /// Abstract fragments, zero or more per row.
    pub abstract_selector: String,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_TOC_MAX_ENTRIES,
            min_page: 1,
            page_label_prefix: "S. ".to_string(),
            title_selector: "td:nth-child(2)".to_string(),
            resort_selector: "td:nth-child(5)".to_string(),
            page_selector: "td:nth-child(7)".to_string(),
            description_selector: "td:nth-child(3) span.description".to_string(),
            abstract_selector: "td:nth-child(3) span.abstract".to_string(),
        }
    }
}

/// `[metadata]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Cell holding the semicolon-separated edition list.
    pub edition_selector: String,
    /// Anchor whose `id` attribute is the PDF link.
    pub link_selector: String,
    /// Separator inside the edition field.
    pub edition_separator: String,
    /// Phrase the archive shows when the session lacks permission.
    pub authorization_denied_phrase: String,
    /// Attempts while the authorization banner is shown.
    pub attempts: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            edition_selector: "tr:nth-child(3) td.boxFirst + td".to_string(),
            link_selector: "span.boxItem a".to_string(),
            edition_separator: ";".to_string(),
            authorization_denied_phrase:
                "Ihre Kennung hat nicht die Berechtigung diese Datenbank abzurufen.".to_string(),
            attempts: 3,
        }
    }
}

/// `[watermark]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    /// Known boilerplate prefixes, removed without a diagnostic.
    ///
    /// The notice is drawn in several runs; the download timestamp may be a
    /// run of its own.
    pub prefixes: Vec<String>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "Alle Rechte vorbehalten. © Ostthüringer Zeitung.  Download vom".to_string(),
                " Download vom ".to_string(),
                "Dieses Dokument ist lizenziert für ".to_string(),
            ],
        }
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Attempts per request on connection-level failures.
    pub attempts: u32,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
    /// Unit of the `attempt²` metadata backoff, in milliseconds.
    pub backoff_unit_ms: u64,
    /// Whole-issue attempts on network exhaustion.
    pub run_attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: crate::fetch::DEFAULT_MAX_ATTEMPTS,
            connect_timeout_secs: crate::fetch::CONNECT_TIMEOUT_SECS,
            read_timeout_secs: crate::fetch::READ_TIMEOUT_SECS,
            backoff_unit_ms: 1000,
            run_attempts: 2,
        }
    }
}

impl FetchConfig {
    /// Client timeouts.
    #[must_use]
    pub fn timeouts(&self) -> FetchTimeouts {
        FetchTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
        }
    }

    /// Immediate-retry policy for TOC and page requests.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.attempts)
    }

    /// Unit of the quadratic metadata backoff.
    #[must_use]
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Quadratic-backoff policy for metadata requests.
    #[must_use]
    pub fn metadata_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts,
            Backoff::Quadratic {
                unit: self.backoff_unit(),
            },
        )
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory the bound issue is written to.
    pub directory: PathBuf,
    /// Insert the weekday abbreviation after the date in the file name.
    pub include_weekday: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            include_weekday: false,
        }
    }
}

/// `[credentials]` section. The password never appears in `Debug` output.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Library card number.
    pub username: Option<String>,
    /// Portal password.
    pub password: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl BinderConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for inconsistent values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.newspaper.id.trim().is_empty() {
            return Err(ConfigError::invalid("newspaper.id", "must not be empty"));
        }
        if url::Url::parse(&self.newspaper.base_url).is_err() {
            return Err(ConfigError::invalid(
                "newspaper.base_url",
                format!("'{}' is not an absolute URL", self.newspaper.base_url),
            ));
        }
        if self.editions.desired.trim().is_empty() {
            return Err(ConfigError::invalid("editions.desired", "must not be empty"));
        }
        if self.editions.default.trim().is_empty() {
            return Err(ConfigError::invalid("editions.default", "must not be empty"));
        }

        let overlap: Vec<&str> = self
            .classification
            .generic_resorts
            .intersection(&self.classification.regional_resorts)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::invalid(
                "classification",
                format!(
                    "resorts listed as both generic and regional: {}",
                    overlap.join(", ")
                ),
            ));
        }

        if !(1..=5000).contains(&self.toc.max_entries) {
            return Err(ConfigError::invalid(
                "toc.max_entries",
                format!("{}. Expected range: 1..=5000", self.toc.max_entries),
            ));
        }
        if self.metadata.edition_separator.is_empty() {
            return Err(ConfigError::invalid(
                "metadata.edition_separator",
                "must not be empty",
            ));
        }
        validate_attempts("metadata.attempts", self.metadata.attempts)?;
        validate_attempts("fetch.attempts", self.fetch.attempts)?;
        validate_attempts("fetch.run_attempts", self.fetch.run_attempts)?;
        validate_timeout_secs("fetch.connect_timeout_secs", self.fetch.connect_timeout_secs)?;
        validate_timeout_secs("fetch.read_timeout_secs", self.fetch.read_timeout_secs)?;
        if self.fetch.backoff_unit_ms > 60_000 {
            return Err(ConfigError::invalid(
                "fetch.backoff_unit_ms",
                format!("{}. Expected range: 0..=60000", self.fetch.backoff_unit_ms),
            ));
        }
        Ok(())
    }
}

fn validate_attempts(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if (1..=10).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 1..=10"),
        ))
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=3600).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 1..=3600"),
        ))
    }
}
