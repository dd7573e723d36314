//! Rebinding of page files already downloaded into a directory.
//!
//! Page files are named
//! `seite_{ID}_{EDITION}_{YYYYMMDD}_V{v1}_{page}_V{v2}.pdf`. Only files of
//! the first date seen (in file name order) are bound; the output carries the
//! highest `v1`/`v2` versions found.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::pdf::{AssembleError, DocumentAssembler, PageObject, SourceFormatError, WatermarkStripper};

#[allow(clippy::expect_used)]
static PAGE_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^seite_(?P<id>[A-Z]+)_(?P<edition>[A-Z]*)_(?P<date>\d{8})_V(?P<v1>\d{2})_(?P<page>\d{3})_V(?P<v2>\d)\.pdf$",
    )
    .expect("page file regex is valid") // Static pattern, safe to panic
});

/// Local rebinding failures.
#[derive(Debug, Error)]
pub enum LocalBindError {
    /// Reading the directory failed.
    #[error("failed to read '{path}'")]
    Io {
        /// Directory or file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No page file matched.
    #[error("no page files found in '{dir}'")]
    NoPages {
        /// Scanned directory.
        dir: PathBuf,
    },

    /// A page file is unusable.
    #[error("unusable page file '{path}'")]
    Page {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: SourceFormatError,
    },

    /// Binding or writing failed.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Fields of one matched page file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFileName {
    /// Newspaper identifier.
    pub newspaper_id: String,
    /// Edition code, possibly empty.
    pub edition: String,
    /// Issue date as `YYYYMMDD`.
    pub date: String,
    /// Issue page number.
    pub page: u32,
    /// First version component.
    pub v1: u32,
    /// Second version component.
    pub v2: u32,
}

impl PageFileName {
    /// Matches a whole file name; anything else is `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let caps = PAGE_FILE_PATTERN.captures(name)?;
        Some(Self {
            newspaper_id: caps["id"].to_string(),
            edition: caps["edition"].to_string(),
            date: caps["date"].to_string(),
            page: caps["page"].parse().ok()?,
            v1: caps["v1"].parse().ok()?,
            v2: caps["v2"].parse().ok()?,
        })
    }
}

/// Cleaned pages of one issue collected from a directory.
#[derive(Debug)]
pub struct LocalIssue {
    newspaper_id: String,
    edition: String,
    date: String,
    v1: u32,
    v2: u32,
    pages: BTreeMap<u32, PageObject>,
}

impl LocalIssue {
    /// Page numbers collected, ascending.
    #[must_use]
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// `{ID}_{EDITION}_{YYYYMMDD}_V{v1:02}_V{v2}.pdf`
    #[must_use]
    pub fn output_file_name(&self) -> String {
        format!(
            "{}_{}_{}_V{:02}_V{}.pdf",
            self.newspaper_id, self.edition, self.date, self.v1, self.v2
        )
    }
}

/// Result of a local rebinding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBindReport {
    /// Written document.
    pub output_path: PathBuf,
    /// Page numbers bound.
    pub pages: Vec<u32>,
}

/// Collects and strips the page files of the first issue found in `dir`.
///
/// # Errors
///
/// Returns [`LocalBindError::NoPages`] when nothing matches and
/// [`LocalBindError::Page`] for a file that is not a single-page PDF.
pub fn collect_directory(
    dir: &Path,
    stripper: &WatermarkStripper,
) -> Result<LocalIssue, LocalBindError> {
    let io_error = |source: std::io::Error| LocalBindError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        if let Some(name) = entry.file_name().to_str() {
            names.push((name.to_string(), entry.path()));
        }
    }
    names.sort();

    let mut issue: Option<LocalIssue> = None;
    for (name, path) in names {
        let Some(file) = PageFileName::parse(&name) else {
            continue;
        };
        let issue = issue.get_or_insert_with(|| LocalIssue {
            newspaper_id: file.newspaper_id.clone(),
            edition: file.edition.clone(),
            date: file.date.clone(),
            v1: 0,
            v2: 0,
            pages: BTreeMap::new(),
        });
        if file.date != issue.date || file.newspaper_id != issue.newspaper_id {
            debug!(file = %name, "skipping page of another issue");
            continue;
        }

        let bytes = fs::read(&path).map_err(|source| LocalBindError::Io {
            path: path.clone(),
            source,
        })?;
        let page = PageObject::from_pdf_bytes(file.page, &bytes, stripper)
            .map_err(|source| LocalBindError::Page { path, source })?;
        issue.v1 = issue.v1.max(file.v1);
        issue.v2 = issue.v2.max(file.v2);
        issue.pages.insert(file.page, page);
    }

    issue.ok_or_else(|| LocalBindError::NoPages {
        dir: dir.to_path_buf(),
    })
}

/// Binds the page files in `dir` into one document in the same directory.
///
/// # Errors
///
/// See [`collect_directory`]; assembly and write failures are
/// [`LocalBindError::Assemble`].
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn bind_directory(
    dir: &Path,
    stripper: &WatermarkStripper,
) -> Result<LocalBindReport, LocalBindError> {
    let mut issue = collect_directory(dir, stripper)?;
    let output_path = dir.join(issue.output_file_name());
    let pages = issue.page_numbers();
    info!(pages = ?pages, "adding pages");

    let document = DocumentAssembler::new().assemble(std::mem::take(&mut issue.pages))?;
    document.write_to(&output_path)?;
    Ok(LocalBindReport { output_path, pages })
}
