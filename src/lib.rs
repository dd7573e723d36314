//! Newsbinder Core Library
//!
//! Assembles one regional edition of a daily newspaper issue from a library
//! archive that serves every page as a separate, watermarked PDF.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP fetching with retry policy and fetch counters
//! - [`html`] - CSS selection over parsed archive markup
//! - [`toc`] - Table-of-contents parsing into article records
//! - [`grouper`] - Grouping of article records by physical page
//! - [`archive`] - Archive session, TOC, edition metadata and page PDFs
//! - [`resolver`] - Page classification and edition variant selection
//! - [`pdf`] - Watermark stripping and document assembly
//! - [`pipeline`] - The issue run from TOC to output file
//! - [`local`] - Rebinding of already downloaded page files
//! - [`config`] - TOML configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod fetch;
pub mod grouper;
pub mod html;
pub mod local;
pub mod pdf;
pub mod pipeline;
pub mod resolver;
pub mod toc;
mod user_agent;

// Re-export commonly used types
pub use archive::{
    Archive, ArchiveError, ArchiveSettings, Credentials, EditionMetadata, GeniosArchive,
    MetadataOutcome,
};
pub use config::{BinderConfig, ConfigError};
pub use fetch::{FetchError, FetchStats, Fetcher, RetryPolicy};
pub use grouper::{PageGroups, group_by_page};
pub use html::LookupError;
pub use local::{LocalBindError, LocalBindReport, bind_directory};
pub use pdf::{DocumentAssembler, PageMaterializer, WatermarkStripper};
pub use pipeline::{ExcludedPage, IssueBinder, IssueReport, RunContext, RunError};
pub use resolver::{EditionResolver, PageKind, ResolvedPage};
pub use toc::{ArticleRecord, TocParser};
