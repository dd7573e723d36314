//! Page materialization and issue assembly over `lopdf`.
//!
//! - [`content`] - byte-level scan of content streams for text-show operands
//! - [`watermark`] - blanks text-show runs in a page content stream
//! - [`page`] - one-page source validation, attribute inheritance, stripping
//! - [`assemble`] - merge of cleaned pages into one ordered document

pub mod assemble;
pub mod content;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod page;
pub mod watermark;

pub use assemble::{AssembleError, DocumentAssembler, OutputDocument, output_file_name};
pub use content::ContentScanError;
pub use page::{MaterializeError, PageMaterializer, PageObject, SourceFormatError};
pub use watermark::{StripError, StripReport, WatermarkStripper, decode_pdf_string};
