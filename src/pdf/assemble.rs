//! Binding cleaned pages into one document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lopdf::{Document, Object, dictionary};
use thiserror::Error;
use tracing::{debug, info};

use super::page::PageObject;

/// PDF version of the bound document.
const OUTPUT_PDF_VERSION: &str = "1.5";

/// Assembly failures.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// No page to bind.
    #[error("no pages to assemble")]
    Empty,

    /// A page's own document is inconsistent.
    #[error("page {page}: {reason}")]
    Malformed {
        /// Issue page number.
        page: u32,
        /// What is wrong.
        reason: String,
    },

    /// Serializing the document failed.
    #[error("failed to encode output document: {reason}")]
    Encode {
        /// Encoder message.
        reason: String,
    },

    /// Writing the document failed.
    #[error("failed to write '{path}'")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// The bound issue, written once.
#[derive(Debug)]
pub struct OutputDocument {
    document: Document,
    page_numbers: Vec<u32>,
}

impl OutputDocument {
    /// Issue page numbers in output order.
    #[must_use]
    pub fn page_numbers(&self) -> &[u32] {
        &self.page_numbers
    }

    /// Serializes the document.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Encode`] when serialization fails.
    pub fn into_bytes(self) -> Result<Vec<u8>, AssembleError> {
        let mut document = self.document;
        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|e| AssembleError::Encode {
                reason: e.to_string(),
            })?;
        Ok(buffer)
    }

    /// Writes the document to `path`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Encode`] or [`AssembleError::Io`].
    pub fn write_to(self, path: &Path) -> Result<(), AssembleError> {
        let pages = self.page_numbers.len();
        let bytes = self.into_bytes()?;
        fs::write(path, &bytes).map_err(|source| AssembleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), pages, bytes = bytes.len(), "wrote issue");
        Ok(())
    }
}

/// Merges page objects into one document in ascending page order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    /// Creates an assembler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Binds `pages` in ascending page-number order.
    ///
    /// Missing page numbers are skipped, never padded. Each page's objects are
    /// renumbered into the output; the source catalogs and page trees are
    /// dropped and every page is re-parented under one new page tree.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Empty`] for an empty input and
    /// [`AssembleError::Malformed`] when a page cannot be located after
    /// renumbering.
    pub fn assemble(&self, pages: BTreeMap<u32, PageObject>) -> Result<OutputDocument, AssembleError> {
        if pages.is_empty() {
            return Err(AssembleError::Empty);
        }

        let mut output = Document::with_version(OUTPUT_PDF_VERSION);
        let pages_id = output.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        let mut page_numbers = Vec::with_capacity(pages.len());

        for (number, page) in pages {
            let (mut document, _) = page.into_parts();
            document.renumber_objects_with(output.max_id + 1);
            let page_id = document
                .get_pages()
                .values()
                .next()
                .copied()
                .ok_or_else(|| AssembleError::Malformed {
                    page: number,
                    reason: "page lost during renumbering".to_string(),
                })?;

            for (id, mut object) in std::mem::take(&mut document.objects) {
                if is_tree_node(&object) {
                    continue;
                }
                if id == page_id
                    && let Object::Dictionary(dict) = &mut object
                {
                    dict.set("Parent", pages_id);
                }
                output.max_id = output.max_id.max(id.0);
                output.objects.insert(id, object);
            }

            kids.push(Object::Reference(page_id));
            page_numbers.push(number);
            debug!(page = number, "added page");
        }

        let count = i64::try_from(kids.len()).map_err(|_| AssembleError::Encode {
            reason: "too many pages".to_string(),
        })?;
        output.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = output.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        output.trailer.set("Root", catalog_id);
        output.compress();

        Ok(OutputDocument {
            document: output,
            page_numbers,
        })
    }
}

/// Catalog and page tree nodes of a source document.
fn is_tree_node(object: &Object) -> bool {
    let Object::Dictionary(dict) = object else {
        return false;
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Catalog" | b"Pages")
    )
}

/// Output file name for an issue.
///
/// `{id}_{YYYY-MM-DD}_{edition}.pdf`, with the weekday abbreviation after the
/// date when `include_weekday` is set.
#[must_use]
pub fn output_file_name(
    newspaper_id: &str,
    date: NaiveDate,
    edition: &str,
    include_weekday: bool,
) -> String {
    let date_part = if include_weekday {
        date.format("%Y-%m-%d_%a").to_string()
    } else {
        date.format("%Y-%m-%d").to_string()
    };
    format!(
        "{}_{}_{}.pdf",
        sanitize_filename_component(newspaper_id),
        date_part,
        sanitize_filename_component(edition)
    )
}

/// Maps anything unsafe in a file name to single underscores.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{marked_page_pdf, page_marker, page_texts, single_page_pdf};
    use crate::pdf::watermark::WatermarkStripper;

    fn page(number: u32) -> PageObject {
        let stripper = WatermarkStripper::new(Vec::new());
        PageObject::from_pdf_bytes(number, &marked_page_pdf(i64::from(number)), &stripper).unwrap()
    }

    fn reload(output: OutputDocument) -> Document {
        Document::load_mem(&output.into_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let err = DocumentAssembler::new().assemble(BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AssembleError::Empty));
    }

    #[test]
    fn test_pages_are_ordered_and_gaps_skipped() {
        let mut pages = BTreeMap::new();
        for number in [7, 2, 3] {
            pages.insert(number, page(number));
        }
        let output = DocumentAssembler::new().assemble(pages).unwrap();
        assert_eq!(output.page_numbers(), &[2, 3, 7]);

        let document = reload(output);
        let markers: Vec<i64> = document
            .get_pages()
            .values()
            .map(|id| page_marker(&document, *id))
            .collect();
        assert_eq!(markers, vec![2, 3, 7]);
    }

    #[test]
    fn test_assembled_pages_keep_their_content() {
        let stripper = WatermarkStripper::new(vec!["Alle Rechte".to_string()]);
        let first =
            PageObject::from_pdf_bytes(1, &single_page_pdf(&["Alle Rechte vorbehalten"]), &stripper)
                .unwrap();
        let mut pages = BTreeMap::new();
        pages.insert(1, first);
        let document = reload(DocumentAssembler::new().assemble(pages).unwrap());
        assert_eq!(page_texts(&document), vec![String::new()]);

        let page_id = *document.get_pages().values().next().unwrap();
        let dict = document.get_dictionary(page_id).unwrap();
        assert!(dict.has(b"Resources"));
        assert!(dict.has(b"MediaBox"));
    }

    #[test]
    fn test_write_to_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issue.pdf");
        let mut pages = BTreeMap::new();
        pages.insert(5, page(5));
        DocumentAssembler::new()
            .assemble(pages)
            .unwrap()
            .write_to(&path)
            .unwrap();
        let document = Document::load(&path).unwrap();
        assert_eq!(document.get_pages().len(), 1);
    }

    #[test]
    fn test_output_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            output_file_name("OTZ", date, "Jena", false),
            "OTZ_2024-01-02_Jena.pdf"
        );
        assert_eq!(
            output_file_name("OTZ", date, "Jena", true),
            "OTZ_2024-01-02_Tue_Jena.pdf"
        );
        assert_eq!(
            output_file_name("OTZ", date, "Saale/Orla Kreis", false),
            "OTZ_2024-01-02_Saale_Orla_Kreis.pdf"
        );
    }

    #[test]
    fn test_sanitize_filename_component() {
        assert_eq!(sanitize_filename_component("../etc"), "etc");
        assert_eq!(sanitize_filename_component("  Bad  Lobenstein "), "Bad_Lobenstein");
        assert_eq!(sanitize_filename_component("Pößneck"), "Pößneck");
    }
}
