//! Watermark removal from page content streams.
//!
//! The distributor's notice is drawn as several adjacent text runs, so every
//! text-show operation on the page is blanked. Runs starting with a known
//! notice prefix go silently; anything else is logged with its text so an
//! operator notices if real page text is ever swept up.
//!
//! Blanking rewrites the string operands in the raw stream bytes and copies
//! every other byte through, so numbers, inline images and vector operations
//! keep their exact encoding.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::{debug, warn};

use super::content::{ContentScanError, replace_spans, text_shows};
use crate::config::WatermarkConfig;

/// Operand written over every blanked string.
const EMPTY_STRING: &[u8] = b"()";

/// Page content that cannot be stripped.
#[derive(Debug, Error)]
pub enum StripError {
    /// The content stream could not be read from the document.
    #[error("unreadable page content")]
    Read(#[from] lopdf::Error),

    /// The content stream could not be scanned.
    #[error("undecodable page content: {0}")]
    Scan(#[from] ContentScanError),
}

/// Outcome of one stripping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
    /// Text runs blanked.
    pub blanked: usize,
    /// Texts of blanked runs that matched no known prefix.
    pub unexpected: Vec<String>,
}

impl StripReport {
    /// True when the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.blanked == 0
    }
}

/// Blanks text-show operations in content streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkStripper {
    prefixes: Vec<String>,
}

impl WatermarkStripper {
    /// Creates a stripper recognizing `prefixes` as known boilerplate.
    #[must_use]
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Stripper from the `[watermark]` section.
    #[must_use]
    pub fn from_config(config: &WatermarkConfig) -> Self {
        Self::new(config.prefixes.clone())
    }

    fn is_known(&self, text: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| text.starts_with(prefix.as_str()))
    }

    /// Blanks every non-empty text-show run of a raw content stream.
    ///
    /// Returns the rewritten stream, or `None` when nothing needed blanking.
    /// Already-empty runs are left alone, so a second pass is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ContentScanError`] when the stream cannot be scanned.
    pub fn strip_stream(
        &self,
        raw: &[u8],
    ) -> Result<(Option<Vec<u8>>, StripReport), ContentScanError> {
        let mut report = StripReport::default();
        let mut spans = Vec::new();

        for show in text_shows(raw)? {
            let mut text = String::new();
            let mut has_text = false;
            for run in show.runs.iter().filter(|run| !run.bytes.is_empty()) {
                has_text = true;
                text.push_str(&decode_pdf_string(&run.bytes));
                spans.push(run.span.clone());
            }
            if !has_text {
                continue;
            }
            report.blanked += 1;
            if !self.is_known(&text) {
                warn!(text = %text, operator = %show.operator, "removed unexpected text run");
                report.unexpected.push(text);
            }
        }

        if report.is_noop() {
            return Ok((None, report));
        }
        Ok((Some(replace_spans(raw, &spans, EMPTY_STRING)), report))
    }

    /// Strips the content stream(s) of `page_id` in `document`.
    ///
    /// When anything was blanked the page gets a single new content stream;
    /// otherwise the document is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StripError`] for an unreadable or unscannable content stream.
    pub fn strip_page(
        &self,
        document: &mut Document,
        page_id: ObjectId,
    ) -> Result<StripReport, StripError> {
        let raw = document.get_page_content(page_id)?;
        let (stripped, report) = self.strip_stream(&raw)?;
        let Some(stripped) = stripped else {
            return Ok(report);
        };

        let stream_id = document.add_object(Stream::new(Dictionary::new(), stripped));
        document
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", Object::Reference(stream_id));
        debug!(
            blanked = report.blanked,
            unexpected = report.unexpected.len(),
            "stripped watermark"
        );
        Ok(report)
    }
}

/// Best-effort decoding of a PDF string operand.
///
/// UTF-16BE with byte-order mark, then UTF-8, then Latin-1.
#[must_use]
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stripper() -> WatermarkStripper {
        WatermarkStripper::new(vec![
            "Alle Rechte vorbehalten".to_string(),
            " Download vom".to_string(),
            "Dieses Dokument ist lizenziert für ".to_string(),
        ])
    }

    fn strip(raw: &[u8]) -> (Vec<u8>, StripReport) {
        let (stripped, report) = stripper().strip_stream(raw).unwrap();
        (stripped.unwrap_or_else(|| raw.to_vec()), report)
    }

    const SAMPLE: &[u8] = b"q 0 0 100 50 re f BT /F1 8 Tf \
(Alle Rechte vorbehalten. \\251 Ostth\\374ringer Zeitung.) Tj \
( Download vom 01.01.2024) Tj (Seite 3) Tj ET Q";

    #[test]
    fn test_known_prefixes_blanked_silently_unknown_reported() {
        let (out, report) = strip(SAMPLE);
        assert_eq!(report.blanked, 3);
        assert_eq!(report.unexpected, vec!["Seite 3".to_string()]);
        assert_eq!(
            out,
            b"q 0 0 100 50 re f BT /F1 8 Tf () Tj () Tj () Tj ET Q".to_vec()
        );
    }

    #[test]
    fn test_stripping_is_idempotent() {
        let (once, _) = strip(SAMPLE);
        let (again, report) = stripper().strip_stream(&once).unwrap();
        assert!(again.is_none());
        assert!(report.is_noop());
        assert!(report.unexpected.is_empty());
    }

    #[test]
    fn test_non_text_bytes_are_copied_verbatim() {
        let raw: &[u8] = b"q 0.12345678 0 0 1 612.3456789 0 cm \
BI /W 2 /H 1 /BPC 8 /CS /G ID \x80() Tj\xFF EI \
Q BT /F1 9.75 Tf 1 0 0 1 56.6929 771.0236 Tm [(Seite) -250.5 (3)] TJ ET \
0.333333 w 10 10 m 200.000001 10 l S";
        let (out, report) = strip(raw);
        assert_eq!(report.blanked, 1);
        assert_eq!(report.unexpected, vec!["Seite3".to_string()]);

        let expected: &[u8] = b"q 0.12345678 0 0 1 612.3456789 0 cm \
BI /W 2 /H 1 /BPC 8 /CS /G ID \x80() Tj\xFF EI \
Q BT /F1 9.75 Tf 1 0 0 1 56.6929 771.0236 Tm [() -250.5 ()] TJ ET \
0.333333 w 10 10 m 200.000001 10 l S";
        assert_eq!(out, expected.to_vec());
    }

    #[test]
    fn test_tj_array_and_quote_operators() {
        let raw = b"[(Dieses Dokument ist ) -120 (lizenziert f\\374r ThULB)] TJ \
1 2 (Anzeige) \" (Fortsetzung) ' [() 40] TJ";
        let (out, report) = strip(raw);
        assert_eq!(report.blanked, 3);
        assert_eq!(
            report.unexpected,
            vec!["Anzeige".to_string(), "Fortsetzung".to_string()]
        );
        assert_eq!(out, b"[() -120 ()] TJ 1 2 () \" () ' [() 40] TJ".to_vec());
        assert!(stripper().strip_stream(&out).unwrap().0.is_none());
    }

    #[test]
    fn test_unterminated_inline_image_is_an_error() {
        let err = stripper()
            .strip_stream(b"q BI /W 1 /H 1 ID \x80 Q BT (x) Tj ET")
            .unwrap_err();
        assert!(matches!(err, ContentScanError::UnterminatedInlineImage { .. }));
    }

    #[test]
    fn test_default_prefixes_cover_the_publisher_notice() {
        let stripper = WatermarkStripper::from_config(&WatermarkConfig::default());
        let raw = "BT (Alle Rechte vorbehalten. \u{a9} Ostth\u{fc}ringer Zeitung.  Download vom 02.01.2024 09:14 ) Tj \
( Download vom 01.01.2024) Tj \
(Dieses Dokument ist lizenziert f\u{fc}r ThULB Jena.) Tj ET";
        let (stripped, report) = stripper.strip_stream(raw.as_bytes()).unwrap();
        assert_eq!(report.blanked, 3);
        assert!(report.unexpected.is_empty(), "{:?}", report.unexpected);
        assert!(stripped.is_some());
    }

    #[test]
    fn test_decode_pdf_string_variants() {
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xDC]), "AÜ");
        assert_eq!(decode_pdf_string(&[0x47, 0x72, 0xFC, 0xDF]), "Grüß");
    }

    #[test]
    fn test_strip_page_rewrites_contents_only_when_needed() {
        let bytes = crate::pdf::fixtures::single_page_pdf(&["Alle Rechte vorbehalten. x"]);
        let mut document = Document::load_mem(&bytes).unwrap();
        let page_id = *document.get_pages().values().next().unwrap();

        let first = stripper().strip_page(&mut document, page_id).unwrap();
        assert_eq!(first.blanked, 1);
        assert!(first.unexpected.is_empty());

        let max_id = document.max_id;
        let second = stripper().strip_page(&mut document, page_id).unwrap();
        assert!(second.is_noop());
        assert_eq!(document.max_id, max_id);
    }
}
