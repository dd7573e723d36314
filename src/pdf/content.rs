//! Byte-level scanning of page content streams.
//!
//! [`text_shows`] walks the raw stream and reports every text-show operation
//! (`Tj`, `'`, `"`, `TJ`) together with the byte spans of its string
//! operands. Nothing is decoded into an object model and re-encoded, so a
//! caller that rewrites those spans leaves every other byte as it was.
//! Inline image data (`BI … ID … EI`) is skipped unread.

use std::ops::Range;

use thiserror::Error;

/// A content stream the scanner cannot follow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentScanError {
    /// A literal or hex string runs to the end of the stream.
    #[error("unterminated string starting at byte {offset}")]
    UnterminatedString {
        /// Offset of the opening delimiter.
        offset: usize,
    },

    /// An inline image has no `ID` or no `EI`.
    #[error("unterminated inline image starting at byte {offset}")]
    UnterminatedInlineImage {
        /// Offset of the `BI` operator.
        offset: usize,
    },

    /// A closing `]`, `>>` or `)` without its opening counterpart.
    #[error("unbalanced delimiter at byte {offset}")]
    Unbalanced {
        /// Offset of the offending delimiter.
        offset: usize,
    },
}

/// One string operand of a text-show operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    /// Bytes of the operand in the stream, delimiters included.
    pub span: Range<usize>,
    /// Unescaped string bytes.
    pub bytes: Vec<u8>,
}

/// A text-show operation and its string operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextShow {
    /// `Tj`, `'`, `"` or `TJ`.
    pub operator: String,
    /// String operands in stream order; `TJ` may carry several.
    pub runs: Vec<TextRun>,
}

/// Lists the text-show operations of a content stream in drawing order.
///
/// # Errors
///
/// Returns [`ContentScanError`] for unterminated strings or inline images and
/// for unbalanced delimiters.
pub fn text_shows(raw: &[u8]) -> Result<Vec<TextShow>, ContentScanError> {
    let mut scanner = Scanner::new(raw);
    let mut operands: Vec<Operand> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut shows = Vec::new();

    while let Some(token) = scanner.next_token()? {
        match token {
            Token::Str(run) => match frames.last_mut() {
                Some(Frame::Array(runs)) => runs.push(run),
                Some(Frame::Dict) => {}
                None => operands.push(Operand::Str(run)),
            },
            Token::ArrayStart => frames.push(Frame::Array(Vec::new())),
            Token::ArrayEnd(offset) => match frames.pop() {
                Some(Frame::Array(runs)) => {
                    if frames.is_empty() {
                        operands.push(Operand::Array(runs));
                    }
                }
                _ => return Err(ContentScanError::Unbalanced { offset }),
            },
            Token::DictStart => frames.push(Frame::Dict),
            Token::DictEnd(offset) => match frames.pop() {
                Some(Frame::Dict) => {
                    if frames.is_empty() {
                        operands.push(Operand::Other);
                    }
                }
                _ => return Err(ContentScanError::Unbalanced { offset }),
            },
            Token::Operand => {
                if frames.is_empty() {
                    operands.push(Operand::Other);
                }
            }
            Token::Keyword { word, offset } => {
                if !frames.is_empty() {
                    continue;
                }
                match word {
                    b"true" | b"false" | b"null" => operands.push(Operand::Other),
                    b"BI" => {
                        scanner.skip_inline_image(offset)?;
                        operands.clear();
                    }
                    operator => {
                        if let Some(show) = text_show(operator, operands.pop()) {
                            shows.push(show);
                        }
                        operands.clear();
                    }
                }
            }
        }
    }

    match frames.last() {
        Some(_) => Err(ContentScanError::Unbalanced { offset: raw.len() }),
        None => Ok(shows),
    }
}

/// Copies `raw`, writing `replacement` over each span.
///
/// Spans must be ascending and disjoint, as [`text_shows`] reports them.
#[must_use]
pub fn replace_spans(raw: &[u8], spans: &[Range<usize>], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut cursor = 0;
    for span in spans {
        out.extend_from_slice(&raw[cursor..span.start]);
        out.extend_from_slice(replacement);
        cursor = span.end;
    }
    out.extend_from_slice(&raw[cursor..]);
    out
}

fn text_show(operator: &[u8], last: Option<Operand>) -> Option<TextShow> {
    let runs = match (operator, last?) {
        (b"Tj" | b"'" | b"\"", Operand::Str(run)) => vec![run],
        (b"TJ", Operand::Array(runs)) => runs,
        _ => return None,
    };
    Some(TextShow {
        operator: String::from_utf8_lossy(operator).into_owned(),
        runs,
    })
}

enum Operand {
    Str(TextRun),
    Array(Vec<TextRun>),
    Other,
}

enum Frame {
    Array(Vec<TextRun>),
    Dict,
}

enum Token<'a> {
    Str(TextRun),
    ArrayStart,
    ArrayEnd(usize),
    DictStart,
    DictEnd(usize),
    /// Name or number.
    Operand,
    Keyword {
        word: &'a [u8],
        offset: usize,
    },
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(byte) = self.peek() {
                    if byte == b'\r' || byte == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn regular_run(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ContentScanError> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let Some(byte) = self.peek() else {
            return Ok(None);
        };

        let token = match byte {
            b'(' => Token::Str(self.literal_string()?),
            b'<' if self.bytes.get(start + 1) == Some(&b'<') => {
                self.pos += 2;
                Token::DictStart
            }
            b'<' => Token::Str(self.hex_string()?),
            b'>' if self.bytes.get(start + 1) == Some(&b'>') => {
                self.pos += 2;
                Token::DictEnd(start)
            }
            b'>' | b')' => return Err(ContentScanError::Unbalanced { offset: start }),
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd(start)
            }
            b'{' | b'}' => {
                self.pos += 1;
                Token::Operand
            }
            b'/' => {
                self.pos += 1;
                self.regular_run();
                Token::Operand
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => {
                self.regular_run();
                Token::Operand
            }
            _ => Token::Keyword {
                word: self.regular_run(),
                offset: start,
            },
        };
        Ok(Some(token))
    }

    fn literal_string(&mut self) -> Result<TextRun, ContentScanError> {
        let start = self.pos;
        self.pos += 1;
        let mut depth = 1usize;
        let mut bytes = Vec::new();

        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'\\' => self.escape(&mut bytes),
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(TextRun {
                            span: start..self.pos,
                            bytes,
                        });
                    }
                    bytes.push(byte);
                }
                _ => bytes.push(byte),
            }
        }
        Err(ContentScanError::UnterminatedString { offset: start })
    }

    fn escape(&mut self, bytes: &mut Vec<u8>) {
        let Some(byte) = self.peek() else {
            return;
        };
        self.pos += 1;
        match byte {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(b'\x08'),
            b'f' => bytes.push(b'\x0C'),
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                // High-order overflow is ignored.
                let mut value = byte - b'0';
                for _ in 0..2 {
                    match self.peek() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value.wrapping_mul(8).wrapping_add(digit - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push(value);
            }
            other => bytes.push(other),
        }
    }

    fn hex_string(&mut self) -> Result<TextRun, ContentScanError> {
        let start = self.pos;
        self.pos += 1;
        let mut digits = Vec::new();

        while let Some(byte) = self.peek() {
            self.pos += 1;
            if byte == b'>' {
                if digits.len() % 2 == 1 {
                    digits.push(0);
                }
                let bytes = digits
                    .chunks_exact(2)
                    .map(|pair| (pair[0] << 4) | pair[1])
                    .collect();
                return Ok(TextRun {
                    span: start..self.pos,
                    bytes,
                });
            }
            if let Some(digit) = hex_value(byte) {
                digits.push(digit);
            }
        }
        Err(ContentScanError::UnterminatedString { offset: start })
    }

    /// Moves past the image dictionary and data of an inline image.
    ///
    /// The data ends at the first `EI` preceded by whitespace and followed by
    /// whitespace, a delimiter or the end of the stream.
    fn skip_inline_image(&mut self, offset: usize) -> Result<(), ContentScanError> {
        let unterminated = ContentScanError::UnterminatedInlineImage { offset };
        loop {
            match self.next_token()? {
                Some(Token::Keyword { word: b"ID", .. }) => break,
                Some(_) => {}
                None => return Err(unterminated),
            }
        }
        if self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }

        let data_start = self.pos;
        let mut index = data_start;
        while index + 1 < self.bytes.len() {
            let at_end = &self.bytes[index..index + 2] == b"EI";
            let before = index == data_start || is_whitespace(self.bytes[index - 1]);
            let after = self
                .bytes
                .get(index + 2)
                .is_none_or(|&byte| !is_regular(byte));
            if at_end && before && after {
                self.pos = index + 2;
                return Ok(());
            }
            index += 1;
        }
        Err(unterminated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn runs_of(raw: &[u8]) -> Vec<(String, Vec<Vec<u8>>)> {
        text_shows(raw)
            .unwrap()
            .into_iter()
            .map(|show| {
                let bytes = show.runs.into_iter().map(|run| run.bytes).collect();
                (show.operator, bytes)
            })
            .collect()
    }

    #[test]
    fn test_text_shows_reports_every_operator() {
        let raw = b"BT /F1 8 Tf (a) Tj [(b) -120 (c)] TJ (d) ' 1 2 (e) \" ET";
        assert_eq!(
            runs_of(raw),
            vec![
                ("Tj".to_string(), vec![b"a".to_vec()]),
                ("TJ".to_string(), vec![b"b".to_vec(), b"c".to_vec()]),
                ("'".to_string(), vec![b"d".to_vec()]),
                ("\"".to_string(), vec![b"e".to_vec()]),
            ]
        );
    }

    #[test]
    fn test_spans_cover_the_delimited_operand() {
        let raw = b"BT (Seite 3) Tj <48 69> Tj ET";
        let shows = text_shows(raw).unwrap();
        assert_eq!(&raw[shows[0].runs[0].span.clone()], b"(Seite 3)");
        assert_eq!(&raw[shows[1].runs[0].span.clone()], b"<48 69>");
        assert_eq!(shows[1].runs[0].bytes, b"Hi".to_vec());
    }

    #[test]
    fn test_literal_string_escapes_and_nesting() {
        let raw = b"(a\\(b\\) (c) \\101\\\nd\\n) Tj";
        assert_eq!(runs_of(raw)[0].1, vec![b"a(b) (c) Ad\n".to_vec()]);
    }

    #[test]
    fn test_odd_hex_string_is_padded() {
        assert_eq!(runs_of(b"<414> Tj")[0].1, vec![vec![0x41, 0x40]]);
    }

    #[test]
    fn test_strings_outside_text_shows_are_ignored() {
        let raw = b"/Span << /ActualText (hidden) >> BDC (x) Tz EMC % (comment) Tj\n";
        assert!(runs_of(raw).is_empty());
    }

    #[test]
    fn test_inline_image_data_is_skipped() {
        let raw = b"q BI /W 1 /H 1 /BPC 8 /CS /G ID \x80() Tj EIx EI Q BT (Seite 3) Tj ET";
        assert_eq!(runs_of(raw), vec![("Tj".to_string(), vec![b"Seite 3".to_vec()])]);
    }

    #[test]
    fn test_inline_image_without_end_is_rejected() {
        let err = text_shows(b"q BI /W 1 ID \x80\x81").unwrap_err();
        assert_eq!(err, ContentScanError::UnterminatedInlineImage { offset: 2 });
    }

    #[test]
    fn test_unterminated_and_unbalanced_streams_are_rejected() {
        assert_eq!(
            text_shows(b"BT (open Tj").unwrap_err(),
            ContentScanError::UnterminatedString { offset: 3 }
        );
        assert_eq!(
            text_shows(b"1 0 0 1 0 0 cm ] Tj").unwrap_err(),
            ContentScanError::Unbalanced { offset: 15 }
        );
        assert!(text_shows(b"[(a) TJ").is_err());
    }

    #[test]
    fn test_replace_spans_copies_everything_else() {
        let raw = b"0.12345678 0 0 1 612.3456789 0 cm (x) Tj";
        let out = replace_spans(raw, &[34..37], b"()");
        assert_eq!(out, b"0.12345678 0 0 1 612.3456789 0 cm () Tj".to_vec());
    }
}
