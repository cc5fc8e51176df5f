//! Sequential configuration stream with an explicit resumable cursor.
//!
//! The configuration text is one shared stream read section by section and
//! controller by controller. Each parser receives the stream together with a
//! [`Cursor`], reads its own block, and leaves the cursor immediately after the
//! last token it consumed so the next parser (possibly of a different kind)
//! starts exactly there.
//!
//! Tokens are separated by ASCII whitespace. `#` starts a comment that runs to
//! the end of the line.

use cs_core::Id;

use crate::error::{ControlError, ControlResult};

/// Byte offset into a [`ConfigStream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(usize);

impl Cursor {
    /// Position at the beginning of a stream.
    pub const START: Cursor = Cursor(0);

    /// Create a cursor at a byte offset.
    pub fn at(offset: usize) -> Self {
        Self(offset)
    }

    /// Get the byte offset.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// Owned configuration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStream {
    text: String,
}

impl ConfigStream {
    /// Create a stream from configuration text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Full text of the stream.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True if the stream holds no text at all.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// 1-based line number of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        let end = offset.min(self.text.len());
        self.text.as_bytes()[..end]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }

    /// Create a reader positioned at `cursor`.
    pub fn reader(&self, cursor: Cursor) -> BlockReader<'_> {
        BlockReader {
            stream: self,
            pos: cursor.offset().min(self.text.len()),
        }
    }

    /// Run `f` over a reader starting at `cursor`, then write the reader's final
    /// position back into `cursor`.
    ///
    /// On success the cursor ends just past the block. On failure it is left at
    /// the offending token, never beyond it.
    pub fn read_block<T>(
        &self,
        cursor: &mut Cursor,
        f: impl FnOnce(&mut BlockReader<'_>) -> ControlResult<T>,
    ) -> ControlResult<T> {
        let mut reader = self.reader(*cursor);
        let result = f(&mut reader);
        *cursor = reader.cursor();
        result
    }

    /// True if only whitespace and comments remain after `cursor`.
    pub fn is_exhausted(&self, cursor: Cursor) -> bool {
        let reader = self.reader(cursor);
        reader.skip_trivia(reader.pos) >= self.text.len()
    }

    /// Build a format error located at `offset`.
    pub fn format_error(&self, offset: usize, what: impl Into<String>) -> ControlError {
        ControlError::ConfigFormat {
            offset,
            line: self.line_of(offset),
            what: what.into(),
        }
    }
}

/// Token reader over a [`ConfigStream`].
#[derive(Debug, Clone)]
pub struct BlockReader<'a> {
    stream: &'a ConfigStream,
    pos: usize,
}

impl<'a> BlockReader<'a> {
    /// Current position.
    pub fn cursor(&self) -> Cursor {
        Cursor(self.pos)
    }

    /// The underlying stream.
    pub fn stream(&self) -> &'a ConfigStream {
        self.stream
    }

    /// Offset where the next token starts (after skipping whitespace/comments).
    pub fn next_token_offset(&self) -> usize {
        self.skip_trivia(self.pos)
    }

    fn skip_trivia(&self, mut at: usize) -> usize {
        let bytes = self.stream.text.as_bytes();
        while at < bytes.len() {
            match bytes[at] {
                b' ' | b'\t' | b'\n' | b'\r' => at += 1,
                b'#' => {
                    while at < bytes.len() && bytes[at] != b'\n' {
                        at += 1;
                    }
                }
                _ => break,
            }
        }
        at
    }

    fn token_span(&self) -> Option<(usize, usize)> {
        let bytes = self.stream.text.as_bytes();
        let start = self.skip_trivia(self.pos);
        if start >= bytes.len() {
            return None;
        }
        let mut end = start;
        while end < bytes.len() && !matches!(bytes[end], b' ' | b'\t' | b'\n' | b'\r' | b'#') {
            end += 1;
        }
        Some((start, end))
    }

    /// Look at the next token without consuming it.
    pub fn peek(&self) -> Option<&'a str> {
        let stream: &'a ConfigStream = self.stream;
        self.token_span().map(|(start, end)| &stream.text[start..end])
    }

    /// Build a format error at `offset`.
    pub fn error_at(&self, offset: usize, what: impl Into<String>) -> ControlError {
        self.stream.format_error(offset, what)
    }

    /// Consume the next token. `what` names the expected item for diagnostics.
    ///
    /// At end of stream the reader moves to the end and fails.
    pub fn token(&mut self, what: &str) -> ControlResult<&'a str> {
        let stream: &'a ConfigStream = self.stream;
        match self.token_span() {
            Some((start, end)) => {
                self.pos = end;
                Ok(&stream.text[start..end])
            }
            None => {
                self.pos = stream.text.len();
                Err(self.error_at(
                    self.pos,
                    format!("unexpected end of configuration, expected {what}"),
                ))
            }
        }
    }

    /// Parse the next token with `parse`, leaving the reader on the token if it
    /// is rejected.
    pub fn parse_with<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> ControlResult<T> {
        let start = self.next_token_offset();
        let token = self.token(what)?;
        match parse(token) {
            Some(value) => Ok(value),
            None => {
                self.pos = start;
                Err(self.error_at(start, format!("expected {what}, found '{token}'")))
            }
        }
    }

    /// Consume an exact keyword.
    pub fn keyword(&mut self, expected: &str) -> ControlResult<()> {
        self.parse_with(&format!("keyword '{expected}'"), |t| {
            (t == expected).then_some(())
        })
    }

    /// Consume a bare word.
    pub fn word(&mut self, what: &str) -> ControlResult<&'a str> {
        self.token(what)
    }

    /// Consume a finite real number.
    pub fn real(&mut self, what: &str) -> ControlResult<f64> {
        self.parse_with(what, |t| t.parse::<f64>().ok().filter(|v| v.is_finite()))
    }

    /// Consume a non-negative integer count.
    pub fn count(&mut self, what: &str) -> ControlResult<usize> {
        self.parse_with(what, |t| t.parse::<usize>().ok())
    }

    /// Consume a positive integer.
    pub fn positive_count(&mut self, what: &str) -> ControlResult<usize> {
        self.parse_with(what, |t| t.parse::<usize>().ok().filter(|n| *n > 0))
    }

    /// Consume a 1-based object identifier.
    pub fn id(&mut self, what: &'static str) -> ControlResult<Id> {
        self.parse_with(what, |t| {
            t.parse::<i64>()
                .ok()
                .and_then(|n| Id::from_number(n, what).ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tokens_and_skips_comments() {
        let stream = ConfigStream::new("  alpha # comment 99\n 2.5\t7 # tail");
        let mut reader = stream.reader(Cursor::START);
        reader.keyword("alpha").unwrap();
        assert_eq!(reader.real("value").unwrap(), 2.5);
        assert_eq!(reader.count("count").unwrap(), 7);
        assert!(reader.peek().is_none());
        assert!(stream.is_exhausted(reader.cursor()));
    }

    #[test]
    fn cursor_stops_right_after_last_token() {
        let stream = ConfigStream::new("one two   three");
        let mut cursor = Cursor::START;
        stream
            .read_block(&mut cursor, |r| {
                r.keyword("one")?;
                r.keyword("two")
            })
            .unwrap();
        assert_eq!(cursor.offset(), 7);
        assert_eq!(&stream.as_str()[cursor.offset()..], "   three");
    }

    #[test]
    fn failure_leaves_cursor_at_offending_token() {
        let stream = ConfigStream::new("1.0\n  oops 3.0");
        let mut cursor = Cursor::START;
        let err = stream
            .read_block(&mut cursor, |r| {
                r.real("first")?;
                r.real("second")
            })
            .unwrap_err();
        assert_eq!(cursor.offset(), 6);
        match err {
            ControlError::ConfigFormat { offset, line, what } => {
                assert_eq!(offset, 6);
                assert_eq!(line, 2);
                assert!(what.contains("oops"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn end_of_stream_is_a_format_error() {
        let stream = ConfigStream::new("table 1 # nothing else\n");
        let mut reader = stream.reader(Cursor::START);
        reader.keyword("table").unwrap();
        reader.count("axes").unwrap();
        let err = reader.real("breakpoint").unwrap_err();
        assert!(matches!(err, ControlError::ConfigFormat { .. }));
        assert_eq!(reader.cursor().offset(), stream.len());
    }

    #[test]
    fn rejects_non_finite_and_bad_ids() {
        let stream = ConfigStream::new("inf NaN 0 -2 3");
        let mut reader = stream.reader(Cursor::START);
        assert!(reader.real("gain").is_err());
        reader.token("skip").unwrap();
        assert!(reader.real("gain").is_err());
        reader.token("skip").unwrap();
        assert!(reader.id("sensor").is_err());
        reader.token("skip").unwrap();
        assert!(reader.id("sensor").is_err());
        reader.token("skip").unwrap();
        assert_eq!(reader.id("sensor").unwrap().number(), 3);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let stream = ConfigStream::new("a\nb\nc");
        assert_eq!(stream.line_of(0), 1);
        assert_eq!(stream.line_of(2), 2);
        assert_eq!(stream.line_of(4), 3);
    }
}
