//! Parse errors
//!
//! Classifier-level issues (a sentinel line that never appears) are not
//! errors at all — filtering just degrades and the parser discards what
//! it does not recognize. Everything here comes from the record parser,
//! the job-header extractor, or the I/O boundary, and carries enough
//! context (physical line number, barcode when known) to be actionable.

use std::fmt;

/// The kind of parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A grammar pattern failed to compile
    Grammar,
    /// Device header line located but missing positional fields or
    /// carrying an unparsable timestamp
    MalformedHeader,
    /// The fixed-offset job header region did not match the expected layout
    MalformedJobHeader,
    /// A test sub-block broke the measurement-list or footer grammar
    MalformedTestBlock,
    /// End of input reached while a record or test block was incomplete
    Truncated,
    /// IO error reading the input
    Io,
}

/// A parse error with source-line and record context
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based physical line number in the source file, when known
    pub line: Option<usize>,
    /// Barcode of the device record being parsed, when known
    pub barcode: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            barcode: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Whether the error is per-record (the rest of the job parsed on)
    /// rather than a hard failure of the whole parse.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind, ParseErrorKind::Grammar | ParseErrorKind::Io)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        if let Some(ref barcode) = self.barcode {
            write!(f, "{}: ", barcode)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ParseErrorKind::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_context() {
        let err = ParseError::new(ParseErrorKind::MalformedHeader, "expected 7 header fields, found 3")
            .with_line(42)
            .with_barcode("BTS0042");
        assert_eq!(err.to_string(), "line 42: BTS0042: expected 7 header fields, found 3");
    }

    #[test]
    fn test_display_without_context() {
        let err = ParseError::new(ParseErrorKind::Io, "no such file");
        assert_eq!(err.to_string(), "no such file");
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(ParseError::new(ParseErrorKind::MalformedTestBlock, "x").is_recoverable());
        assert!(ParseError::new(ParseErrorKind::Truncated, "x").is_recoverable());
        assert!(!ParseError::new(ParseErrorKind::Io, "x").is_recoverable());
        assert!(!ParseError::new(ParseErrorKind::Grammar, "x").is_recoverable());
    }
}
