//! Line classifier / pre-filter
//!
//! Reduces the raw physical lines of an export to a clean stream: the
//! leading header block is dropped unconditionally, repeated page
//! banners drop themselves plus a fixed run of following lines, and
//! blank-separator and column-caption rows are dropped wherever they
//! appear. Lenient by design — if a sentinel never matches, lines simply
//! pass through and the parser downstream discards what it does not
//! recognize. No semantic validation happens here.

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};
use crate::grammar::Grammar;

/// One physical line with its 1-based position in the source file.
/// Positions survive filtering so parse errors can cite the real file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Output of the classifier
#[derive(Debug, Clone)]
pub struct FilteredLines {
    /// The unconditionally skipped leading block (the job header region)
    pub leading: Vec<SourceLine>,
    /// Retained lines, in source order
    pub lines: Vec<SourceLine>,
    /// Removed vs retained counts
    pub stats: FilterStats,
}

/// Classification counters for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub retained: usize,
    pub dropped: usize,
    /// Repeated page banners that triggered a skip run
    pub banner_pages: usize,
}

impl FilterStats {
    /// Format a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} lines retained, {} dropped ({} repeated page banners)",
            self.retained, self.dropped, self.banner_pages,
        )
    }
}

/// The classifier. Owns its grammar and the compiled separator pattern;
/// one filter can process many exports.
#[derive(Debug)]
pub struct LineFilter {
    grammar: Grammar,
    blank_separator: Regex,
}

impl LineFilter {
    pub fn new(grammar: &Grammar) -> Result<Self, ParseError> {
        let blank_separator = Regex::new(&grammar.blank_separator).map_err(|e| {
            ParseError::new(
                ParseErrorKind::Grammar,
                format!("bad blank-separator pattern {:?}: {}", grammar.blank_separator, e),
            )
        })?;
        Ok(Self {
            grammar: grammar.clone(),
            blank_separator,
        })
    }

    /// Whether a single line is droppable noise (banner, separator row or
    /// caption row). Skip-run bookkeeping is not part of this check; the
    /// job-header extractor uses it to clean the leading region.
    pub fn is_noise(&self, line: &str) -> bool {
        self.is_banner(line)
            || self.blank_separator.is_match(line)
            || (!self.grammar.caption_row.is_empty() && line.starts_with(&self.grammar.caption_row))
    }

    fn is_banner(&self, line: &str) -> bool {
        !self.grammar.banner_marker.is_empty() && line.contains(&self.grammar.banner_marker)
    }

    /// Classify the raw file content into a filtered line sequence.
    /// Handles LF and CRLF endings; the last line may lack a terminator.
    pub fn filter(&self, input: &str) -> FilteredLines {
        let mut leading = Vec::new();
        let mut lines = Vec::new();
        let mut stats = FilterStats::default();

        // Countdown of lines still to drop after a repeated page banner
        let mut skip = 0usize;
        // The first banner the classifier sees marks the report start and
        // triggers no skip; only later occurrences are page repeats.
        let mut seen_banner = false;

        for (i, text) in input.lines().enumerate() {
            let number = i + 1;

            if number <= self.grammar.leading_skip {
                leading.push(SourceLine { number, text: text.to_string() });
                stats.dropped += 1;
                continue;
            }
            if skip > 0 {
                skip -= 1;
                stats.dropped += 1;
                continue;
            }
            if self.is_banner(text) {
                if seen_banner {
                    skip = self.grammar.banner_page_lines;
                    stats.banner_pages += 1;
                }
                seen_banner = true;
                stats.dropped += 1;
                continue;
            }
            if self.blank_separator.is_match(text)
                || (!self.grammar.caption_row.is_empty() && text.starts_with(&self.grammar.caption_row))
            {
                stats.dropped += 1;
                continue;
            }

            lines.push(SourceLine { number, text: text.to_string() });
            stats.retained += 1;
        }

        FilteredLines { leading, lines, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{BANNER_MARKER, CAPTION_ROW};

    fn filter_with(grammar: Grammar) -> LineFilter {
        LineFilter::new(&grammar).unwrap()
    }

    fn body_grammar() -> Grammar {
        // No leading block, so every input line reaches classification
        Grammar { leading_skip: 0, ..Default::default() }
    }

    fn texts(filtered: &FilteredLines) -> Vec<&str> {
        filtered.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_leading_skip_collected_separately() {
        let grammar = Grammar { leading_skip: 2, ..Default::default() };
        let filtered = filter_with(grammar).filter("one\ntwo\nthree\n");
        assert_eq!(filtered.leading.len(), 2);
        assert_eq!(filtered.leading[0].text, "one");
        assert_eq!(texts(&filtered), vec!["three"]);
        assert_eq!(filtered.lines[0].number, 3);
        assert_eq!(filtered.stats.dropped, 2);
        assert_eq!(filtered.stats.retained, 1);
    }

    #[test]
    fn test_first_banner_triggers_no_skip() {
        let input = format!("{}\nkept\n", BANNER_MARKER);
        let filtered = filter_with(body_grammar()).filter(&input);
        assert_eq!(texts(&filtered), vec!["kept"]);
        assert_eq!(filtered.stats.banner_pages, 0);
    }

    #[test]
    fn test_repeated_banner_skips_page_block() {
        let mut input = format!("{}\nfirst\n{}\n", BANNER_MARKER, BANNER_MARKER);
        for i in 0..10 {
            input.push_str(&format!("page noise {}\n", i));
        }
        input.push_str("second\n");
        let filtered = filter_with(body_grammar()).filter(&input);
        assert_eq!(texts(&filtered), vec!["first", "second"]);
        assert_eq!(filtered.stats.banner_pages, 1);
    }

    #[test]
    fn test_separator_and_caption_dropped() {
        let separator = ",".repeat(80);
        let input = format!("{}\n{}\ndata line\n", separator, CAPTION_ROW);
        let filtered = filter_with(body_grammar()).filter(&input);
        assert_eq!(texts(&filtered), vec!["data line"]);
        assert_eq!(filtered.stats.dropped, 2);
    }

    #[test]
    fn test_short_comma_run_is_not_a_separator() {
        // 72 consecutive delimiters is the separator threshold
        let input = format!("{}\n", ",".repeat(20));
        let filtered = filter_with(body_grammar()).filter(&input);
        assert_eq!(filtered.lines.len(), 1);
    }

    #[test]
    fn test_lenient_passthrough_without_sentinels() {
        let input = "completely,unrelated,content\nanother line\n";
        let filtered = filter_with(body_grammar()).filter(input);
        assert_eq!(filtered.lines.len(), 2);
        assert_eq!(filtered.stats.dropped, 0);
    }

    #[test]
    fn test_crlf_endings_tolerated() {
        let filtered = filter_with(body_grammar()).filter("one\r\ntwo\r\n");
        assert_eq!(texts(&filtered), vec!["one", "two"]);
    }

    #[test]
    fn test_bad_separator_pattern_is_grammar_error() {
        let grammar = Grammar {
            blank_separator: "[unclosed".to_string(),
            ..Default::default()
        };
        let err = LineFilter::new(&grammar).unwrap_err();
        assert_eq!(err.kind, crate::error::ParseErrorKind::Grammar);
    }

    #[test]
    fn test_is_noise() {
        let filter = filter_with(Grammar::default());
        assert!(filter.is_noise(BANNER_MARKER));
        assert!(filter.is_noise(&",".repeat(72)));
        assert!(filter.is_noise(CAPTION_ROW));
        assert!(!filter.is_noise("BTS0042,14-05-21 Fri 09:30,..."));
    }
}
