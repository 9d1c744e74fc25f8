//! Report assembly
//!
//! Ties the classifier, the job-header extraction and the record parser
//! together into one materialized snapshot of an export. Malformed
//! records and a malformed job header are demoted to diagnostics so one
//! broken block never loses the rest of the job; the only hard failures
//! are configuration-level (a grammar pattern that does not compile) and
//! I/O.

use std::path::Path;

use crate::error::ParseError;
use crate::filter::{FilterStats, LineFilter};
use crate::grammar::Grammar;
use crate::job::JobHeader;
use crate::parser::parse_records;
use crate::record::DeviceRecord;

/// A fully parsed job report export
#[derive(Debug)]
pub struct PatJob {
    /// Job-level fields, when the leading region parsed
    pub header: Option<JobHeader>,
    /// Device records in order of appearance
    pub records: Vec<DeviceRecord>,
    /// Recoverable diagnostics: per-record parse failures plus a
    /// job-header failure, if any
    pub errors: Vec<ParseError>,
    /// Classifier removed-vs-retained counts
    pub stats: FilterStats,
}

impl PatJob {
    /// Parse a whole export from text.
    pub fn parse(grammar: &Grammar, input: &str) -> Result<PatJob, ParseError> {
        let filter = LineFilter::new(grammar)?;
        let filtered = filter.filter(input);

        let mut errors = Vec::new();
        let header = match JobHeader::parse(&filtered.leading, &filter) {
            Ok(header) => Some(header),
            Err(err) => {
                errors.push(err);
                None
            }
        };

        let set = parse_records(grammar, &filtered.lines);
        errors.extend(set.errors);

        Ok(PatJob {
            header,
            records: set.records,
            errors,
            stats: filtered.stats,
        })
    }

    /// Read and parse an export file.
    pub fn from_path(grammar: &Grammar, path: impl AsRef<Path>) -> Result<PatJob, ParseError> {
        let input = std::fs::read_to_string(path)?;
        Self::parse(grammar, &input)
    }

    /// Whether the parse produced no diagnostics at all
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn passed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_pass()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.len() - self.passed_count()
    }

    pub fn all_passed(&self) -> bool {
        self.records.iter().all(|r| r.is_pass())
    }

    /// Format a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} records parsed ({} passed, {} failed), {} errors; {}",
            self.records.len(),
            self.passed_count(),
            self.failed_count(),
            self.errors.len(),
            self.stats.summary(),
        )
    }
}
