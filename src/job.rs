//! Job report header
//!
//! The export opens with a fixed-offset block describing the job itself
//! (company, print timestamp, job code, ...) before the first device
//! record. The record parser never looks at it; it is extracted once
//! from the leading region the classifier skipped, and a caller that
//! already has these fields can skip the extraction entirely.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{ParseError, ParseErrorKind};
use crate::filter::{LineFilter, SourceLine};

/// Print timestamp format: `Printed on 05/03/2021  at  09:15:42`
const PRINT_TIMESTAMP_FORMAT: &str = "Printed on %d/%m/%Y  at  %H:%M:%S";
/// Job creation timestamp format: `04/03/2021 17:22`
const CREATED_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";
/// Job load timestamp format: `04 Mar 2021 17:25`
const LOADED_TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M";

// Comma-split offsets into the job description line. Unlike device
// headers, these count every field — empty padding included.
const JOB_CODE_FIELD: usize = 3;
const DESCRIPTION_FIELD: usize = 10;
const CREATED_FIELD: usize = 37;
const LOADED_FIELD: usize = 47;
const CLIENT_FIELD: usize = 67;

/// Job-level fields read once from the header region of the export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobHeader {
    pub company: String,
    pub print_timestamp: NaiveDateTime,
    pub job_code: String,
    pub description: String,
    pub created: NaiveDateTime,
    pub loaded: NaiveDateTime,
    pub client: String,
}

impl JobHeader {
    /// Extract the job header from the leading region of the export.
    ///
    /// `leading` is the block the classifier skipped unconditionally;
    /// noise lines within it (the opening banner, separator rows) are
    /// dropped with the same classification before the fixed offsets
    /// apply: line 0 carries the company, line 1 the print timestamp,
    /// line 2 is discarded, line 3 the job fields.
    pub fn parse(leading: &[SourceLine], filter: &LineFilter) -> Result<JobHeader, ParseError> {
        let lines: Vec<&SourceLine> = leading.iter().filter(|l| !filter.is_noise(&l.text)).collect();
        if lines.len() < 4 {
            return Err(ParseError::new(
                ParseErrorKind::MalformedJobHeader,
                format!("job header region has {} usable lines, expected at least 4", lines.len()),
            ));
        }

        let company = parse_company(lines[0])?;
        let print_timestamp = parse_print_timestamp(lines[1])?;
        // lines[2] is discarded without interpretation

        let job_line = lines[3];
        let fields: Vec<&str> = job_line.text.split(',').collect();
        if fields.len() <= CLIENT_FIELD {
            return Err(ParseError::new(
                ParseErrorKind::MalformedJobHeader,
                format!(
                    "job description line has {} fields, expected more than {}",
                    fields.len(),
                    CLIENT_FIELD,
                ),
            )
            .with_line(job_line.number));
        }

        Ok(JobHeader {
            company,
            print_timestamp,
            job_code: fields[JOB_CODE_FIELD].to_string(),
            description: fields[DESCRIPTION_FIELD].to_string(),
            created: parse_job_timestamp(fields[CREATED_FIELD], CREATED_TIMESTAMP_FORMAT, job_line)?,
            loaded: parse_job_timestamp(fields[LOADED_FIELD], LOADED_TIMESTAMP_FORMAT, job_line)?,
            client: fields[CLIENT_FIELD].to_string(),
        })
    }
}

fn parse_company(line: &SourceLine) -> Result<String, ParseError> {
    let field = line.text.split(',').find(|f| !f.is_empty()).ok_or_else(|| {
        ParseError::new(ParseErrorKind::MalformedJobHeader, "company line is empty")
            .with_line(line.number)
    })?;
    let (_, company) = field.split_once(" : ").ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MalformedJobHeader,
            format!("company field {:?} has no \" : \" separator", field),
        )
        .with_line(line.number)
    })?;
    Ok(company.trim().to_string())
}

fn parse_print_timestamp(line: &SourceLine) -> Result<NaiveDateTime, ParseError> {
    let fields: Vec<&str> = line.text.split(',').filter(|f| !f.is_empty()).collect();
    if fields.len() < 2 {
        return Err(ParseError::new(
            ParseErrorKind::MalformedJobHeader,
            format!("print-timestamp line has {} fields, expected at least 2", fields.len()),
        )
        .with_line(line.number));
    }
    parse_job_timestamp(fields[1], PRINT_TIMESTAMP_FORMAT, line)
}

fn parse_job_timestamp(field: &str, format: &str, line: &SourceLine) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(field, format).map_err(|e| {
        ParseError::new(
            ParseErrorKind::MalformedJobHeader,
            format!("timestamp {:?} does not match {:?}: {}", field, format, e),
        )
        .with_line(line.number)
    })
}
