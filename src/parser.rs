//! Record/test parser
//!
//! A state machine over the filtered line stream with one line of
//! lookahead. The quote character is the only unambiguous terminator of
//! a measurement list — the export announces the line count nowhere, and
//! field counts are no signal because the terminating line carries both
//! the last measurement fragment and the footer of the block. The over-
//! read remainder is re-offered to the machine through an explicit
//! single-slot `pending` buffer.
//!
//! States:
//! - **SeekHeader** — advance until a line carries the device tag
//! - **ParseHeader** — seven positional fields, then one discarded
//!   per-device caption row
//! - **ProbeTest** — a recognized label opens a test block; anything
//!   else is pushed back as the next header candidate
//! - **ParseTestBlock** — quote-terminated measurement list plus footer
//!
//! Failures are per-record: a malformed header or test block drops that
//! record into the error list and parsing resumes at the next line
//! containing the device tag.

use chrono::NaiveDateTime;

use crate::error::{ParseError, ParseErrorKind};
use crate::filter::SourceLine;
use crate::grammar::Grammar;
use crate::record::{DeviceRecord, Outcome, TestEntry, TestKind, WEEKDAY_TIMESTAMP_FORMAT};

/// Separator between a measurement key and its value
const KEY_VALUE_SEPARATOR: &str = " : ";

/// Parsed records plus the recoverable errors hit along the way
#[derive(Debug)]
pub struct RecordSet {
    /// Device records in order of appearance
    pub records: Vec<DeviceRecord>,
    /// Per-record diagnostics; each names the line and, when known, the
    /// barcode of the record it cost
    pub errors: Vec<ParseError>,
}

impl RecordSet {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse every device record out of a filtered line stream.
pub fn parse_records(grammar: &Grammar, lines: &[SourceLine]) -> RecordSet {
    RecordParser::new(grammar, lines).parse()
}

/// The record/test state machine. One forward pass, no state shared
/// beyond the position and the single pending slot, so parsing the same
/// stream twice yields structurally equal output.
pub struct RecordParser<'a> {
    grammar: &'a Grammar,
    lines: &'a [SourceLine],
    pos: usize,
    /// Single-slot push-back buffer for over-read lines
    pending: Option<SourceLine>,
    errors: Vec<ParseError>,
}

impl<'a> RecordParser<'a> {
    pub fn new(grammar: &'a Grammar, lines: &'a [SourceLine]) -> Self {
        Self {
            grammar,
            lines,
            pos: 0,
            pending: None,
            errors: Vec::new(),
        }
    }

    /// Run the machine to end of stream.
    pub fn parse(mut self) -> RecordSet {
        let mut records = Vec::new();

        while let Some(line) = self.next_line() {
            if !line.text.contains(&self.grammar.device_tag) {
                continue;
            }
            match self.parse_device(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    self.errors.push(err);
                    // Drop anything over-read from the malformed block and
                    // resume seeking the next recognizable header.
                    self.pending = None;
                }
            }
        }

        RecordSet { records, errors: self.errors }
    }

    fn next_line(&mut self) -> Option<SourceLine> {
        if let Some(line) = self.pending.take() {
            return Some(line);
        }
        let line = self.lines.get(self.pos).cloned();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn push_back(&mut self, line: SourceLine) {
        debug_assert!(self.pending.is_none(), "push-back slot already occupied");
        self.pending = Some(line);
    }

    /// ParseHeader plus the device's test list.
    fn parse_device(&mut self, header: &SourceLine) -> Result<DeviceRecord, ParseError> {
        let mut record = parse_header(header)?;

        // The line after a header is a sub-caption row specific to this
        // device block; discard it without interpretation.
        if self.next_line().is_none() {
            self.errors.push(
                ParseError::new(
                    ParseErrorKind::Truncated,
                    "input ended immediately after a device header",
                )
                .with_line(header.number)
                .with_barcode(&record.barcode),
            );
            return Ok(record);
        }

        // ProbeTest: consume sub-blocks until the pattern breaks.
        while let Some(line) = self.next_line() {
            let opens_test = first_field(&line.text)
                .map_or(false, |field| self.grammar.is_test_kind(field));
            if !opens_test {
                // Next device's header candidate — re-offer it to SeekHeader
                self.push_back(line);
                break;
            }
            let test = self.parse_test_block(&line, &record.barcode)?;
            record.tests.push(test);
        }

        Ok(record)
    }

    /// ParseTestBlock: opening line through footer.
    fn parse_test_block(&mut self, opening: &SourceLine, barcode: &str) -> Result<TestEntry, ParseError> {
        let fields = non_empty_fields(&opening.text);
        if fields.len() < 4 {
            return Err(ParseError::new(
                ParseErrorKind::MalformedTestBlock,
                format!("expected at least 4 fields on a test opening line, found {}", fields.len()),
            )
            .with_line(opening.number)
            .with_barcode(barcode));
        }
        let kind = TestKind::from_label(fields[0]);
        let description = fields[1].to_string();
        let primary_value = fields[2].to_string();

        // The measurement list starts on the opening line: everything
        // after the third non-empty field, minus delimiter padding and
        // the opening quote.
        let tail = tail_after_field(&opening.text, 3).unwrap_or("");
        let tail = tail.trim_start_matches(',');
        let tail = tail.strip_prefix('"').unwrap_or(tail);

        // Accumulate raw fragments until the closing quote; the text
        // after it is the footer candidate for this block.
        let mut fragments: Vec<(String, usize)> = Vec::new();
        let footer = if let Some(at) = tail.find('"') {
            // The whole list sits on the opening line — terminate without
            // consuming another physical line.
            fragments.push((tail[..at].to_string(), opening.number));
            SourceLine { number: opening.number, text: tail[at + 1..].to_string() }
        } else {
            fragments.push((tail.to_string(), opening.number));
            loop {
                let line = self.next_line().ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::Truncated,
                        "input ended inside a measurement list (closing quote never seen)",
                    )
                    .with_line(opening.number)
                    .with_barcode(barcode)
                })?;
                match line.text.find('"') {
                    None => fragments.push((line.text, line.number)),
                    Some(at) => {
                        fragments.push((line.text[..at].to_string(), line.number));
                        break SourceLine { number: line.number, text: line.text[at + 1..].to_string() };
                    }
                }
            }
        };

        let mut measurements = Vec::with_capacity(fragments.len());
        for (fragment, number) in &fragments {
            let (key, value) = split_measurement(fragment).map_err(|message| {
                ParseError::new(ParseErrorKind::MalformedTestBlock, message)
                    .with_line(*number)
                    .with_barcode(barcode)
            })?;
            insert_measurement(&mut measurements, key, value);
        }

        // Footer: outcome then threshold. Anything further on the
        // remainder is not part of this block and is dropped.
        let footer_fields = non_empty_fields(&footer.text);
        if footer_fields.len() < 2 {
            return Err(ParseError::new(
                ParseErrorKind::MalformedTestBlock,
                format!(
                    "expected outcome and threshold after the closing quote, found {} fields",
                    footer_fields.len(),
                ),
            )
            .with_line(footer.number)
            .with_barcode(barcode));
        }
        let outcome = Outcome::from_field(footer_fields[0]);
        let threshold: f64 = footer_fields[1].trim().parse().map_err(|_| {
            ParseError::new(
                ParseErrorKind::MalformedTestBlock,
                format!("threshold {:?} is not numeric", footer_fields[1]),
            )
            .with_line(footer.number)
            .with_barcode(barcode)
        })?;

        Ok(TestEntry {
            kind,
            description,
            primary_value,
            measurements,
            outcome,
            threshold,
        })
    }
}

/// Map the seven positional header fields to a record. Fewer fields than
/// expected is a descriptive error, never an out-of-range access.
fn parse_header(line: &SourceLine) -> Result<DeviceRecord, ParseError> {
    let fields = non_empty_fields(&line.text);
    if fields.len() < 7 {
        return Err(ParseError::new(
            ParseErrorKind::MalformedHeader,
            format!("expected 7 header fields, found {}", fields.len()),
        )
        .with_line(line.number));
    }
    let barcode = fields[0].to_string();
    let test_timestamp =
        parse_timestamp(fields[1]).map_err(|e| e.with_line(line.number).with_barcode(&barcode))?;
    let scan_timestamp =
        parse_timestamp(fields[2]).map_err(|e| e.with_line(line.number).with_barcode(&barcode))?;
    Ok(DeviceRecord {
        barcode,
        test_timestamp,
        scan_timestamp,
        operator: fields[3].to_string(),
        overall_result: Outcome::from_field(fields[4]),
        mode: fields[5].to_string(),
        department: fields[6].to_string(),
        tests: Vec::new(),
    })
}

fn parse_timestamp(field: &str) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(field, WEEKDAY_TIMESTAMP_FORMAT).map_err(|e| {
        ParseError::new(
            ParseErrorKind::MalformedHeader,
            format!("timestamp {:?} does not match {:?}: {}", field, WEEKDAY_TIMESTAMP_FORMAT, e),
        )
    })
}

/// Non-empty comma-separated fields of a line. The export pads columns
/// with runs of empty fields; only the populated ones carry data.
fn non_empty_fields(line: &str) -> Vec<&str> {
    line.split(',').filter(|f| !f.is_empty()).collect()
}

fn first_field(line: &str) -> Option<&str> {
    line.split(',').find(|f| !f.is_empty())
}

/// The slice of `line` after the `n`th non-empty field and its trailing
/// delimiter, or `None` if the line has fewer populated fields.
fn tail_after_field(line: &str, n: usize) -> Option<&str> {
    let mut seen = 0;
    let mut offset = 0;
    for piece in line.split(',') {
        let end = offset + piece.len();
        if !piece.is_empty() {
            seen += 1;
            if seen == n {
                return Some(line.get(end + 1..).unwrap_or(""));
            }
        }
        offset = end + 1;
    }
    None
}

fn split_measurement(fragment: &str) -> Result<(String, f64), String> {
    let (key, value) = fragment.split_once(KEY_VALUE_SEPARATOR).ok_or_else(|| {
        format!("measurement line {:?} has no {:?} separator", fragment, KEY_VALUE_SEPARATOR)
    })?;
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("measurement value {:?} is not numeric", value))?;
    Ok((key.trim().to_string(), parsed))
}

/// Insert preserving insertion order; a duplicate key overwrites in place.
fn insert_measurement(measurements: &mut Vec<(String, f64)>, key: String, value: f64) {
    match measurements.iter().position(|(k, _)| *k == key) {
        Some(at) => measurements[at].1 = value,
        None => measurements.push((key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Helper: number raw lines 1..n as the classifier would
    fn lines(input: &[&str]) -> Vec<SourceLine> {
        input
            .iter()
            .enumerate()
            .map(|(i, text)| SourceLine { number: i + 1, text: text.to_string() })
            .collect()
    }

    const HEADER_1: &str = "BTS001,01-01-20 Wed 10:00,01-01-20 Wed 10:05,alice,PASS,AUTO,Elec";
    const HEADER_2: &str = "BTS002,01-01-20 Wed 11:00,01-01-20 Wed 11:02,bob,FAIL,MANUAL,Maint";
    const CAPTION: &str = ",,Test,,Description,,Value";

    #[test]
    fn test_minimal_device_without_tests() {
        let input = lines(&[HEADER_1, CAPTION, HEADER_2, CAPTION]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.is_clean());
        assert_eq!(set.records.len(), 2);
        assert!(set.records[0].tests.is_empty());
        assert_eq!(set.records[0].barcode, "BTS001");
        assert_eq!(set.records[0].overall_result, Outcome::Pass);
        assert_eq!(
            set.records[0].test_timestamp,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(10, 0, 0).unwrap(),
        );
        assert_eq!(set.records[1].overall_result, Outcome::Fail);
    }

    #[test]
    fn test_single_test_single_measurement_line() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,R1 : 0.15\"PASS,1.00",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.is_clean());
        assert_eq!(set.records.len(), 1);
        let test = &set.records[0].tests[0];
        assert_eq!(test.kind, TestKind::Continuity);
        assert_eq!(test.description, "Continuity Test");
        assert_eq!(test.primary_value, "0.15");
        assert_eq!(test.measurements, vec![("R1".to_string(), 0.15)]);
        assert_eq!(test.outcome, Outcome::Pass);
        assert_eq!(test.threshold, 1.0);
    }

    #[test]
    fn test_multi_line_measurement_list() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"R1 : 0.15",
            "R2 : 0.20",
            "R3 : 0.10\"PASS,1.00",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.is_clean());
        let test = &set.records[0].tests[0];
        assert_eq!(
            test.measurements,
            vec![
                ("R1".to_string(), 0.15),
                ("R2".to_string(), 0.20),
                ("R3".to_string(), 0.10),
            ],
        );
    }

    #[test]
    fn test_two_tests_then_next_device() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15",
            "002 : 0.25\"PASS,1.00",
            "Insulation,Insulation @500V,99.9,,\"001 : 99.9\"PASS,1.00",
            HEADER_2,
            CAPTION,
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.is_clean());
        assert_eq!(set.records.len(), 2);
        let tests = &set.records[0].tests;
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].kind, TestKind::Continuity);
        assert_eq!(tests[0].measurement_at(2), Some(0.25));
        assert_eq!(tests[1].kind, TestKind::Insulation);
        assert_eq!(tests[1].measurements, vec![("001".to_string(), 99.9)]);
        assert!(set.records[1].tests.is_empty());
    }

    #[test]
    fn test_unrecognized_probe_line_ends_test_list() {
        // An unrecognized first field is not an error — it is the normal
        // signal that the device's test list is over.
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Leakage,Earth Leakage,0.01,,\"001 : 0.01\"PASS,1.00",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.is_clean());
        assert_eq!(set.records.len(), 1);
        assert!(set.records[0].tests.is_empty());
    }

    #[test]
    fn test_extended_grammar_recognizes_new_kind() {
        let mut grammar = Grammar::default();
        grammar.test_kinds.push("Leakage".to_string());
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Leakage,Earth Leakage,0.01,,\"001 : 0.01\"PASS,1.00",
        ]);
        let set = parse_records(&grammar, &input);
        assert!(set.is_clean());
        let test = &set.records[0].tests[0];
        assert_eq!(test.kind, TestKind::Other("Leakage".to_string()));
    }

    #[test]
    fn test_duplicate_measurement_key_overwrites_in_place() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15",
            "002 : 0.25",
            "001 : 0.75\"PASS,1.00",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        let test = &set.records[0].tests[0];
        assert_eq!(
            test.measurements,
            vec![("001".to_string(), 0.75), ("002".to_string(), 0.25)],
        );
    }

    #[test]
    fn test_header_field_shortfall_is_recoverable() {
        let input = lines(&["BTS001,01-01-20 Wed 10:00,alice", HEADER_2, CAPTION]);
        let set = parse_records(&Grammar::default(), &input);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.records[0].barcode, "BTS002");
        assert_eq!(set.errors.len(), 1);
        assert_eq!(set.errors[0].kind, ParseErrorKind::MalformedHeader);
        assert_eq!(set.errors[0].line, Some(1));
    }

    #[test]
    fn test_bad_timestamp_carries_barcode() {
        let input = lines(&["BTS001,not a date,01-01-20 Wed 10:05,alice,PASS,AUTO,Elec"]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.records.is_empty());
        assert_eq!(set.errors[0].kind, ParseErrorKind::MalformedHeader);
        assert_eq!(set.errors[0].barcode.as_deref(), Some("BTS001"));
    }

    #[test]
    fn test_malformed_footer_resumes_at_next_header() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15\"PASS,not-a-number",
            HEADER_2,
            CAPTION,
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.records[0].barcode, "BTS002");
        assert_eq!(set.errors.len(), 1);
        assert_eq!(set.errors[0].kind, ParseErrorKind::MalformedTestBlock);
        assert_eq!(set.errors[0].barcode.as_deref(), Some("BTS001"));
    }

    #[test]
    fn test_measurement_without_separator_is_an_error() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15",
            "garbage line",
            "002 : 0.25\"PASS,1.00",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.records.is_empty());
        assert_eq!(set.errors[0].kind, ParseErrorKind::MalformedTestBlock);
        assert_eq!(set.errors[0].line, Some(4));
    }

    #[test]
    fn test_truncated_measurement_list() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15",
            "002 : 0.25",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        assert!(set.records.is_empty());
        assert_eq!(set.errors[0].kind, ParseErrorKind::Truncated);
        assert_eq!(set.errors[0].barcode.as_deref(), Some("BTS001"));
    }

    #[test]
    fn test_truncated_after_header_still_emits_record() {
        let input = lines(&[HEADER_1]);
        let set = parse_records(&Grammar::default(), &input);
        assert_eq!(set.records.len(), 1);
        assert!(set.records[0].tests.is_empty());
        assert_eq!(set.errors.len(), 1);
        assert_eq!(set.errors[0].kind, ParseErrorKind::Truncated);
    }

    #[test]
    fn test_idempotent_over_same_stream() {
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15",
            "002 : 0.25\"PASS,1.00",
            HEADER_2,
            CAPTION,
        ]);
        let grammar = Grammar::default();
        let first = parse_records(&grammar, &input);
        let second = parse_records(&grammar, &input);
        assert_eq!(first.records, second.records);
        assert_eq!(first.errors.len(), second.errors.len());
    }

    #[test]
    fn test_measurements_round_trip_to_source_lines() {
        let source = ["001 : 0.15", "002 : 0.25", "003 : 0.75"];
        let input = lines(&[
            HEADER_1,
            CAPTION,
            "Contin,Continuity Test,0.15,,\"001 : 0.15",
            "002 : 0.25",
            "003 : 0.75\"PASS,1.00",
        ]);
        let set = parse_records(&Grammar::default(), &input);
        let rejoined: Vec<String> = set.records[0].tests[0]
            .measurements
            .iter()
            .map(|(k, v)| format!("{} : {}", k, v))
            .collect();
        assert_eq!(rejoined, source);
    }

    #[test]
    fn test_tail_after_field() {
        assert_eq!(tail_after_field("a,b,c,d", 3), Some("d"));
        assert_eq!(tail_after_field("a,,b,,c,d,e", 3), Some("d,e"));
        assert_eq!(tail_after_field("a,b", 3), None);
        // Last field with no trailing delimiter
        assert_eq!(tail_after_field("a,b,c", 3), Some(""));
    }
}
