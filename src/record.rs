//! Typed report records
//!
//! The data model for one parsed export: device records and their
//! measurement sub-blocks. Everything is materialized in a single parse
//! pass and never mutated afterwards — there is no update path, the
//! report is a flat snapshot.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Timestamp format of device header lines: `14-05-21 Fri 09:30`
pub const WEEKDAY_TIMESTAMP_FORMAT: &str = "%d-%m-%y %a %H:%M";

/// Tagged result outcome. The export permits values beyond PASS and
/// FAIL, so anything unrecognized is carried through as text rather
/// than collapsed into a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Pass,
    Fail,
    Other(String),
}

impl Outcome {
    pub fn from_field(field: &str) -> Self {
        match field {
            "PASS" => Outcome::Pass,
            "FAIL" => Outcome::Fail,
            other => Outcome::Other(other.to_string()),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail => write!(f, "FAIL"),
            Outcome::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Kind of measurement sub-block.
///
/// The set of labels that *open* a block lives in
/// [`Grammar::test_kinds`](crate::Grammar::test_kinds), not here: a
/// label beyond the two vendor defaults maps to `Other`, so extending
/// the export with a new test type is a configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TestKind {
    Continuity,
    Insulation,
    Other(String),
}

impl TestKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Contin" => TestKind::Continuity,
            "Insulation" => TestKind::Insulation,
            other => TestKind::Other(other.to_string()),
        }
    }

    /// The vendor spelling of this kind as it appears in the export.
    pub fn label(&self) -> &str {
        match self {
            TestKind::Continuity => "Contin",
            TestKind::Insulation => "Insulation",
            TestKind::Other(s) => s,
        }
    }
}

/// One measurement sub-block within a device record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestEntry {
    pub kind: TestKind,
    /// Free-text label from the opening line
    pub description: String,
    /// The scalar value reported on the opening line, preserved as text
    /// so non-numeric values survive without silent loss
    pub primary_value: String,
    /// `key : value` pairs in insertion order; keys are unique.
    /// Never empty for a well-formed entry — the opening line always
    /// carries at least one value.
    pub measurements: Vec<(String, f64)>,
    pub outcome: Outcome,
    /// Numeric limit associated with the test
    pub threshold: f64,
}

impl TestEntry {
    pub fn measurement(&self, key: &str) -> Option<f64> {
        self.measurements.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Look up a measurement by numeric position. Multi-result tests
    /// number their entries with zero-padded keys (`001`, `002`, ...).
    pub fn measurement_at(&self, index: usize) -> Option<f64> {
        self.measurement(&format!("{:03}", index))
    }

    pub fn is_pass(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// One tested appliance pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub barcode: String,
    pub test_timestamp: NaiveDateTime,
    pub scan_timestamp: NaiveDateTime,
    pub operator: String,
    pub overall_result: Outcome,
    pub mode: String,
    pub department: String,
    /// Test sub-blocks in order of appearance under this header
    pub tests: Vec<TestEntry>,
}

impl DeviceRecord {
    pub fn is_pass(&self) -> bool {
        self.overall_result.is_pass()
    }
}
