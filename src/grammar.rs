//! Export grammar configuration
//!
//! Every sentinel literal and skip count in the report format is a
//! format-version knob, not a hidden constant: exports from different
//! tester firmware revisions move the header block, reshuffle the
//! caption row and rename test labels. The defaults below describe the
//! reference export.

/// Banner marker of the reference export (matched by substring)
pub const BANNER_MARKER: &str = "Job Report,,,,,,,,,,,,,,,,,,";

/// Column-caption row of the reference export (matched by prefix)
pub const CAPTION_ROW: &str = ",,,,,BarCode,,,,,,,,Test Date,,,,,,,,,,,,Scan Date,,,,,,Case,,,,,,,,,User,,,,,,,,,,Result,,,,,,,Mode,,,,,,,,,,Dept,,,,,";

/// Blank separator rows are a long run of consecutive delimiters with no
/// content. Kept as a regex pattern so the run length stays adjustable.
pub const BLANK_SEPARATOR_PATTERN: &str = "^,{72}";

/// Tag embedded in every valid barcode of the reference export
pub const DEVICE_TAG: &str = "BTS";

/// Test-kind labels that open a sub-block in the reference grammar
pub const TEST_KIND_LABELS: &[&str] = &["Contin", "Insulation"];

/// Physical lines of the initial file header block (the job header
/// region) in the reference export
pub const LEADING_SKIP: usize = 12;

/// Lines dropped after each repeated per-page banner
pub const BANNER_PAGE_LINES: usize = 10;

/// The structural grammar of one export revision.
///
/// [`Default`] is the reference grammar; callers with a different export
/// configuration override individual fields:
///
/// ```
/// use soca_pat::Grammar;
///
/// let grammar = Grammar {
///     leading_skip: 8,
///     ..Default::default()
/// };
/// assert_eq!(grammar.device_tag, "BTS");
/// ```
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Physical lines dropped unconditionally before classification begins
    pub leading_skip: usize,
    /// Literal marking the repeated per-page report banner (substring match)
    pub banner_marker: String,
    /// Lines dropped after every banner occurrence except the first
    pub banner_page_lines: usize,
    /// Regex matching lexical blank-separator rows
    pub blank_separator: String,
    /// Prefix identifying the fixed column-caption row
    pub caption_row: String,
    /// Literal identifying a device header line (substring match)
    pub device_tag: String,
    /// Labels that open a test sub-block
    pub test_kinds: Vec<String>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            leading_skip: LEADING_SKIP,
            banner_marker: BANNER_MARKER.to_string(),
            banner_page_lines: BANNER_PAGE_LINES,
            blank_separator: BLANK_SEPARATOR_PATTERN.to_string(),
            caption_row: CAPTION_ROW.to_string(),
            device_tag: DEVICE_TAG.to_string(),
            test_kinds: TEST_KIND_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Grammar {
    /// Whether `label` opens a test sub-block under this grammar.
    pub fn is_test_kind(&self, label: &str) -> bool {
        self.test_kinds.iter().any(|k| k == label)
    }
}
