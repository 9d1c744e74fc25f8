//! soca-pat: structured parser for Soca PAT job report exports
//!
//! The Soca PAT (portable appliance test) tester exports a job report as
//! comma-delimited text that intermixes fixed header noise, repeating
//! per-device blocks and per-test sub-blocks whose final row is split by
//! an embedded quote character rather than a delimiter. This crate turns
//! that stream into typed device and test records.
//!
//! # Export structure
//!
//! ```text
//! Job Report,,,,,,,,,,,,,,,,,,                 page banner
//! ,,,Company : Acme Test & Tag Ltd,,           job header region
//! Page 1,Printed on 05/03/2021  at  09:15:42   (fixed offsets)
//! ...
//! ,,,,,BarCode,,,,,,,,Test Date,,...           column captions (dropped)
//! BTS0042,14-05-21 Fri 09:30,14-05-21 Fri 09:31,alice,PASS,AUTO,Elec
//! ,,Test,,Description,,Value                   per-device caption (discarded)
//! Contin,Continuity Test,0.15,,"001 : 0.15     test block opens a quoted,
//! 002 : 0.21                                   multi-line measurement list
//! 003 : 0.18"PASS,1.00                         quote splits list from footer
//! Insulation,Insulation @500V,99.9,,"001 : 99.9"PASS,1.00
//! BTS0043,...                                  next device
//! ```
//!
//! # Pipeline
//!
//! Two components, consumed in sequence, one-way data flow:
//!
//! | Stage | Type | Role |
//! |-------|------|------|
//! | classifier | [`LineFilter`] | drop banners, separator rows, captions; keep physical line numbers |
//! | parser | [`RecordParser`] | device headers plus quote-terminated test blocks, one line of push-back |
//!
//! [`PatJob::parse`] runs both, extracts the job header from the leading
//! region, and collects per-record recoverable errors instead of
//! aborting the job.
//!
//! Every sentinel literal and skip count is a knob on [`Grammar`]: the
//! export layout shifts between tester firmware revisions, so nothing
//! structural is hard-coded.
//!
//! ```
//! use soca_pat::{Grammar, PatJob};
//!
//! let grammar = Grammar { leading_skip: 0, ..Default::default() };
//! let export = "BTS001,01-01-20 Wed 10:00,01-01-20 Wed 10:05,alice,PASS,AUTO,Elec\n,,caption\n";
//! let job = PatJob::parse(&grammar, export).unwrap();
//! assert_eq!(job.records.len(), 1);
//! assert!(job.records[0].is_pass());
//! ```

mod error;
mod filter;
mod grammar;
mod job;
mod parser;
mod record;
mod report;

pub use error::{ParseError, ParseErrorKind};
pub use filter::{FilterStats, FilteredLines, LineFilter, SourceLine};
pub use grammar::Grammar;
pub use job::JobHeader;
pub use parser::{parse_records, RecordParser, RecordSet};
pub use record::{DeviceRecord, Outcome, TestEntry, TestKind, WEEKDAY_TIMESTAMP_FORMAT};
pub use report::PatJob;
