//! Parsers for administrative replies.
//!
//! Parsing never fails as a whole: lines that do not fit the grammar are
//! reported as [`LineError`]s next to the records that did parse.

mod status;
mod workers;

use serde::Serialize;
use thiserror::Error;

pub use status::{StatusRow, parse_status};
pub use workers::{SessionKind, WorkerSession, parse_workers};

/// Line that ends every administrative reply.
pub const TERMINATOR_LINE: &str = ".";

/// Structured records parsed from one reply, with any rejected lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply<T> {
    /// Records in the order the server reported them.
    pub records: Vec<T>,
    /// Lines that could not be parsed.
    pub errors: Vec<LineError>,
}

impl<T> Default for Reply<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> Reply<T> {
    /// Reports whether every data line parsed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A reply line rejected by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line_number}: {reason} in {line:?}")]
pub struct LineError {
    /// One-based position of the line in the reply.
    pub line_number: usize,
    /// The rejected line.
    pub line: String,
    /// Why the line was rejected.
    pub reason: LineErrorReason,
}

impl LineError {
    pub(crate) fn new(line_number: usize, line: &str, reason: LineErrorReason) -> Self {
        Self {
            line_number,
            line: line.to_owned(),
            reason,
        }
    }
}

/// Grammar violations detected in a reply line.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineErrorReason {
    /// A status line did not have exactly four fields.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Required field count.
        expected: usize,
        /// Fields present.
        found: usize,
    },
    /// A status count was not a non-negative integer.
    #[error("{field} count '{value}' is not a non-negative integer")]
    InvalidCount {
        /// Name of the offending column.
        field: &'static str,
        /// Text found in that column.
        value: String,
    },
    /// A workers line lacked the descriptor, host, or session token.
    #[error("expected at least 3 fields, found {found}")]
    TooFewFields {
        /// Fields present.
        found: usize,
    },
    /// A named worker was not followed by the `:` separator.
    #[error("expected ':' after worker name '{name}'")]
    MissingSeparator {
        /// The worker name preceding the missing separator.
        name: String,
    },
}

/// Yields `(line_number, line)` for data lines before the terminator.
///
/// Blank lines are skipped; everything after the terminator is ignored.
pub(crate) fn data_lines(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    raw.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .take_while(|(_, line)| *line != TERMINATOR_LINE)
        .filter(|(_, line)| !line.trim().is_empty())
}
