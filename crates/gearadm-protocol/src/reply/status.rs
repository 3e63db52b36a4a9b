//! Grammar for `status` replies.
//!
//! Each line reads `function queued running workers`, separated by runs of
//! whitespace (job servers emit tabs).

use std::collections::HashMap;

use serde::Serialize;

use super::{LineError, LineErrorReason, Reply, data_lines};

/// Queue depth and worker availability for one registered function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    /// Registered function name.
    pub function: String,
    /// Jobs queued for the function, including running ones.
    pub queued: u64,
    /// Jobs currently running.
    pub running: u64,
    /// Workers able to run the function.
    pub workers: u64,
}

/// Parses a raw `status` reply.
///
/// A function reported more than once keeps the position of its first row and
/// the counts of its last.
#[must_use]
pub fn parse_status(raw: &str) -> Reply<StatusRow> {
    let mut reply = Reply::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (line_number, line) in data_lines(raw) {
        match parse_status_line(line) {
            Ok(row) => match positions.get(&row.function) {
                Some(&position) => {
                    if let Some(slot) = reply.records.get_mut(position) {
                        *slot = row;
                    }
                }
                None => {
                    positions.insert(row.function.clone(), reply.records.len());
                    reply.records.push(row);
                }
            },
            Err(reason) => reply.errors.push(LineError::new(line_number, line, reason)),
        }
    }

    reply
}

fn parse_status_line(line: &str) -> Result<StatusRow, LineErrorReason> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [function, queued, running, workers] = fields.as_slice() else {
        return Err(LineErrorReason::FieldCount {
            expected: 4,
            found: fields.len(),
        });
    };
    Ok(StatusRow {
        function: (*function).to_owned(),
        queued: parse_count("queued", queued)?,
        running: parse_count("running", running)?,
        workers: parse_count("workers", workers)?,
    })
}

fn parse_count(field: &'static str, value: &str) -> Result<u64, LineErrorReason> {
    value
        .parse::<u64>()
        .map_err(|_| LineErrorReason::InvalidCount {
            field,
            value: value.to_owned(),
        })
}
