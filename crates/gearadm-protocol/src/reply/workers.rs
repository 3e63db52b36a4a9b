//! Grammar for `workers` replies.
//!
//! Each line reads `fd host token ...` where the third token decides the
//! session shape: `-` marks a client, `:` an unnamed worker whose remaining
//! tokens are functions, and anything else a worker name followed by a `:`
//! separator and the worker's functions.

use serde::Serialize;

use super::{LineError, LineErrorReason, Reply, data_lines};

const CLIENT_MARKER: &str = "-";
const FUNCTION_SEPARATOR: &str = ":";

/// Role of a connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// A session that can run jobs.
    Worker,
    /// A session that only submits jobs.
    Client,
}

/// One connected session reported by a job server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSession {
    /// Whether the session is a worker or a client.
    pub kind: SessionKind,
    /// Server-side file descriptor of the connection.
    pub file_descriptor: String,
    /// Peer address of the session.
    pub host: String,
    /// Worker identifier, when the worker declared one.
    pub name: Option<String>,
    /// Functions the worker registered; always empty for clients.
    pub functions: Vec<String>,
}

/// Parses a raw `workers` reply, preserving server order.
#[must_use]
pub fn parse_workers(raw: &str) -> Reply<WorkerSession> {
    let mut reply = Reply::default();
    for (line_number, line) in data_lines(raw) {
        match parse_worker_line(line) {
            Ok(session) => reply.records.push(session),
            Err(reason) => reply.errors.push(LineError::new(line_number, line, reason)),
        }
    }
    reply
}

fn parse_worker_line(line: &str) -> Result<WorkerSession, LineErrorReason> {
    let mut tokens = line.split_whitespace();
    let (Some(file_descriptor), Some(host), Some(shape)) =
        (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(LineErrorReason::TooFewFields {
            found: line.split_whitespace().count(),
        });
    };

    let (kind, name) = match shape {
        CLIENT_MARKER => {
            return Ok(WorkerSession {
                kind: SessionKind::Client,
                file_descriptor: file_descriptor.to_owned(),
                host: host.to_owned(),
                name: None,
                functions: Vec::new(),
            });
        }
        FUNCTION_SEPARATOR => (SessionKind::Worker, None),
        name => {
            if tokens.next() != Some(FUNCTION_SEPARATOR) {
                return Err(LineErrorReason::MissingSeparator {
                    name: name.to_owned(),
                });
            }
            (SessionKind::Worker, Some(name.to_owned()))
        }
    };

    Ok(WorkerSession {
        kind,
        file_descriptor: file_descriptor.to_owned(),
        host: host.to_owned(),
        name,
        functions: tokens.map(str::to_owned).collect(),
    })
}
