//! Administrative commands understood by job servers.
//!
//! A command pairs the text written to the server with the parser applied
//! to its reply, so the cluster pipeline stays command agnostic.

use crate::reply::{Reply, StatusRow, WorkerSession, parse_status, parse_workers};

/// A read-only administrative command.
pub trait AdminCommand: 'static {
    /// Record type produced by the reply parser.
    type Record: Send + 'static;

    /// Command text sent to the server, without the line terminator.
    const NAME: &'static str;

    /// Parses a complete raw reply.
    fn parse(raw: &str) -> Reply<Self::Record>;
}

/// The `status` command: per-function queue and worker counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Status;

impl AdminCommand for Status {
    type Record = StatusRow;

    const NAME: &'static str = "status";

    fn parse(raw: &str) -> Reply<StatusRow> {
        parse_status(raw)
    }
}

/// The `workers` command: connected worker and client sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Workers;

impl AdminCommand for Workers {
    type Record = WorkerSession;

    const NAME: &'static str = "workers";

    fn parse(raw: &str) -> Reply<WorkerSession> {
        parse_workers(raw)
    }
}
