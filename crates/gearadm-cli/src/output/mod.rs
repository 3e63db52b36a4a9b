//! Rendering of cluster results.
//!
//! Human output prints one block per job server with an aligned table of
//! records, followed by any rejected reply lines. JSON output serialises the
//! whole result keyed by endpoint.

mod render;

use clap::ValueEnum;
use gearadm_protocol::{SessionKind, StatusRow, WorkerSession};

pub use render::render_cluster;

/// Output format selection for command results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Selects `human` for terminal output and `json` for redirected output.
    #[default]
    Auto,
    /// Always render aligned tables.
    Human,
    /// Always emit JSON.
    Json,
}

/// Output format after resolving `auto` based on TTY detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolvedOutputFormat {
    /// Aligned tables per job server.
    Human,
    /// A JSON object keyed by endpoint.
    Json,
}

impl OutputFormat {
    /// Resolves the output format based on whether stdout is a terminal.
    #[must_use]
    pub const fn resolve(self, stdout_is_terminal: bool) -> ResolvedOutputFormat {
        match self {
            Self::Auto => {
                if stdout_is_terminal {
                    ResolvedOutputFormat::Human
                } else {
                    ResolvedOutputFormat::Json
                }
            }
            Self::Human => ResolvedOutputFormat::Human,
            Self::Json => ResolvedOutputFormat::Json,
        }
    }
}

/// A record that renders as one row of a human-readable table.
pub trait TableRecord {
    /// Column headings.
    const COLUMNS: &'static [&'static str];
    /// Line printed when a server reports no records.
    const EMPTY: &'static str;

    /// Cell text, one entry per column.
    fn cells(&self) -> Vec<String>;
}

impl TableRecord for StatusRow {
    const COLUMNS: &'static [&'static str] = &["FUNCTION", "QUEUED", "RUNNING", "WORKERS"];
    const EMPTY: &'static str = "no functions registered";

    fn cells(&self) -> Vec<String> {
        vec![
            self.function.clone(),
            self.queued.to_string(),
            self.running.to_string(),
            self.workers.to_string(),
        ]
    }
}

impl TableRecord for WorkerSession {
    const COLUMNS: &'static [&'static str] = &["FD", "HOST", "KIND", "NAME", "FUNCTIONS"];
    const EMPTY: &'static str = "no sessions connected";

    fn cells(&self) -> Vec<String> {
        let kind = match self.kind {
            SessionKind::Worker => "worker",
            SessionKind::Client => "client",
        };
        vec![
            self.file_descriptor.clone(),
            self.host.clone(),
            String::from(kind),
            self.name.clone().unwrap_or_else(|| String::from("-")),
            self.functions.join(" "),
        ]
    }
}
