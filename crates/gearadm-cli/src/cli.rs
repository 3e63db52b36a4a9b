//! CLI argument definitions for the gearadm tool.

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Command-line interface for querying job servers.
#[derive(Parser, Debug)]
#[command(
    name = "gearadm",
    version,
    about = "Queries Gearman job servers for queue and worker status",
    disable_help_subcommand = true,
    after_help = "Configuration flags (--config-path, --servers, --connect-attempts, \
                  --connect-timeout-ms, --response-timeout-ms, --retry-delay-ms, \
                  --log-filter and --log-format) must precede the command."
)]
pub(crate) struct Cli {
    /// Controls how per-server results are rendered.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub(crate) output: OutputFormat,
    /// The administrative command to run on every job server.
    #[command(subcommand)]
    pub(crate) command: AdminAction,
}

/// Read-only administrative commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdminAction {
    /// Lists queued, running, and available workers per function.
    Status,
    /// Lists connected worker and client sessions.
    Workers,
}
