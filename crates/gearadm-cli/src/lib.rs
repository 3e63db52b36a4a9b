//! Command-line runtime for the gearadm job server administration tool.
//!
//! The module owns argument parsing, configuration bootstrapping, telemetry
//! installation, and rendering of per-server results. IO streams and the
//! configuration loader can be substituted so tests drive the runtime
//! in-process.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use gearadm_config::Config;
use gearadm_protocol::{ChannelOptions, Cluster, ClusterOptions, ClusterResult, ConnectPolicy};
use serde::Serialize;

mod cli;
mod config;
mod errors;
pub mod output;
mod telemetry;

use cli::{AdminAction, Cli};
use config::{prepare_cli_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
pub use output::{OutputFormat, ResolvedOutputFormat, TableRecord, render_cluster};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the fields of
/// `gearadm_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--servers",
    "--connect-attempts",
    "--connect-timeout-ms",
    "--response-timeout-ms",
    "--retry-delay-ms",
    "--log-filter",
    "--log-format",
];

/// Exit status when the call ran but at least one job server failed.
const PARTIAL_FAILURE_STATUS: u8 = 2;

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) fn new(stdout: &'a mut W, stderr: &'a mut E, stdout_is_terminal: bool) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }

    pub(crate) const fn stdout_is_terminal(&self) -> bool {
        self.stdout_is_terminal
    }
}

struct CliRunner<'a, 'io, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, W, E>,
    loader: &'a L,
}

impl<'a, 'io, W, E, L> CliRunner<'a, 'io, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(io: &'a mut IoStreams<'io, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let cli = match Cli::try_parse_from(prepare_cli_arguments(&args, &split)) {
            Ok(cli) => cli,
            Err(error) if !error.use_stderr() => {
                // Help and version requests are successful output.
                let _ = write!(self.io.stdout, "{error}");
                return ExitCode::SUCCESS;
            }
            Err(error) => return self.fail(&AppError::CliUsage(error)),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                build_cluster(&config)
            })
            .and_then(|cluster| {
                let format = cli.output.resolve(self.io.stdout_is_terminal());
                match cli.command {
                    AdminAction::Status => emit_result(&cluster.status(), format, self.io.stdout),
                    AdminAction::Workers => {
                        emit_result(&cluster.workers(), format, self.io.stdout)
                    }
                }
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(error) => self.fail(&error),
        }
    }

    fn fail(&mut self, error: &AppError) -> ExitCode {
        let _ = writeln!(self.io.stderr, "{error}");
        ExitCode::FAILURE
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E, stdout_is_terminal: bool) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr, stdout_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

fn build_cluster(config: &Config) -> Result<Cluster, AppError> {
    let cluster = Cluster::new(config.servers())?;
    let connect = ConnectPolicy::new(config.connect_attempts())?
        .with_connect_timeout(config.connect_timeout())
        .with_retry_delay(config.retry_delay());
    let channel = ChannelOptions::new(config.response_timeout());
    Ok(cluster.with_options(ClusterOptions { connect, channel }))
}

fn emit_result<T, W>(
    result: &ClusterResult<T>,
    format: ResolvedOutputFormat,
    stdout: &mut W,
) -> Result<ExitCode, AppError>
where
    T: Serialize + TableRecord,
    W: Write,
{
    match format {
        ResolvedOutputFormat::Human => stdout
            .write_all(render_cluster(result).as_bytes())
            .map_err(AppError::EmitResult)?,
        ResolvedOutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *stdout, result)
                .map_err(AppError::SerialiseResult)?;
            stdout.write_all(b"\n").map_err(AppError::EmitResult)?;
        }
    }
    stdout.flush().map_err(AppError::EmitResult)?;

    Ok(if result.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(PARTIAL_FAILURE_STATUS)
    })
}

#[cfg(test)]
mod tests;
