//! CLI entrypoint for the gearadm job server administration tool.
//!
//! The binary delegates to [`gearadm_cli::run`], which loads configuration,
//! parses the requested command, queries every configured job server, and
//! renders the per-server results.

use std::io::{self, IsTerminal, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdout_is_terminal = io::stdout().is_terminal();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    gearadm_cli::run(
        std::env::args_os(),
        &mut stdout,
        &mut stderr,
        stdout_is_terminal,
    )
}
