//! In-process tests for the CLI runtime against fake job servers.

use std::ffi::OsString;
use std::process::ExitCode;

use gearadm_config::Config;
use gearadm_protocol::test_support::{FakeJobServer, ServerScript, closed_endpoint};
use rstest::{fixture, rstest};

use super::*;

struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Captured result of one CLI invocation.
struct Invocation {
    exit_code: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(config: Config, args: &[&str], stdout_is_terminal: bool) -> Invocation {
    let mut stdout: Vec<u8> = Vec::new();
    let mut stderr: Vec<u8> = Vec::new();
    let loader = StaticConfigLoader::new(config);
    let arguments: Vec<OsString> = std::iter::once("gearadm")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect();
    let exit_code = {
        let mut io = IoStreams::new(&mut stdout, &mut stderr, stdout_is_terminal);
        run_with_loader(arguments, &mut io, &loader)
    };
    Invocation {
        exit_code,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

/// Configuration that gives up on unreachable servers quickly.
#[fixture]
fn fast_config() -> Config {
    Config {
        connect_attempts: 1,
        connect_timeout_ms: 500,
        response_timeout_ms: 1_000,
        ..Config::default()
    }
}

#[rstest]
fn status_renders_json_when_stdout_is_redirected(fast_config: Config) {
    let server = FakeJobServer::spawn(ServerScript::reply("reverse\t2\t1\t3\n.\n")).expect("spawn");
    let config = Config {
        servers: vec![server.endpoint()],
        ..fast_config
    };

    let invocation = invoke(config, &["status"], false);

    assert_eq!(invocation.exit_code, ExitCode::SUCCESS);
    let value: serde_json::Value =
        serde_json::from_str(&invocation.stdout).expect("stdout is JSON");
    assert_eq!(
        value[server.endpoint().as_str()]["ok"]["records"][0]["function"],
        "reverse"
    );
    assert_eq!(
        value[server.endpoint().as_str()]["ok"]["records"][0]["workers"],
        3
    );
}

#[rstest]
fn workers_renders_table_on_terminal(fast_config: Config) {
    let server = FakeJobServer::spawn(ServerScript::reply(
        "12 10.0.0.5 - \n9 10.0.0.6 w1 : sum avg\n.\n",
    ))
    .expect("spawn");
    let config = Config {
        servers: vec![server.endpoint()],
        ..fast_config
    };

    let invocation = invoke(config, &["workers"], true);

    assert_eq!(invocation.exit_code, ExitCode::SUCCESS);
    let lines: Vec<&str> = invocation.stdout.lines().collect();
    assert_eq!(lines.first().copied(), Some(server.endpoint().as_str()));
    assert!(lines.iter().any(|line| line.trim_start().starts_with("FD")));
    assert!(
        lines
            .iter()
            .any(|line| line.contains("client") && line.contains("10.0.0.5"))
    );
    assert!(
        lines
            .iter()
            .any(|line| line.contains("w1") && line.ends_with("sum avg"))
    );
}

#[rstest]
fn failing_server_yields_partial_failure_status(fast_config: Config) {
    let server = FakeJobServer::spawn(ServerScript::reply("foo 1 0 1\n.\n")).expect("spawn");
    let unreachable = closed_endpoint().expect("closed endpoint");
    let config = Config {
        servers: vec![unreachable.clone(), server.endpoint()],
        ..fast_config
    };

    let invocation = invoke(config, &["--output", "human", "status"], false);

    assert_eq!(
        invocation.exit_code,
        ExitCode::from(PARTIAL_FAILURE_STATUS)
    );
    assert!(invocation.stdout.contains(&unreachable));
    assert!(invocation.stdout.contains("error: unable to connect"));
    assert!(invocation.stdout.contains("FUNCTION"));
}

#[rstest]
fn output_flag_is_accepted_after_the_command(fast_config: Config) {
    let unreachable = closed_endpoint().expect("closed endpoint");
    let config = Config {
        servers: vec![unreachable.clone()],
        ..fast_config
    };

    let invocation = invoke(config, &["status", "--output", "json"], true);

    let value: serde_json::Value =
        serde_json::from_str(&invocation.stdout).expect("stdout is JSON");
    assert!(value[unreachable.as_str()]["error"].is_string());
}

#[rstest]
fn rejected_lines_are_shown_as_warnings(fast_config: Config) {
    let server =
        FakeJobServer::spawn(ServerScript::reply("foo 1 0 1\nbroken line\n.\n")).expect("spawn");
    let config = Config {
        servers: vec![server.endpoint()],
        ..fast_config
    };

    let invocation = invoke(config, &["--output", "human", "status"], false);

    assert_eq!(invocation.exit_code, ExitCode::SUCCESS);
    assert!(invocation.stdout.contains("warning: line 2"));
}

#[rstest]
fn empty_server_list_fails_before_any_query(fast_config: Config) {
    let invocation = invoke(fast_config, &["status"], false);

    assert_eq!(invocation.exit_code, ExitCode::FAILURE);
    assert!(invocation.stdout.is_empty());
    assert!(
        invocation
            .stderr
            .contains("at least one job server endpoint must be configured")
    );
}

#[rstest]
fn invalid_server_is_reported(fast_config: Config) {
    let config = Config {
        servers: vec![String::from("gearman1:notaport")],
        ..fast_config
    };

    let invocation = invoke(config, &["workers"], false);

    assert_eq!(invocation.exit_code, ExitCode::FAILURE);
    assert!(invocation.stderr.contains("gearman1:notaport"));
}

#[rstest]
fn zero_connect_attempts_are_rejected(fast_config: Config) {
    let config = Config {
        servers: vec![String::from("gearman1:4730")],
        connect_attempts: 0,
        ..fast_config
    };

    let invocation = invoke(config, &["status"], false);

    assert_eq!(invocation.exit_code, ExitCode::FAILURE);
    assert!(
        invocation
            .stderr
            .contains("connection attempts must be at least 1")
    );
}

#[rstest]
#[case::missing_command(&[])]
#[case::unknown_command(&["queues"])]
#[case::unknown_output(&["--output", "yaml", "status"])]
fn usage_errors_fail(fast_config: Config, #[case] args: &[&str]) {
    let invocation = invoke(fast_config, args, false);

    assert_eq!(invocation.exit_code, ExitCode::FAILURE);
    assert!(!invocation.stderr.is_empty());
}

#[rstest]
fn help_is_written_to_stdout(fast_config: Config) {
    let invocation = invoke(fast_config, &["--help"], false);

    assert_eq!(invocation.exit_code, ExitCode::SUCCESS);
    assert!(invocation.stdout.contains("status"));
    assert!(invocation.stdout.contains("workers"));
    assert!(invocation.stderr.is_empty());
}
