//! Integration tests for the `gearadm` binary entry point.
//!
//! Verifies configuration file loading, exit statuses, and user-facing error
//! handling when no job servers are configured.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use gearadm_protocol::test_support::{FakeJobServer, ServerScript, closed_endpoint};
use predicates::str::contains;
use tempfile::TempDir;

fn write_config(dir: &TempDir, servers: &[String]) -> anyhow::Result<String> {
    let quoted: Vec<String> = servers.iter().map(|server| format!("\"{server}\"")).collect();
    let path = dir.path().join("gearadm.toml");
    fs::write(
        &path,
        format!(
            "servers = [{}]\nconnect_attempts = 1\nconnect_timeout_ms = 500\n",
            quoted.join(", ")
        ),
    )?;
    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn missing_servers_exit_with_failure() {
    let mut command = cargo_bin_cmd!("gearadm");
    command.env_remove("GEARADM_SERVERS").arg("status");
    command
        .assert()
        .failure()
        .stderr(contains("at least one job server endpoint"));
}

#[test]
fn missing_command_exits_with_failure() {
    let mut command = cargo_bin_cmd!("gearadm");
    command.assert().failure();
}

#[test]
fn status_from_configured_server_succeeds() -> anyhow::Result<()> {
    let server = FakeJobServer::spawn(ServerScript::reply("reverse 0 0 1\n.\n"))?;
    let dir = TempDir::new()?;
    let config_path = write_config(&dir, &[server.endpoint()])?;

    let mut command = cargo_bin_cmd!("gearadm");
    command.args(["--config-path", config_path.as_str(), "--output", "json", "status"]);
    command
        .assert()
        .success()
        .stdout(contains("\"reverse\""));
    Ok(())
}

#[test]
fn unreachable_server_exits_with_partial_failure() -> anyhow::Result<()> {
    let unreachable = closed_endpoint()?;
    let dir = TempDir::new()?;
    let config_path = write_config(&dir, &[unreachable])?;

    let mut command = cargo_bin_cmd!("gearadm");
    command.args(["--config-path", config_path.as_str(), "--output", "json", "workers"]);
    command.assert().code(2).stdout(contains("\"error\""));
    Ok(())
}
