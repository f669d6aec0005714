//! CLI end-to-end tests
//!
//! Tests for the vidbatch command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the vidbatch binary
#[allow(deprecated)]
fn vidbatch_cmd() -> Command {
    Command::cargo_bin("vidbatch").unwrap()
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = vidbatch_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidbatch"))
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = vidbatch_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidbatch"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_rejects_unknown_subcommand() {
    let mut cmd = vidbatch_cmd();
    cmd.arg("convert")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_cli_invalid_port() {
    let mut cmd = vidbatch_cmd();
    cmd.args(["--port", "not-a-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn test_cli_missing_config_file() {
    let dir = tempdir().unwrap();
    let mut cmd = vidbatch_cmd();
    cmd.arg("--config")
        .arg(dir.path().join("missing.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_cli_invalid_config_value() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("vidbatch.toml");
    fs::write(&config, "[server]\nport = 0\n").unwrap();

    let mut cmd = vidbatch_cmd();
    cmd.arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("port cannot be 0"));
}

#[test]
fn test_cli_fails_without_ffmpeg() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("vidbatch.toml");
    fs::write(
        &config,
        format!(
            "[tools]\nffmpeg_path = \"{}\"\n",
            dir.path().join("no-such-ffmpeg").display()
        ),
    )
    .unwrap();

    let mut cmd = vidbatch_cmd();
    cmd.arg("--config")
        .arg(&config)
        .env("RUST_LOG", "off")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ffmpeg is required"));
}
