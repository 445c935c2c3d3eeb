//! CLI integration tests
//!
//! Tests the itch-diag CLI using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn itch_diag() -> Command {
    Command::cargo_bin("itch-diag")
        .expect("Failed to locate itch-diag binary - ensure it's built before running tests")
}

/// Command isolated from the user's real config and itch folders
fn isolated(home: &Path) -> Command {
    let mut cmd = itch_diag();
    cmd.env("XDG_CONFIG_HOME", home)
        .env("HOME", home)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    itch_diag()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("itch-diag"))
        .stdout(predicate::str::contains("butler"));
}

#[test]
fn test_cli_version() {
    itch_diag()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("itch-diag"));
}

#[test]
fn test_cli_probe_help() {
    itch_diag()
        .args(["probe", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--transport"))
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn test_cli_config_help() {
    itch_diag()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_cli_invalid_command() {
    itch_diag()
        .arg("invalid-command-that-does-not-exist")
        .assert()
        .failure();
}

#[test]
fn test_cli_invalid_transport() {
    itch_diag()
        .args(["probe", "--transport", "carrier-pigeon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected tcp or http"));
}

#[test]
fn test_config_path_honours_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");

    isolated(dir.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_show_and_get() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf").join("config.toml");

    isolated(dir.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    isolated(dir.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("handshake_timeout"));

    isolated(dir.path())
        .args(["config", "get", "probe.handshake_timeout", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("5"));

    // A second init without --force refuses and fails
    isolated(dir.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_get_unknown_key() {
    let dir = TempDir::new().unwrap();

    isolated(dir.path())
        .args(["config", "get", "probe.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Key not found"));
}

#[test]
fn test_paths_uses_app_data_override() {
    let dir = TempDir::new().unwrap();
    let app_data = dir.path().join("itch-data");

    isolated(dir.path())
        .arg("paths")
        .arg("--app-data")
        .arg(&app_data)
        .assert()
        .success()
        .stdout(predicate::str::contains("itch-data"))
        .stdout(predicate::str::contains("butler.db"))
        .stdout(predicate::str::contains("unresolved"));
}

#[test]
fn test_paths_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[paths]\nbutler_executable = \"/opt/custom/butler\"\n",
    )
    .unwrap();

    isolated(dir.path())
        .args(["paths", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("/opt/custom/butler"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();

    isolated(dir.path())
        .args(["paths", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_version_with_missing_butler_fails() {
    let dir = TempDir::new().unwrap();

    isolated(dir.path())
        .arg("version")
        .arg("--butler")
        .arg(dir.path().join("no-such-butler"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-butler"));
}

#[test]
fn test_probe_with_missing_database_never_starts() {
    let dir = TempDir::new().unwrap();

    isolated(dir.path())
        .arg("probe")
        .arg("--butler")
        .arg(dir.path().join("butler"))
        .arg("--db")
        .arg(dir.path().join("missing.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("checking preconditions"))
        .stdout(predicate::str::contains("daemon never started"));
}

#[cfg(unix)]
#[test]
fn test_probe_daemon_that_exits_early() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("butler.db");
    std::fs::write(&db, b"").unwrap();

    // `true` ignores its arguments and exits straight away
    isolated(dir.path())
        .args(["probe", "--timeout", "5", "--butler", "/bin/true", "--db"])
        .arg(&db)
        .assert()
        .failure()
        .stdout(predicate::str::contains("daemon never announced"));
}

#[test]
fn test_run_on_empty_app_data_reports_failures() {
    let dir = TempDir::new().unwrap();

    isolated(dir.path())
        .arg("--app-data")
        .arg(dir.path().join("itch"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Inspecting butler install"))
        .stderr(predicate::str::contains("check(s) failed"));
}
