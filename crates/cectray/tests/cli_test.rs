//! Integration tests for the `cectray` CLI binary.
//!
//! Argument parsing, config and settings subcommands. None of these open an
//! adapter or a display.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command with config and settings pointed into `dir`.
fn cectray_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("cectray");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env("CECTRAY_CONFIG", dir.join("config.toml"))
        .env("CECTRAY_SETTINGS", dir.join("settings.toml"))
        .env_remove("RUST_LOG");
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = cectray_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in output:\n{stderr}");
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("HDMI-CEC")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("settings"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cectray"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_override() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());

    cectray_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("device_name = \"CEC Tray\"")
                .and(predicate::str::contains("poll_interval_ms = 100")),
        );
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "device_name = \"Mine\"\n").unwrap();

    let output = cectray_cmd(dir.path())
        .args(["config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));

    cectray_cmd(dir.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[monitor]\npoll_interval_ms = 0\n",
    )
    .unwrap();
    let output = cectray_cmd(dir.path())
        .args(["config", "show"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Settings ────────────────────────────────────────────────────────

#[test]
fn test_settings_list_shows_persistent_defaults() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path())
        .args(["settings", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("global_standby_screen")
                .and(predicate::str::contains("global_physical_address").not()),
        );

    cectray_cmd(dir.path())
        .args(["settings", "list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("global_physical_address"));
}

#[test]
fn test_settings_set_persists() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path())
        .args(["settings", "set", "standby-screen", "10m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("global_standby_screen = 10m"));

    let stored = std::fs::read_to_string(dir.path().join("settings.toml")).unwrap();
    assert!(stored.contains("global_standby_screen = \"10m\""));

    cectray_cmd(dir.path())
        .args(["settings", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10m *"));
}

#[test]
fn test_settings_set_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();

    let unknown = cectray_cmd(dir.path())
        .args(["settings", "set", "no-such-setting", "1"])
        .output()
        .unwrap();
    assert_eq!(unknown.status.code(), Some(4));

    let device_sourced = cectray_cmd(dir.path())
        .args(["settings", "set", "physical-address", "1.0.0.0"])
        .output()
        .unwrap();
    assert_eq!(device_sourced.status.code(), Some(2));

    let invalid = cectray_cmd(dir.path())
        .args(["settings", "set", "standby-screen", "forever"])
        .output()
        .unwrap();
    assert_eq!(invalid.status.code(), Some(2));
    assert!(!dir.path().join("settings.toml").exists());
}

#[test]
fn test_settings_reset_clears_file() {
    let dir = tempfile::tempdir().unwrap();
    cectray_cmd(dir.path())
        .args(["settings", "set", "stop-tv-standby", "false"])
        .assert()
        .success();
    cectray_cmd(dir.path())
        .args(["settings", "reset"])
        .assert()
        .success();

    let stored = std::fs::read_to_string(dir.path().join("settings.toml")).unwrap();
    assert!(stored.trim().is_empty());
}
