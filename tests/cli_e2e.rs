//! End-to-end CLI tests for the wallhaven-downloader binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wallhaven-downloader").unwrap();
    cmd.current_dir(workdir.path())
        .env_remove("WALLHAVEN_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help describes the tool and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let workdir = TempDir::new().unwrap();
    cmd(&workdir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("wallhaven.cc"))
        .stdout(predicate::str::contains("--collections"))
        .stdout(predicate::str::contains("--downloads_path"));
}

/// Test that --version prints the binary name.
#[test]
fn test_binary_version_displays_version() {
    let workdir = TempDir::new().unwrap();
    cmd(&workdir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wallhaven-downloader"));
}

/// Running with no action is a usage error.
#[test]
fn test_binary_without_action_fails() {
    let workdir = TempDir::new().unwrap();
    cmd(&workdir)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("required"));
}

/// Invalid flag values are rejected by the parser.
#[test]
fn test_binary_rejects_zero_workers() {
    let workdir = TempDir::new().unwrap();
    cmd(&workdir)
        .args(["-u", "alice", "-w", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--workers"));
}

/// Sync mode is not implemented and exits non-zero without touching disk.
#[test]
fn test_binary_sync_fails_fast() {
    let workdir = TempDir::new().unwrap();
    cmd(&workdir)
        .args(["-s", "-u", "alice", "-d", "out"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not implemented"));
    assert!(!workdir.path().join("out").exists());
}

/// A missing API key is a warning, not an error.
#[test]
fn test_binary_warns_without_api_key() {
    let workdir = TempDir::new().unwrap();
    cmd(&workdir)
        .args(["-s", "-u", "alice"])
        .assert()
        .stderr(predicate::str::contains("no API key found"));
}
