//! Integration tests for the `stackdeck` binary
//!
//! Each test points the binary at its own temporary data directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn stackdeck(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stackdeck").expect("binary should build");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("stackdeck")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue"))
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn test_offline_enqueue_persists_between_invocations() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    stackdeck(&dir)
        .args(["--offline", "queue", "enqueue", r#"{"op":"restart"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"pending""#));

    stackdeck(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""op":"restart""#));

    stackdeck(&dir)
        .args(["log", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("offline-action-queue\t1"));

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_enqueue_rejects_invalid_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    stackdeck(&dir)
        .args(["--offline", "queue", "enqueue", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("payload must be valid JSON"));
}

#[test]
fn test_replay_of_unknown_session_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    stackdeck(&dir)
        .args(["replay", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no recorded events"));
}
