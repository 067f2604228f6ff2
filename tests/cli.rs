// ABOUTME: Integration tests for the fledged-imagemanager CLI.
// ABOUTME: Validates --help output and the errors raised before any cluster access.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn imagemanager_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("fledged-imagemanager"))
}

#[test]
fn help_shows_commands() {
    imagemanager_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pull"))
        .stdout(predicate::str::contains("purge"));
}

#[test]
fn pull_help_lists_target_arguments() {
    imagemanager_cmd()
        .args(["pull", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cache"))
        .stdout(predicate::str::contains("--image"))
        .stdout(predicate::str::contains("--node"))
        .stdout(predicate::str::contains("--runtime"));
}

#[test]
fn cache_without_namespace_is_rejected() {
    imagemanager_cmd()
        .args(["pull", "--cache", "foo", "--image", "redis:7", "--node", "bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAMESPACE/NAME"));
}

#[test]
fn unknown_output_mode_is_rejected() {
    imagemanager_cmd()
        .args(["--output", "xml", "pull", "--cache", "ns/foo"])
        .assert()
        .failure();
}

#[test]
fn invalid_config_fails_before_connecting() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("fledged.yml"), "workers: 0\n").unwrap();

    imagemanager_cmd()
        .current_dir(temp_dir.path())
        .args(["pull", "--cache", "ns/foo", "--image", "redis:7", "--node", "bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workers must be at least 1"));
}

#[test]
fn invalid_image_fails_before_connecting() {
    let temp_dir = tempfile::tempdir().unwrap();

    imagemanager_cmd()
        .current_dir(temp_dir.path())
        .args(["purge", "--cache", "ns/foo", "--image", "redis;reboot", "--node", "bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid request"));
}

#[test]
fn json_mode_reports_errors_as_json() {
    let temp_dir = tempfile::tempdir().unwrap();

    imagemanager_cmd()
        .current_dir(temp_dir.path())
        .args(["--output", "json", "pull", "--cache", "ns/foo", "--image", "", "--node", "bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""event":"error""#));
}
