//! Smoke tests for the spiffy-verify CLI
//!
//! None of these start a browser.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the binary, isolated from any `.env` in the repo
fn spiffy_verify(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("spiffy-verify").expect("spiffy-verify binary should exist");
    cmd.current_dir(dir.path())
        .env_remove("SPIFFY_BASE_URL")
        .env_remove("SPIFFY_ENV")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("merchants"))
        .stdout(predicate::str::contains("signals"));
}

#[test]
fn test_no_args_fails() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir).assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--merchant"))
        .stdout(predicate::str::contains("--timeout-ms"))
        .stdout(predicate::str::contains("--fail-fast"))
        .stdout(predicate::str::contains("--artifacts-dir"))
        .stdout(predicate::str::contains("--chromium-path"))
        .stdout(predicate::str::contains("--viewport"));
}

#[test]
fn test_invalid_viewport_is_usage_error() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .args(["run", "--viewport", "wide"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WIDTHxHEIGHT"));
}

// ============================================================================
// Catalog Commands
// ============================================================================

#[test]
fn test_merchants_lists_catalog() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .arg("merchants")
        .assert()
        .success()
        .stdout(predicate::str::contains("fake-store"))
        .stdout(predicate::str::contains("ecom-demo-2"))
        .stdout(predicate::str::contains("* https://fakestoreapi.com/products/1"))
        .stdout(predicate::str::contains("https://fakestoreapi.com/products/2"));
}

#[test]
fn test_signals_lists_catalog() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .arg("signals")
        .assert()
        .success()
        .stdout(predicate::str::contains("EVENT_APP_INITIALIZED  (required)"))
        .stdout(predicate::str::contains("EVENT_SHADOW_DOM_CONTAINER_READY  (required)"))
        .stdout(predicate::str::contains("EVENT_FLOATING_CHAT_NOT_RENDERING"));
}

#[test]
fn test_agent_prints_script() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .arg("agent")
        .assert()
        .success()
        .stdout(predicate::str::contains("__spiffy_tracker"))
        .stdout(predicate::str::contains("EVENT_APP_INITIALIZED"));
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_invalid_base_url_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .env("SPIFFY_BASE_URL", "not a url")
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SPIFFY_BASE_URL"));
}

#[test]
fn test_invalid_environment_from_dotenv() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "SPIFFY_ENV=staging\n").unwrap();
    spiffy_verify(&dir)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SPIFFY_ENV"));
}

#[test]
fn test_missing_env_file_is_error() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .args(["--env-file", "absent.env", "signals"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(".env"));
}

#[test]
fn test_unknown_merchant_is_usage_error() {
    let dir = TempDir::new().unwrap();
    spiffy_verify(&dir)
        .args(["run", "--merchant", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("acme"));
}
