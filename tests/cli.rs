//! CLI test cases.
//!
//! The server itself is exercised by `tests/api.rs` against the in-process
//! router; here we only check the binary's argument surface, which needs no
//! network and no Gemini credentials.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("solar-formfill").unwrap()
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--assets-dir"));
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_rejects_bad_port() {
    cmd().args(["--port", "not-a-port"]).assert().failure();
}
