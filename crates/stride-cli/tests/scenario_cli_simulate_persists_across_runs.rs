//! Scenario: CLI Simulate Persists Across Runs
//!
//! # Invariants under test
//!
//! 1. `simulate` accumulates walks onto the persisted baseline.
//! 2. A second process resumes from what the first one stored.
//! 3. `show` prints the readout; `reset` zeroes it.
//! 4. A history-capable platform reports its snapshot and stores nothing.
//! 5. Blocked permission exits non-zero without touching the store.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn stride(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stride").unwrap();
    cmd.env("STRIDE_STORE_PATH", store).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn simulate_then_show_then_reset() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    stride(&store)
        .args(["simulate", "--walk", "10", "--walk", "25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode=accumulation"))
        .stdout(predicate::str::contains("You have taken 35 steps"));

    stride(&store)
        .args(["simulate", "--walk", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("You have taken 40 steps"));

    stride(&store)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("You have taken 40 steps"));

    stride(&store).arg("reset").assert().success();

    stride(&store)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("You have taken 0 steps"));
}

#[test]
fn history_platform_reports_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    stride(&store)
        .args(["simulate", "--history", "4200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode=snapshot"))
        .stdout(predicate::str::contains("You have taken 4200 steps"));

    assert!(!store.exists());
}

#[test]
fn blocked_permission_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    stride(&store)
        .args(["simulate", "--blocked", "--walk", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not get permission."));

    assert!(!store.exists());
}

#[test]
fn config_key_selects_storage_slot() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let cfg = dir.path().join("device.yaml");
    std::fs::write(&cfg, "storage:\n  key: other-slot\n").unwrap();
    let cfg = cfg.to_str().unwrap();

    stride(&store)
        .args(["simulate", "--config", cfg, "--walk", "9"])
        .assert()
        .success();

    let raw = std::fs::read_to_string(&store).unwrap();
    assert!(raw.contains("other-slot"));
    assert!(!raw.contains("@count-steps_steps"));

    // Default slot untouched.
    stride(&store)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("You have taken 0 steps"));
}
