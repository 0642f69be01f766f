//! CLI-level checks for paths that terminate before any service call:
//! validation errors, the stale-snapshot gate, and help output.

use std::process::Command;

use chrono::{Duration, Utc};
use dsfleet::models::{CompartmentId, LifecycleState, TargetId};
use dsfleet::snapshot::{SelectionSnapshot, SnapshotEntry};

fn dsfleet(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dsfleet"));
    // Isolate from any user config; the endpoint is never contacted on
    // these paths.
    cmd.env("XDG_CONFIG_HOME", dir)
        .env("HOME", dir)
        .env("DSFLEET_ENDPOINT", "http://127.0.0.1:1");
    cmd
}

fn stale_snapshot_file(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("selection.json");
    let mut snapshot = SelectionSnapshot::new(vec![SnapshotEntry {
        id: TargetId::new("ocid1.datasafetarget.oc1.iad.a"),
        display_name: "db-a".into(),
        lifecycle_state: LifecycleState::Active,
        compartment_id: CompartmentId::new("ocid1.compartment.oc1.iad.ops"),
    }]);
    snapshot.captured_at = Utc::now() - Duration::days(10);
    snapshot.save(&path).unwrap();
    path
}

#[test]
fn conflicting_selection_sources_fail_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let output = dsfleet(dir.path())
        .args([
            "refresh",
            "--targets",
            "db-a",
            "--from-snapshot",
            "selection.json",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("conflicting selection sources"));
}

#[test]
fn empty_explicit_list_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dsfleet(dir.path())
        .args(["refresh", "--targets", " , ,"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no target names or identifiers"));
}

#[test]
fn invalid_max_snapshot_age_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dsfleet(dir.path())
        .args(["refresh", "--targets", "db-a", "--max-snapshot-age", "5w"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid max age"));
}

#[test]
fn move_without_destination_names_the_missing_flag() {
    let dir = tempfile::tempdir().unwrap();
    let output = dsfleet(dir.path())
        .args(["move", "--targets", "db-a"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--destination"));
}

#[test]
fn stale_snapshot_blocks_apply_with_the_override_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = stale_snapshot_file(dir.path());
    let output = dsfleet(dir.path())
        .args(["refresh", "--from-snapshot", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--allow-stale-snapshot"));
}

#[test]
fn stale_snapshot_is_fine_for_a_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = stale_snapshot_file(dir.path());
    let output = dsfleet(dir.path())
        .args([
            "refresh",
            "--from-snapshot",
            path.to_str().unwrap(),
            "--dry-run",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "dry-run replay of a stale snapshot must pass");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry run"));
    assert!(stdout.contains("1 succeeded"));
}

#[test]
fn dry_run_json_stream_ends_with_a_complete_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = stale_snapshot_file(dir.path());
    let output = dsfleet(dir.path())
        .args([
            "refresh",
            "--from-snapshot",
            path.to_str().unwrap(),
            "--dry-run",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().unwrap();
    let event: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(event["event"], "complete");
    assert_eq!(event["succeeded"], 1);
    assert_eq!(event["failed"], 0);
}

#[test]
fn outcomes_file_is_written_for_a_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = stale_snapshot_file(dir.path());
    let outcomes = dir.path().join("outcomes.json");
    let output = dsfleet(dir.path())
        .args([
            "refresh",
            "--from-snapshot",
            path.to_str().unwrap(),
            "--dry-run",
            "--output",
            outcomes.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outcomes).unwrap()).unwrap();
    assert_eq!(rows[0]["identifier"], "ocid1.datasafetarget.oc1.iad.a");
    assert_eq!(rows[0]["display_name"], "db-a");
    assert_eq!(rows[0]["status"], "succeeded");
}

#[test]
fn help_lists_every_fleet_operation() {
    let dir = tempfile::tempdir().unwrap();
    let output = dsfleet(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["move", "refresh", "retag", "audit-start", "snapshot"] {
        assert!(stdout.contains(subcommand), "help is missing {subcommand}");
    }
}
