//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_fitplan-cli"))
        .env("FITPLAN_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("stdout is not JSON")
}

#[test]
fn test_settings_list_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["settings", "list", "--json"]);
    assert_eq!(code, 0);
    let goals = json(&stdout);
    assert_eq!(goals["protein_target_grams"], 130);
    assert_eq!(goals["water_target_ml"], 3000);
    assert_eq!(goals["portion_percent"], 100);
}

#[test]
fn test_settings_set_clamps() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["settings", "set", "protein", "10"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("60 (clamped)"));

    let (code, stdout, _) = run_cli(dir.path(), &["settings", "get", "protein"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "60");
}

#[test]
fn test_settings_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["settings", "get", "kalori"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_reminders_plan_json() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["reminders", "plan", "--json"]);
    assert_eq!(code, 0);
    let planned = json(&stdout);
    let planned = planned.as_array().unwrap();
    assert_eq!(planned.len(), 8);
    assert_eq!(planned[0]["id"], "meal-1");
}

#[test]
fn test_save_then_sync_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["settings", "save", "--water", "3500", "--json"]);
    assert_eq!(code, 0);
    let report = json(&stdout);
    assert_eq!(report["added"].as_array().unwrap().len(), 9);

    let (code, stdout, _) = run_cli(dir.path(), &["reminders", "alarms", "--json"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 9);

    let (code, stdout, _) = run_cli(dir.path(), &["reminders", "sync", "--json"]);
    assert_eq!(code, 0);
    let report = json(&stdout);
    assert_eq!(report["unchanged"].as_array().unwrap().len(), 9);
    assert!(report["added"].as_array().unwrap().is_empty());
}

#[test]
fn test_boot_after_reboot_restores_alarms() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["reminders", "sync"]);
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(
        dir.path(),
        &["reminders", "boot", "--simulate-reboot", "--json"],
    );
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["restored"].as_array().unwrap().len(), 8);
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(
        dir.path(),
        &["config", "set", "reminders.max_checkpoints", "6"],
    );
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "reminders.max_checkpoints"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "6");

    let (code, stdout, _) = run_cli(dir.path(), &["reminders", "plan", "--json"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 2 + 6);
}

#[test]
fn test_config_rejects_invalid_window() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        dir.path(),
        &["config", "set", "reminders.water_start_hour", "25"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}
