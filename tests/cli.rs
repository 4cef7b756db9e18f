//! Integration tests for the gatewarden CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the gatewarden binary
fn gatewarden() -> Command {
    Command::new(cargo::cargo_bin!("gatewarden"))
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A small, well-formed project.
fn clean_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/lib.rs",
        "/// Adds two numbers.\npub fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n",
    );
    temp
}

/// A project with one function of cyclomatic complexity 26.
fn complex_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let body: String = (0..25)
        .map(|i| format!("    if x == {i} {{\n        y += 1;\n    }}\n"))
        .collect();
    write(
        temp.path(),
        "src/lib.rs",
        &format!("/// Busy.\npub fn busy(x: u32) -> u32 {{\n    let mut y = 0;\n{body}    y\n}}\n"),
    );
    write(temp.path(), "gatewarden.toml", "[thresholds]\nmax_complexity = 20\n");
    temp
}

#[test]
fn test_help() {
    gatewarden()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Quality gate orchestration"));
}

#[test]
fn test_version() {
    gatewarden()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_config_prints_preset() {
    let temp = TempDir::new().unwrap();
    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["--preset", "strict", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_complexity = 8"))
        .stdout(predicate::str::contains("fail_fast = true"));
}

#[test]
fn test_unknown_preset_rejected() {
    gatewarden()
        .args(["--preset", "chaotic", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown preset"));
}

#[test]
fn test_invalid_config_file_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "gatewarden.toml", "[execution]\ntimeout_seconds = 0\n");

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "commit"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("timeout_seconds"));
}

#[test]
fn test_run_clean_project_succeeds_and_records_history() {
    let temp = clean_project();

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "commit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("code_quality"))
        .stdout(predicate::str::contains("overall"));

    assert!(temp.path().join(".gatewarden/history.json").exists());
}

#[test]
fn test_run_json_includes_overall() {
    let temp = clean_project();

    let output = gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "commit", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(results.get("overall").is_some());
    assert!(results.get("code_quality").is_some());
    assert_eq!(results["coverage"]["status"], "skipped");
}

#[test]
fn test_unknown_context_rejected() {
    let temp = clean_project();

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "deploy"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown execution context"));
}

#[test]
fn test_high_complexity_fails_commit() {
    let temp = complex_project();

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "commit"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("high_complexity"));
}

#[test]
fn test_quick_json() {
    let temp = clean_project();

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["quick", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\""));

    assert!(!temp.path().join(".gatewarden/history.json").exists());
}

#[test]
fn test_trends_after_runs() {
    let temp = clean_project();

    for _ in 0..2 {
        gatewarden()
            .arg("--project")
            .arg(temp.path())
            .args(["run", "commit"])
            .assert()
            .success();
    }

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["trends", "--days", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 run(s)"))
        .stdout(predicate::str::contains("code_quality"));
}

#[test]
fn test_missing_project_dir() {
    gatewarden()
        .args(["--project", "/definitely/not/here", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_unreadable_history_does_not_block_run() {
    let temp = clean_project();
    fs::create_dir_all(temp.path().join(".gatewarden/history.json")).unwrap();

    gatewarden()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "commit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overall"))
        .stderr(predicate::str::contains("History unavailable"));
}
