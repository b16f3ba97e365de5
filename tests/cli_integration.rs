use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn run_taskmirror(root: &Path, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("taskmirror");
    let mut cmd = Command::new(binary);
    cmd.current_dir(root);
    cmd.env_remove("TASKMIRROR_LOG");
    cmd.arg("--format").arg("json");
    cmd.args(args);
    cmd.output().expect("taskmirror command executes")
}

fn run_ok(root: &Path, args: &[&str]) -> Output {
    let output = run_taskmirror(root, args);
    assert!(
        output.status.success(),
        "taskmirror {:?} failed:\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_json(root: &Path, args: &[&str]) -> Value {
    let output = run_ok(root, args);
    serde_json::from_slice(&output.stdout).expect("valid json stdout")
}

fn run_err_json(root: &Path, args: &[&str]) -> Value {
    let output = run_taskmirror(root, args);
    assert!(!output.status.success(), "expected taskmirror {args:?} to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    serde_json::from_str(line).expect("valid json error line in stderr")
}

fn add(root: &Path, title: &str, comment: &str, selector: &str) -> Value {
    run_json(
        root,
        &[
            "add",
            "--title",
            title,
            "--comment",
            comment,
            "--selector",
            selector,
        ],
    )
}

#[test]
fn init_creates_config_and_canonical_files() {
    let dir = tempdir().unwrap();
    run_ok(dir.path(), &["init"]);

    assert!(dir.path().join("taskmirror.json").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("tasks.json")).unwrap().trim(),
        "[]"
    );
    let md = fs::read_to_string(dir.path().join("tasks.md")).unwrap();
    assert!(md.contains("_No tasks yet._"));
}

#[test]
fn add_status_list_show_remove() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    run_ok(root, &["init"]);

    let task = add(root, "Btn", "make this blue", ".btn");
    let id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "to-do");

    let dup = add(root, "Btn", "make this blue", ".btn");
    assert_eq!(dup["id"], task["id"]);

    let md = fs::read_to_string(root.join("tasks.md")).unwrap();
    assert!(md.contains("1. [ ] Btn – \"make this blue\""));

    let updated = run_json(root, &["status", &id, "in progress"]);
    assert_eq!(updated["status"], "doing");

    let listed = run_json(root, &["list", "--status", "doing"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let none = run_json(root, &["list", "--status", "done"]);
    assert!(none.as_array().unwrap().is_empty());

    let shown = run_json(root, &["show", &id]);
    assert_eq!(shown["selector"], ".btn");

    let removed = run_json(root, &["remove", &id]);
    assert_eq!(removed["removed"], id.as_str());
    let err = run_err_json(root, &["show", &id]);
    assert_eq!(err["error"], "not_found");
}

#[test]
fn unknown_status_is_a_validation_error() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let task = add(root, "A", "first", "#a");
    let err = run_err_json(root, &["status", task["id"].as_str().unwrap(), "someday"]);
    assert_eq!(err["error"], "validation_error");
}

#[test]
fn corrupt_tasks_file_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("tasks.json"), "{ nope").unwrap();
    let err = run_err_json(dir.path(), &["list"]);
    assert_eq!(err["error"], "corrupt_data");
}

#[test]
fn migrate_dry_run_then_migrate_then_rollback() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let stream = concat!(
        r#"{"title":"Btn","comment":"make this blue","selector":".btn"}"#,
        "\n",
        r#"{"title":"Logo","comment":"bigger","selector":"img.logo"}"#,
        "\n",
    );
    fs::write(root.join("annotations.jsonl"), stream).unwrap();

    let plan = run_json(root, &["migrate", "--dry-run"]);
    assert_eq!(plan["dryRun"], true);
    assert_eq!(plan["tasks"].as_array().unwrap().len(), 2);
    assert!(!root.join("tasks.json").exists());

    let result = run_json(root, &["migrate"]);
    assert_eq!(result["success"], true);
    assert_eq!(result["tasksConverted"], 2);
    assert_eq!(result["filesArchived"], 1);
    assert!(!root.join("annotations.jsonl").exists());

    run_ok(root, &["rollback"]);
    assert_eq!(
        fs::read_to_string(root.join("annotations.jsonl")).unwrap(),
        stream
    );
    assert!(!root.join("tasks.json").exists());
    assert!(!root.join("tasks.md").exists());
}

#[test]
fn rollback_without_backups_fails() {
    let dir = tempdir().unwrap();
    let err = run_err_json(dir.path(), &["rollback"]);
    assert_eq!(err["error"], "migration_error");
}

#[test]
fn render_to_stdout_prints_document() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    add(root, "Btn", "make this blue", ".btn");

    let binary = assert_cmd::cargo::cargo_bin!("taskmirror");
    assert_cmd::Command::new(&binary)
        .current_dir(root)
        .args(["render", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Tasks"))
        .stdout(predicate::str::contains("**Total**: 1"));
}

#[test]
fn version_and_pretty_output() {
    let dir = tempdir().unwrap();
    let binary = assert_cmd::cargo::cargo_bin!("taskmirror");
    assert_cmd::Command::new(&binary)
        .current_dir(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("taskmirror "));

    add(dir.path(), "Btn", "make this blue", ".btn");
    assert_cmd::Command::new(&binary)
        .current_dir(dir.path())
        .args(["--format", "pretty", "list"])
        .env("NO_COLOR", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("selector: .btn"));
}
