mod common;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use taskmirror::config::Config;
use taskmirror::legacy::{LegacyMigrator, MigrationPhase};
use taskmirror::model::{Status, Task, TaskInput};
use taskmirror::store::notify::{ChangeEvent, ChangeSource};
use taskmirror::store::tasks::TaskStore;
use tempfile::tempdir;

const STREAM: &str = concat!(
    r#"{"id":"a1","title":"Btn","comment":"make this blue","selector":".btn","timestamp":"2024-01-02T10:00:00Z"}"#,
    "\n",
    r#"{"title":"Logo","comment":"bigger","selector":"img.logo","timestamp":"2024-01-02T11:00:00Z","status":"sent"}"#,
    "\n",
);

const DETAILED: &str = "\
# Detailed tasks

## Task 1: Btn
- **Request**: make this blue
- **Element**: `.btn.primary`
- **Status**: completed
";

const SUMMARY: &str = "# TODO\n\n1. [ ] Btn - \"make this blue\"\n2. [ ] Footer - \"move links\"\n";

fn read_tasks(root: &std::path::Path) -> Vec<Task> {
    let raw = fs::read_to_string(root.join("tasks.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn backups(root: &std::path::Path) -> Vec<String> {
    common::file_names(root)
        .into_iter()
        .filter(|n| n.contains(".backup-"))
        .collect()
}

#[test]
fn two_stream_annotations_become_two_tasks() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let events = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&events);
    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config())
        .with_hook(Arc::new(move |event: &ChangeEvent<'_>| {
            assert_eq!(event.source, ChangeSource::Migration);
            assert_eq!(event.tasks.len(), 2);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

    let result = migrator.perform_migration();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.tasks_converted, 2);
    assert_eq!(result.files_archived, 1);
    assert_eq!(events.load(Ordering::SeqCst), 1);

    let raw: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("tasks.json")).unwrap()).unwrap();
    assert_eq!(raw.len(), 2);
}

#[test]
fn all_three_formats_merge_without_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();
    fs::write(dir.path().join("todo-detailed.md"), DETAILED).unwrap();
    fs::write(dir.path().join("todo.md"), SUMMARY).unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    let result = migrator.perform_migration();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.tasks_converted, 3);
    assert_eq!(result.files_archived, 3);
    assert!(result.warnings.iter().any(|w| w.contains("Footer") || w.contains("selector")));

    // Inputs are gone, one backup per input remains.
    for legacy in ["annotations.jsonl", "todo.md", "todo-detailed.md"] {
        assert!(!dir.path().join(legacy).exists(), "{legacy} left behind");
    }
    assert_eq!(backups(dir.path()).len(), 3);

    let tasks = read_tasks(dir.path());
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.validate().is_ok()));

    let btn = tasks.iter().find(|t| t.title == "Btn").unwrap();
    assert_eq!(btn.id, "a1");
    assert_eq!(btn.selector, ".btn.primary");
    assert_eq!(btn.status, Status::Done);

    let footer = tasks.iter().find(|t| t.title == "Footer").unwrap();
    assert_eq!(footer.selector, "legacy:unknown");
    assert_eq!(footer.comment, "move links");

    let md = fs::read_to_string(dir.path().join("tasks.md")).unwrap();
    assert!(md.contains("**Total**: 3"));
    assert!(md.contains("[x] Btn"));
}

#[test]
fn migration_appends_to_existing_store() {
    let dir = tempdir().unwrap();
    let mut store = TaskStore::open(common::project(dir.path()), common::config()).unwrap();
    store
        .add_task_and_save(TaskInput::new("Nav", "sticky nav", "nav"))
        .unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    let result = migrator.perform_migration();
    assert!(result.success, "{:?}", result.errors);

    let tasks = read_tasks(dir.path());
    assert_eq!(tasks.len(), 3);
    // Chronological on disk.
    assert!(tasks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    // The pre-existing file was snapshotted too.
    assert!(backups(dir.path()).iter().any(|b| b.starts_with("tasks.json.backup-")));
}

#[test]
fn write_failure_rolls_back_to_the_original_bytes() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let mut migrator =
        LegacyMigrator::new(common::failing(dir.path(), "tasks.md"), common::config());
    let result = migrator.perform_migration();

    assert!(!result.success);
    assert!(result.rolled_back);
    assert_eq!(result.phase, MigrationPhase::RolledBack);
    assert!(!result.errors.is_empty());

    assert_eq!(
        fs::read_to_string(dir.path().join("annotations.jsonl")).unwrap(),
        STREAM
    );
    assert_eq!(common::file_names(dir.path()), vec!["annotations.jsonl"]);
}

#[test]
fn failed_migration_restores_existing_tasks_file() {
    let dir = tempdir().unwrap();
    let mut store = TaskStore::open(common::project(dir.path()), common::config()).unwrap();
    store
        .add_task_and_save(TaskInput::new("Nav", "sticky nav", "nav"))
        .unwrap();
    let before = fs::read(dir.path().join("tasks.json")).unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let mut migrator =
        LegacyMigrator::new(common::failing(dir.path(), "tasks.md"), common::config());
    let result = migrator.perform_migration();

    assert!(result.rolled_back);
    assert_eq!(fs::read(dir.path().join("tasks.json")).unwrap(), before);
    assert!(dir.path().join("annotations.jsonl").exists());
    assert!(!dir.path().join("tasks.md").exists());
    assert!(backups(dir.path()).is_empty());
}

#[test]
fn validation_failure_triggers_rollback() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();
    let config = Config {
        min_markdown_bytes: 1_000_000,
        ..Config::default()
    };

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), config);
    let result = migrator.perform_migration();

    assert!(!result.success);
    assert!(result.rolled_back);
    assert!(result.errors.iter().any(|e| e.contains("tasks.md")));
    assert_eq!(common::file_names(dir.path()), vec!["annotations.jsonl"]);

    let record = migrator.last_record().unwrap();
    assert!(record.log.iter().any(|entry| entry.phase == MigrationPhase::Validating));
}

#[test]
fn failed_legacy_backup_keeps_that_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();
    fs::write(dir.path().join("todo.md"), SUMMARY).unwrap();

    let mut migrator = LegacyMigrator::new(
        common::failing(dir.path(), "todo.md.backup-"),
        common::config(),
    );
    let result = migrator.perform_migration();

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.files_archived, 1);
    assert!(result.warnings.iter().any(|w| w.contains("could not back up todo.md")));
    assert!(dir.path().join("todo.md").exists());
    assert!(!dir.path().join("annotations.jsonl").exists());
}

#[test]
fn rerun_after_success_changes_nothing() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    assert!(migrator.perform_migration().success);
    let files = common::file_names(dir.path());
    let tasks = fs::read(dir.path().join("tasks.json")).unwrap();

    assert!(!migrator.needs_migration());
    let again = migrator.perform_migration();
    assert!(again.success);
    assert_eq!(again.tasks_converted, 0);
    assert_eq!(common::file_names(dir.path()), files);
    assert_eq!(fs::read(dir.path().join("tasks.json")).unwrap(), tasks);
}

#[test]
fn standalone_rollback_after_success() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();
    fs::write(dir.path().join("todo.md"), SUMMARY).unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    assert!(migrator.perform_migration().success);

    let rollback = migrator.rollback_migration();
    assert!(rollback.success, "{:?}", rollback.errors);
    assert_eq!(rollback.restored.len(), 2);
    assert_eq!(
        common::file_names(dir.path()),
        vec!["annotations.jsonl", "todo.md"]
    );
    assert_eq!(fs::read_to_string(dir.path().join("todo.md")).unwrap(), SUMMARY);
    assert_eq!(
        migrator.last_record().unwrap().phase(),
        MigrationPhase::RolledBack
    );
}

fn open_duplicate_pairs(tasks: &[Task]) -> usize {
    let open: Vec<_> = tasks.iter().filter(|t| !t.status.is_resolved()).collect();
    open.iter()
        .enumerate()
        .map(|(i, a)| {
            open[i + 1..]
                .iter()
                .filter(|b| a.content_key() == b.content_key())
                .count()
        })
        .sum()
}

#[test]
fn legacy_record_matching_open_task_folds_into_it() {
    let dir = tempdir().unwrap();
    let mut store = TaskStore::open(common::project(dir.path()), common::config()).unwrap();
    let existing = store
        .add_task_and_save(TaskInput::new("Btn", "make this blue", ".btn"))
        .unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    let result = migrator.perform_migration();
    assert!(result.success, "{:?}", result.errors);

    let tasks = read_tasks(dir.path());
    assert_eq!(tasks.len(), 2);
    assert_eq!(open_duplicate_pairs(&tasks), 0);
    assert!(tasks.iter().any(|t| t.id == existing.id));
    assert!(!tasks.iter().any(|t| t.id == "a1"));
}

#[test]
fn rerun_with_leftover_legacy_file_adds_no_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    assert!(migrator.perform_migration().success);
    let first = read_tasks(dir.path());

    // Cleanup did not get to the stream file last time.
    fs::write(dir.path().join("annotations.jsonl"), STREAM).unwrap();
    let again = migrator.perform_migration();
    assert!(again.success, "{:?}", again.errors);

    let tasks = read_tasks(dir.path());
    assert_eq!(tasks.len(), first.len());
    assert_eq!(open_duplicate_pairs(&tasks), 0);
    assert!(!dir.path().join("annotations.jsonl").exists());
}

#[test]
fn repeated_stream_lines_become_one_task() {
    let dir = tempdir().unwrap();
    let line = r#"{"title":"Btn","comment":"make this blue","selector":".btn"}"#;
    fs::write(
        dir.path().join("annotations.jsonl"),
        format!("{line}\n{line}\n"),
    )
    .unwrap();

    let mut migrator = LegacyMigrator::new(common::project(dir.path()), common::config());
    let result = migrator.perform_migration();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.tasks_converted, 1);

    let tasks = read_tasks(dir.path());
    assert_eq!(tasks.len(), 1);
    assert_eq!(open_duplicate_pairs(&tasks), 0);
}
