use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::legacy::convert::{Conversion, convert};
use crate::legacy::parse::{self, ParseOutcome};
use crate::legacy::LegacySource;
use crate::render::MarkdownGenerator;
use crate::store::capability::FileCapability;
use crate::store::notify::{self, ChangeHook, ChangeSource};
use crate::store::tasks::TaskStore;
use crate::store::{BACKUP_MARKER, backup_name, backup_suffix};

/// Where a migration attempt currently is. Variants are ordered; anything
/// from `BackingUp` on may have touched the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationPhase {
    Idle,
    Detecting,
    Parsing,
    Converting,
    BackingUp,
    Writing,
    Validating,
    Cleanup,
    Succeeded,
    RollingBack,
    RolledBack,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub phase: MigrationPhase,
    pub level: LogLevel,
    pub message: String,
}

/// A copy made before anything destructive happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub original: String,
    pub backup: String,
}

/// Summary returned by every migration entry point.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub phase: MigrationPhase,
    pub tasks_converted: usize,
    pub files_archived: usize,
    pub rolled_back: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl MigrationResult {
    fn new() -> Self {
        Self {
            success: false,
            phase: MigrationPhase::Idle,
            tasks_converted: 0,
            files_archived: 0,
            rolled_back: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackResult {
    pub success: bool,
    pub restored: Vec<String>,
    pub removed: Vec<String>,
    pub errors: Vec<String>,
}

/// Everything one attempt did, kept after the run so it can be rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRecord {
    pub started: DateTime<Utc>,
    pub log: Vec<LogEntry>,
    pub backups: Vec<BackupEntry>,
    /// Canonical files that did not exist before this run.
    pub created: Vec<String>,
    pub converted_ids: Vec<String>,
    pub result: MigrationResult,
}

impl MigrationRecord {
    fn new(started: DateTime<Utc>) -> Self {
        Self {
            started,
            log: Vec::new(),
            backups: Vec::new(),
            created: Vec::new(),
            converted_ids: Vec::new(),
            result: MigrationResult::new(),
        }
    }

    pub fn phase(&self) -> MigrationPhase {
        self.result.phase
    }

    fn enter(&mut self, phase: MigrationPhase) {
        self.result.phase = phase;
        tracing::debug!(?phase, "migration phase");
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.log.push(LogEntry {
            at: Utc::now(),
            phase: self.result.phase,
            level,
            message,
        });
    }

    fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(phase = ?self.result.phase, "{message}");
        self.push(LogLevel::Info, message);
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(phase = ?self.result.phase, "{message}");
        self.result.warnings.push(message.clone());
        self.push(LogLevel::Warn, message);
    }

    fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(phase = ?self.result.phase, "{message}");
        self.result.errors.push(message.clone());
        self.push(LogLevel::Error, message);
    }
}

/// A legacy file found on disk, with the content read at detection time.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub source: LegacySource,
    pub name: String,
    pub content: String,
}

/// Detection, parsing and conversion without writing anything.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub artifacts: Vec<Artifact>,
    pub parsed: Vec<(LegacySource, ParseOutcome)>,
    pub conversion: Conversion,
    pub existing_tasks: usize,
}

/// One-shot upgrader from legacy files to the canonical pair.
pub struct LegacyMigrator {
    dir: Arc<dyn FileCapability>,
    config: Config,
    hook: Option<ChangeHook>,
    last: Option<MigrationRecord>,
}

impl LegacyMigrator {
    pub fn new(dir: Arc<dyn FileCapability>, config: Config) -> Self {
        Self {
            dir,
            config,
            hook: None,
            last: None,
        }
    }

    pub fn with_hook(mut self, hook: ChangeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Record of the most recent `perform_migration` call.
    pub fn last_record(&self) -> Option<&MigrationRecord> {
        self.last.as_ref()
    }

    fn legacy_names(&self) -> [(LegacySource, &str); 3] {
        let [stream, summary, detailed] = self.config.legacy_files();
        [
            (LegacySource::Stream, stream),
            (LegacySource::Summary, summary),
            (LegacySource::Detailed, detailed),
        ]
    }

    fn canonical_names(&self) -> [&str; 2] {
        [&self.config.tasks_file, &self.config.markdown_file]
    }

    /// Legacy files currently present. Probe failures count as absent.
    pub fn detect(&self) -> Vec<(LegacySource, String)> {
        self.legacy_names()
            .into_iter()
            .filter(|(_, name)| match self.dir.exists(name) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "could not probe legacy file");
                    false
                }
            })
            .map(|(source, name)| (source, name.to_string()))
            .collect()
    }

    pub fn needs_migration(&self) -> bool {
        !self.detect().is_empty()
    }

    fn read_artifacts(&self, run: &mut MigrationRecord) -> Vec<Artifact> {
        let mut artifacts = Vec::new();
        for (source, name) in self.legacy_names() {
            match self.dir.read(name) {
                Ok(Some(content)) => {
                    run.info(format!("found {source} file {name} ({} bytes)", content.len()));
                    artifacts.push(Artifact {
                        source,
                        name: name.to_string(),
                        content,
                    });
                }
                Ok(None) => {}
                Err(e) => run.warn(format!("could not read {name}: {e}")),
            }
        }
        artifacts
    }

    fn parse_all(artifacts: &[Artifact], run: &mut MigrationRecord) -> Vec<(LegacySource, ParseOutcome)> {
        artifacts
            .iter()
            .map(|artifact| {
                let outcome = match artifact.source {
                    LegacySource::Stream => parse::parse_stream(&artifact.content),
                    LegacySource::Summary => parse::parse_summary(&artifact.content),
                    LegacySource::Detailed => parse::parse_detailed(&artifact.content),
                };
                for skipped in &outcome.skipped {
                    run.warn(format!("{}: skipped {skipped}", artifact.name));
                }
                run.info(format!(
                    "parsed {} annotation(s) from {}",
                    outcome.annotations.len(),
                    artifact.name
                ));
                (artifact.source, outcome)
            })
            .collect()
    }

    fn plan_with(&self, run: &mut MigrationRecord) -> Result<Option<(MigrationPlan, TaskStore)>> {
        run.enter(MigrationPhase::Detecting);
        let artifacts = self.read_artifacts(run);
        if artifacts.is_empty() {
            run.info("no legacy files found");
            return Ok(None);
        }

        run.enter(MigrationPhase::Parsing);
        let parsed = Self::parse_all(&artifacts, run);

        run.enter(MigrationPhase::Converting);
        let store = TaskStore::open(Arc::clone(&self.dir), self.config.clone())?;
        let taken: HashSet<String> = store.get_all().into_iter().map(|t| t.id).collect();
        let annotations: Vec<_> = parsed
            .iter()
            .flat_map(|(_, outcome)| outcome.annotations.iter().cloned())
            .collect();
        let conversion = convert(&annotations, &taken, run.started);
        for warning in &conversion.warnings {
            run.warn(warning.clone());
        }
        run.info(format!(
            "converted {} task(s), {} merged into richer records, {} dropped",
            conversion.tasks.len(),
            conversion.enhanced,
            conversion.dropped
        ));

        let plan = MigrationPlan {
            artifacts,
            parsed,
            conversion,
            existing_tasks: store.len(),
        };
        Ok(Some((plan, store)))
    }

    /// Detect, parse and convert without touching any file.
    pub fn plan(&self) -> Result<Option<MigrationPlan>> {
        let mut run = MigrationRecord::new(Utc::now());
        Ok(self.plan_with(&mut run)?.map(|(plan, _)| plan))
    }

    /// Run a full migration. Never returns an error: failures are folded into
    /// the result, and anything from the backup step on is rolled back.
    pub fn perform_migration(&mut self) -> MigrationResult {
        let started = Instant::now();
        let mut run = MigrationRecord::new(Utc::now());

        match self.run(&mut run) {
            Ok(()) => {
                run.enter(MigrationPhase::Succeeded);
                run.result.success = true;
                run.info(format!("migration finished in {:?}", started.elapsed()));
            }
            Err(e) => {
                let failed_in = run.phase();
                run.error(format!("{failed_in:?} failed: {e}"));
                if failed_in >= MigrationPhase::BackingUp {
                    run.enter(MigrationPhase::RollingBack);
                    let rollback = self.restore(&run.backups, &run.created);
                    for err in &rollback.errors {
                        run.error(format!("rollback: {err}"));
                    }
                    run.backups.clear();
                    run.created.clear();
                    run.result.rolled_back = rollback.success;
                    run.enter(if rollback.success {
                        MigrationPhase::RolledBack
                    } else {
                        MigrationPhase::Failed
                    });
                } else {
                    run.enter(MigrationPhase::Failed);
                }
            }
        }

        let result = run.result.clone();
        self.last = Some(run);
        result
    }

    fn run(&self, run: &mut MigrationRecord) -> Result<()> {
        let started = Instant::now();
        let Some((plan, mut store)) = self.plan_with(run)? else {
            return Ok(());
        };
        let MigrationPlan {
            artifacts,
            conversion,
            existing_tasks,
            ..
        } = plan;
        run.result.tasks_converted = conversion.tasks.len();
        run.converted_ids = conversion.tasks.iter().map(|t| t.id.clone()).collect();

        run.enter(MigrationPhase::BackingUp);
        let backed_up = self.back_up(&artifacts, run)?;

        run.enter(MigrationPhase::Writing);
        let mut tasks = conversion.tasks;
        tasks.sort_by_key(|t| t.timestamp);
        let report = store.import_tasks(tasks)?;
        if report.folded > 0 {
            run.info(format!(
                "folded {} task(s) into open tasks with the same selector and comment",
                report.folded
            ));
        }
        let mut landed = report.ids;
        landed.sort();
        landed.dedup();
        run.converted_ids = landed;
        store.save_to_file()?;
        let chronological = store.get_all_chronological();
        MarkdownGenerator::new(Arc::clone(&self.dir), self.config.clone()).rebuild(&chronological)?;
        run.info(format!(
            "wrote {} task(s) ({} new)",
            chronological.len(),
            report.inserted
        ));

        run.enter(MigrationPhase::Validating);
        let problems = self.validate(existing_tasks + report.inserted, &run.converted_ids);
        if !problems.is_empty() {
            let count = problems.len();
            for problem in problems {
                run.error(problem);
            }
            return Err(Error::Migration(format!("validation found {count} problem(s)")));
        }

        run.enter(MigrationPhase::Cleanup);
        for name in &backed_up {
            match self.dir.remove(name) {
                Ok(_) => run.info(format!("removed legacy file {name}")),
                Err(e) => run.warn(format!("could not remove legacy file {name}: {e}")),
            }
        }
        for artifact in &artifacts {
            if !backed_up.contains(&artifact.name) {
                run.warn(format!("kept {} because it has no backup", artifact.name));
            }
        }

        notify::fire(
            self.hook.as_ref(),
            ChangeSource::Migration,
            &chronological,
            started.elapsed(),
        );
        Ok(())
    }

    /// Copy every legacy file and any existing canonical file to a
    /// timestamped sibling. Returns the legacy names that were backed up.
    fn back_up(&self, artifacts: &[Artifact], run: &mut MigrationRecord) -> Result<Vec<String>> {
        let mut backed_up = Vec::new();
        for artifact in artifacts {
            let backup = backup_name(&artifact.name, run.started);
            match self.dir.write(&backup, &artifact.content) {
                Ok(()) => {
                    run.info(format!("backed up {} to {backup}", artifact.name));
                    run.backups.push(BackupEntry {
                        original: artifact.name.clone(),
                        backup,
                    });
                    backed_up.push(artifact.name.clone());
                }
                Err(e) => run.warn(format!("could not back up {}: {e}", artifact.name)),
            }
        }
        run.result.files_archived = backed_up.len();

        // Canonical files must be restorable, so a failure here is fatal.
        for name in self.canonical_names() {
            match self.dir.read(name)? {
                Some(content) => {
                    let backup = backup_name(name, run.started);
                    self.dir.write(&backup, &content)?;
                    run.info(format!("snapshotted existing {name} to {backup}"));
                    run.backups.push(BackupEntry {
                        original: name.to_string(),
                        backup,
                    });
                }
                None => run.created.push(name.to_string()),
            }
        }
        Ok(backed_up)
    }

    /// Re-read both canonical files and check them against what was written.
    fn validate(&self, expected_len: usize, converted_ids: &[String]) -> Vec<String> {
        let mut problems = Vec::new();
        let tasks_file = &self.config.tasks_file;

        match self.dir.read(tasks_file) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(items)) => {
                    if items.len() != expected_len {
                        problems.push(format!(
                            "{tasks_file} holds {} task(s), expected {expected_len}",
                            items.len()
                        ));
                    }
                    let ids: HashSet<&str> = items
                        .iter()
                        .filter_map(|item| item.get("id").and_then(Value::as_str))
                        .collect();
                    let missing = converted_ids
                        .iter()
                        .filter(|id| !ids.contains(id.as_str()))
                        .count();
                    if missing > 0 {
                        problems.push(format!("{missing} converted task id(s) missing from {tasks_file}"));
                    }
                    let complete = items.iter().filter(|item| has_required_fields(item)).count();
                    if !items.is_empty() {
                        let ratio = complete as f64 / items.len() as f64;
                        if ratio < self.config.required_field_ratio {
                            problems.push(format!(
                                "only {complete} of {} task(s) carry every required field",
                                items.len()
                            ));
                        }
                    }
                }
                Ok(_) => problems.push(format!("{tasks_file} is not a JSON array")),
                Err(e) => problems.push(format!("{tasks_file} does not parse: {e}")),
            },
            Ok(None) => problems.push(format!("{tasks_file} was not written")),
            Err(e) => problems.push(format!("could not re-read {tasks_file}: {e}")),
        }

        let markdown_file = &self.config.markdown_file;
        match self.dir.read(markdown_file) {
            Ok(Some(text)) if text.len() >= self.config.min_markdown_bytes => {}
            Ok(Some(text)) => problems.push(format!(
                "{markdown_file} is only {} bytes",
                text.len()
            )),
            Ok(None) => problems.push(format!("{markdown_file} was not written")),
            Err(e) => problems.push(format!("could not re-read {markdown_file}: {e}")),
        }
        problems
    }

    /// Put every backup back over its original, then drop canonical files
    /// this migration created. Best effort throughout.
    fn restore(&self, backups: &[BackupEntry], created: &[String]) -> RollbackResult {
        let mut result = RollbackResult::default();
        for entry in backups {
            let restored = self
                .dir
                .read(&entry.backup)
                .and_then(|content| {
                    let content = content.ok_or_else(|| {
                        Error::Migration(format!("backup {} is missing", entry.backup))
                    })?;
                    self.dir.write(&entry.original, &content)
                })
                .and_then(|()| self.dir.remove(&entry.backup));
            match restored {
                Ok(_) => {
                    tracing::info!(file = %entry.original, backup = %entry.backup, "restored from backup");
                    result.restored.push(entry.original.clone());
                }
                Err(e) => {
                    tracing::warn!(file = %entry.original, error = %e, "restore failed");
                    result.errors.push(format!("{}: {e}", entry.original));
                }
            }
        }
        for name in created {
            match self.dir.remove(name) {
                Ok(true) => result.removed.push(name.clone()),
                Ok(false) => {}
                Err(e) => result.errors.push(format!("{name}: {e}")),
            }
        }
        result.success = result.errors.is_empty();
        result
    }

    /// Undo the most recent migration using its in-memory record.
    pub fn rollback_migration(&mut self) -> RollbackResult {
        let Some(run) = self.last.as_mut() else {
            return RollbackResult {
                success: true,
                ..RollbackResult::default()
            };
        };
        let backups = std::mem::take(&mut run.backups);
        let created = std::mem::take(&mut run.created);
        let result = self.restore(&backups, &created);
        if let Some(run) = self.last.as_mut() {
            run.enter(if result.success {
                MigrationPhase::RolledBack
            } else {
                MigrationPhase::Failed
            });
            run.result.rolled_back = result.success;
        }
        result
    }

    /// Undo the most recent migration using only what is on disk.
    ///
    /// A migration stamps all of its backups with one timestamp; the newest
    /// stamp among legacy backups identifies the run. Canonical files without
    /// a backup from that run are treated as created by it and removed.
    pub fn rollback_from_disk(&self) -> RollbackResult {
        let names = match self.dir.list() {
            Ok(names) => names,
            Err(e) => {
                return RollbackResult {
                    errors: vec![format!("could not list {}: {e}", self.dir.location())],
                    ..RollbackResult::default()
                };
            }
        };

        let mut by_stamp: HashMap<&str, Vec<BackupEntry>> = HashMap::new();
        let originals: Vec<&str> = self
            .legacy_names()
            .into_iter()
            .map(|(_, n)| n)
            .chain(self.canonical_names())
            .collect();
        for name in &names {
            if !name.contains(BACKUP_MARKER) {
                continue;
            }
            for original in &originals {
                if let Some(stamp) = backup_suffix(name, original) {
                    by_stamp.entry(stamp).or_default().push(BackupEntry {
                        original: original.to_string(),
                        backup: name.clone(),
                    });
                }
            }
        }

        let legacy: Vec<&str> = self.legacy_names().into_iter().map(|(_, n)| n).collect();
        let latest = by_stamp
            .iter()
            .filter(|(_, entries)| entries.iter().any(|e| legacy.contains(&e.original.as_str())))
            .map(|(stamp, _)| *stamp)
            .max();
        let Some(stamp) = latest else {
            return RollbackResult {
                errors: vec!["no migration backups found".to_string()],
                ..RollbackResult::default()
            };
        };

        let backups = by_stamp.remove(stamp).unwrap_or_default();
        let created: Vec<String> = self
            .canonical_names()
            .into_iter()
            .filter(|name| !backups.iter().any(|b| b.original == *name))
            .map(str::to_string)
            .collect();
        self.restore(&backups, &created)
    }
}

fn has_required_fields(item: &Value) -> bool {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };
    ["id", "title", "comment", "selector", "status", "timestamp"]
        .into_iter()
        .all(text)
}
