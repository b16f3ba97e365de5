use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Status, Task, TaskInput};
use crate::store::backup_name;
use crate::store::capability::FileCapability;
use crate::store::notify::{self, ChangeHook, ChangeSource};

/// Whether the store has successfully read its file at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    Ready,
}

/// Where each task handed to [`TaskStore::import_tasks`] ended up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// Open tasks folded into a stored open task with the same content.
    pub folded: usize,
    /// Stored id for every input, in input order.
    pub ids: Vec<String>,
}

/// Authoritative task list for one project, mirrored into `tasks.json`.
///
/// Mutations without the `_and_save` suffix only touch memory; the file
/// catches up on the next [`TaskStore::save_to_file`].
pub struct TaskStore {
    dir: Arc<dyn FileCapability>,
    config: Config,
    tasks: Vec<Task>,
    readiness: Readiness,
    hook: Option<ChangeHook>,
}

impl TaskStore {
    pub fn new(dir: Arc<dyn FileCapability>, config: Config) -> Self {
        Self {
            dir,
            config,
            tasks: Vec::new(),
            readiness: Readiness::NotReady,
            hook: None,
        }
    }

    /// Construct and immediately load the canonical file.
    pub fn open(dir: Arc<dyn FileCapability>, config: Config) -> Result<Self> {
        let mut store = Self::new(dir, config);
        store.load_from_file()?;
        Ok(store)
    }

    pub fn with_hook(mut self, hook: ChangeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready && self.dir.is_available()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Another unresolved task with the same selector and comment as `task`.
    fn open_duplicate(&self, task: &Task) -> Option<&Task> {
        self.tasks.iter().find(|t| {
            t.id != task.id && !t.status.is_resolved() && t.content_key() == task.content_key()
        })
    }

    /// At most one unresolved task may exist per selector and comment.
    fn check_unique(&self, task: &Task) -> Result<()> {
        if task.status.is_resolved() {
            return Ok(());
        }
        match self.open_duplicate(task) {
            Some(other) => Err(Error::Validation(format!(
                "task {} is already open for '{}' with the same comment",
                other.id, task.selector
            ))),
            None => Ok(()),
        }
    }

    /// Add a task, merge into an existing one by id, or refresh a functional duplicate.
    pub fn add_task(&mut self, input: TaskInput) -> Result<Task> {
        if let Some(id) = input.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
            && let Some(pos) = self.position(id)
        {
            return self.merge_update(pos, input);
        }

        let title = input.required("title")?;
        let comment = input.required("comment")?;
        let selector = input.required("selector")?;
        let now = Utc::now();

        if let Some(existing) = self.tasks.iter_mut().find(|t| {
            !t.status.is_resolved() && t.content_key() == (selector.as_str(), comment.as_str())
        }) {
            existing.timestamp = now;
            if let Some(path) = input.screenshot_path.filter(|p| !p.trim().is_empty()) {
                existing.screenshot_path = path;
            }
            tracing::debug!(id = %existing.id, "refreshed functional duplicate");
            return Ok(existing.clone());
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            comment,
            selector,
            bounding_rect: input.bounding_rect.unwrap_or_default(),
            screenshot_path: input.screenshot_path.unwrap_or_default().trim().to_string(),
            status: Status::ToDo,
            timestamp: now,
            last_modified: None,
        };
        tracing::debug!(id = %task.id, selector = %task.selector, "added task");
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Overwrite only the fields present in `input`.
    fn merge_update(&mut self, pos: usize, input: TaskInput) -> Result<Task> {
        let mut next = self.tasks[pos].clone();
        if input.title.is_some() {
            next.title = input.required("title")?;
        }
        if input.comment.is_some() {
            next.comment = input.required("comment")?;
        }
        if input.selector.is_some() {
            next.selector = input.required("selector")?;
        }
        if let Some(rect) = input.bounding_rect {
            next.bounding_rect = rect;
        }
        if let Some(path) = input.screenshot_path {
            next.screenshot_path = path.trim().to_string();
        }
        if let Some(status) = input.status {
            next.status = status;
        }
        next.last_modified = Some(Utc::now());
        self.check_unique(&next)?;

        tracing::debug!(id = %next.id, "merge-updated task");
        self.tasks[pos] = next.clone();
        Ok(next)
    }

    /// Set the status of a task. `Ok(None)` when the id is unknown.
    pub fn update_status(&mut self, id: &str, status: &str) -> Result<Option<Task>> {
        let status = Status::parse(status)?;
        let Some(pos) = self.position(id) else {
            return Ok(None);
        };
        let mut next = self.tasks[pos].clone();
        next.status = status;
        next.last_modified = Some(Utc::now());
        self.check_unique(&next)?;
        self.tasks[pos] = next.clone();
        Ok(Some(next))
    }

    pub fn remove_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Newest first, for display.
    pub fn get_all(&self) -> Vec<Task> {
        let mut tasks = self.get_all_chronological();
        tasks.reverse();
        tasks
    }

    /// Oldest first. Every write and render goes through this order.
    pub fn get_all_chronological(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|t| t.timestamp);
        tasks
    }

    /// Insert already-built tasks (used by migration). Tasks whose id is
    /// already stored are skipped, and an open task whose selector and
    /// comment match a stored open task is folded into it.
    pub fn import_tasks(&mut self, tasks: Vec<Task>) -> Result<ImportReport> {
        for task in &tasks {
            task.validate()?;
        }
        let mut report = ImportReport::default();
        for task in tasks {
            if self.position(&task.id).is_some() {
                tracing::warn!(id = %task.id, "skipping import of task with existing id");
                report.ids.push(task.id);
                continue;
            }
            if !task.status.is_resolved()
                && let Some(open) = self.open_duplicate(&task)
            {
                tracing::debug!(id = %task.id, into = %open.id, "folded imported task into open duplicate");
                report.ids.push(open.id.clone());
                report.folded += 1;
                continue;
            }
            report.ids.push(task.id.clone());
            self.tasks.push(task);
            report.inserted += 1;
        }
        Ok(report)
    }

    /// Read `tasks.json`. A missing or blank file means an empty store; bad
    /// content is reported and memory is left as it was.
    pub fn load_from_file(&mut self) -> Result<()> {
        let file = self.config.tasks_file.clone();
        let tasks = match self.dir.read(&file)? {
            None => {
                tracing::debug!(file = %file, "no task file yet, starting empty");
                Vec::new()
            }
            Some(raw) if raw.trim().is_empty() => Vec::new(),
            Some(raw) => parse_tasks(&file, &raw)?,
        };
        tracing::debug!(file = %file, count = tasks.len(), "loaded tasks");
        self.tasks = tasks;
        self.readiness = Readiness::Ready;
        Ok(())
    }

    /// Validate everything in memory and atomically replace `tasks.json`.
    pub fn save_to_file(&mut self) -> Result<()> {
        let started = Instant::now();
        for task in &self.tasks {
            task.validate()?;
        }
        if self.config.backup_on_save {
            self.create_backup();
        }

        let ordered = self.get_all_chronological();
        let json = serde_json::to_string_pretty(&ordered)?;
        self.dir.write(&self.config.tasks_file, &json)?;
        self.readiness = Readiness::Ready;

        notify::fire(self.hook.as_ref(), ChangeSource::Save, &ordered, started.elapsed());
        Ok(())
    }

    pub fn add_task_and_save(&mut self, input: TaskInput) -> Result<Task> {
        let task = self.add_task(input)?;
        self.save_to_file()?;
        Ok(task)
    }

    pub fn update_status_and_save(&mut self, id: &str, status: &str) -> Result<Option<Task>> {
        let task = self.update_status(id, status)?;
        if task.is_some() {
            self.save_to_file()?;
        }
        Ok(task)
    }

    pub fn remove_task_and_save(&mut self, id: &str) -> Result<bool> {
        let removed = self.remove_task(id);
        if removed {
            self.save_to_file()?;
        }
        Ok(removed)
    }

    /// Snapshot the current list next to `tasks.json`. Best effort: a failure
    /// is logged and `None` returned.
    pub fn create_backup(&self) -> Option<String> {
        let name = backup_name(&self.config.tasks_file, Utc::now());
        let written = serde_json::to_string_pretty(&self.get_all_chronological())
            .map_err(Error::from)
            .and_then(|json| self.dir.write(&name, &json));
        match written {
            Ok(()) => {
                tracing::info!(backup = %name, "wrote task backup");
                Some(name)
            }
            Err(e) => {
                tracing::warn!(backup = %name, error = %e, "task backup failed");
                None
            }
        }
    }
}

/// Parse and validate the canonical JSON array.
pub fn parse_tasks(file: &str, raw: &str) -> Result<Vec<Task>> {
    let tasks: Vec<Task> = serde_json::from_str(raw).map_err(|e| Error::corrupt(file, e))?;
    let mut ids = HashSet::new();
    for task in &tasks {
        task.validate().map_err(|e| Error::corrupt(file, e))?;
        if !ids.insert(task.id.as_str()) {
            return Err(Error::corrupt(file, format!("duplicate task id {}", task.id)));
        }
    }
    Ok(tasks)
}
