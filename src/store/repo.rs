use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{CONFIG_FILE, Config};
use crate::error::{Error, Result};
use crate::legacy::LegacyMigrator;
use crate::model::Task;
use crate::render::MarkdownGenerator;
use crate::store::capability::{FileCapability, ProjectDir};
use crate::store::tasks::TaskStore;

/// Everything a command needs for one data directory.
pub struct Project {
    pub dir: Arc<dyn FileCapability>,
    pub config: Config,
    pub store: TaskStore,
    pub markdown: MarkdownGenerator,
}

impl Project {
    /// Open the directory and load `tasks.json`. Fails on corrupt data.
    pub fn open(root: &Path) -> Result<Self> {
        let (dir, config) = open_dir(root)?;
        let store = TaskStore::open(Arc::clone(&dir), config.clone())?;
        let markdown = MarkdownGenerator::new(Arc::clone(&dir), config.clone());
        Ok(Self {
            dir,
            config,
            store,
            markdown,
        })
    }

    /// Re-render the markdown mirror from the in-memory list.
    pub fn rebuild(&self) -> Result<()> {
        self.markdown.rebuild(&self.store.get_all_chronological())
    }

    pub fn find(&self, id: &str) -> Result<Task> {
        self.store
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

/// Open the capability and config without touching the task list. Used by
/// commands that must work while `tasks.json` is unreadable.
pub fn open_dir(root: &Path) -> Result<(Arc<dyn FileCapability>, Config)> {
    let dir: Arc<dyn FileCapability> = Arc::new(ProjectDir::open(root)?);
    let config = Config::load(dir.as_ref())?;
    Ok((dir, config))
}

pub fn migrator(root: &Path) -> Result<LegacyMigrator> {
    let (dir, config) = open_dir(root)?;
    Ok(LegacyMigrator::new(dir, config))
}

/// Use `explicit` when given; otherwise walk up from the working directory
/// looking for a config file, settling on the working directory itself.
pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let cwd = std::env::current_dir()?;
    Ok(find_project_root(&cwd).unwrap_or(cwd))
}

pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(CONFIG_FILE).is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskInput;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_config_in_ancestor() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn explicit_dir_wins() {
        let dir = tempdir().unwrap();
        let root = resolve_root(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn open_loads_existing_tasks() {
        let dir = tempdir().unwrap();
        let mut project = Project::open(dir.path()).unwrap();
        let task = project
            .store
            .add_task_and_save(TaskInput::new("Btn", "make this blue", ".btn"))
            .unwrap();

        let reopened = Project::open(dir.path()).unwrap();
        assert_eq!(reopened.find(&task.id).unwrap(), task);
        assert!(matches!(reopened.find("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn open_rejects_corrupt_tasks_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tasks.json"), "not json").unwrap();
        assert!(matches!(
            Project::open(dir.path()),
            Err(Error::CorruptData { .. })
        ));
        assert!(open_dir(dir.path()).is_ok());
    }
}
