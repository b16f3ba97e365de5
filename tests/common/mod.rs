#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use taskmirror::config::Config;
use taskmirror::error::{Error, Result};
use taskmirror::store::capability::{FileCapability, ProjectDir};

/// Wraps a real directory and refuses writes to names starting with `fail_on`.
pub struct FailingDir {
    inner: ProjectDir,
    fail_on: String,
}

impl FailingDir {
    pub fn new(root: &Path, fail_on: &str) -> Self {
        Self {
            inner: ProjectDir::open(root).unwrap(),
            fail_on: fail_on.to_string(),
        }
    }
}

impl FileCapability for FailingDir {
    fn location(&self) -> String {
        self.inner.location()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        if name.starts_with(&self.fail_on) {
            return Err(Error::Persistence {
                file: name.to_string(),
                source: std::io::Error::other("injected write failure"),
            });
        }
        self.inner.write(name, contents)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        self.inner.remove(name)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        self.inner.exists(name)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.inner.list()
    }
}

pub fn project(root: &Path) -> Arc<dyn FileCapability> {
    Arc::new(ProjectDir::open(root).unwrap())
}

pub fn failing(root: &Path, fail_on: &str) -> Arc<dyn FileCapability> {
    Arc::new(FailingDir::new(root, fail_on))
}

pub fn config() -> Config {
    Config::default()
}

/// Sorted names of every non-hidden file in `root`.
pub fn file_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}
