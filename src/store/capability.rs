use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::lock::FileLock;

/// Read/write access to named files inside one fixed project directory.
///
/// This is the only I/O primitive the store, renderer and migrator use. Names
/// are single path components; nothing outside the root is reachable.
pub trait FileCapability: Send + Sync {
    /// Human-readable location, used in log lines and error messages.
    fn location(&self) -> String;

    /// Whether the root can currently be used at all.
    fn is_available(&self) -> bool;

    /// Read a file, returning `None` when it does not exist.
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Replace the whole file. Readers see the old or the new content, never a mix.
    fn write(&self, name: &str, contents: &str) -> Result<()>;

    /// Delete a file, returning whether it existed.
    fn remove(&self, name: &str) -> Result<bool>;

    fn exists(&self, name: &str) -> Result<bool>;

    /// Names of the regular, non-hidden files in the root, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Reject anything that is not a plain file name.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || Path::new(name).is_absolute();
    if bad {
        return Err(Error::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Directory-backed capability.
///
/// Writes to the same name are serialized twice over: an in-process mutex per
/// name, and an fs2 advisory lock on `.locks/<name>.lock` for other processes.
pub struct ProjectDir {
    root: PathBuf,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProjectDir {
    /// Open an existing directory.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Unavailable(root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            guards: Mutex::new(HashMap::new()),
        })
    }

    /// Create the directory (and parents) if needed, then open it.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .map_err(|e| Error::persistence(&root.display().to_string(), e))?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join(".locks")
    }

    fn guard_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        guards
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding both the in-process and the on-disk lock for `name`.
    fn with_write_lock<T>(&self, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.guard_for(name);
        let _held: MutexGuard<'_, ()> = guard.lock().unwrap_or_else(|e| e.into_inner());

        let lock = FileLock::acquire(&self.locks_dir(), name)?;
        let result = f();
        lock.release()?;
        result
    }
}

impl FileCapability for ProjectDir {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.path(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::persistence(name, e)),
        }
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.path(name)?;
        if !self.is_available() {
            return Err(Error::Unavailable(self.location()));
        }
        self.with_write_lock(name, || {
            let tmp = self.root.join(format!(".{name}.tmp-{}", Uuid::new_v4()));
            let staged = (|| -> std::io::Result<()> {
                let mut file = fs::File::create(&tmp)?;
                file.write_all(contents.as_bytes())?;
                file.sync_all()?;
                fs::rename(&tmp, &path)
            })();
            if let Err(e) = staged {
                let _ = fs::remove_file(&tmp);
                return Err(Error::persistence(name, e));
            }
            tracing::debug!(file = name, bytes = contents.len(), "replaced file");
            Ok(())
        })
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path(name)?;
        self.with_write_lock(name, || match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::persistence(name, e)),
        })
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path(name)?.is_file())
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::persistence(&self.location(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
