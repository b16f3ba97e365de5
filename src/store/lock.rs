use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Exclusive advisory lock on `<locks_dir>/<name>.lock`, shared by every
/// process writing the same data file. Released on `release` or drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock for `name` is held.
    pub fn acquire(locks_dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(locks_dir).map_err(|e| Error::persistence(name, e))?;
        let path = locks_dir.join(format!("{name}.lock"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::persistence(name, e))?;
        file.lock_exclusive()
            .map_err(|e| Error::Locked(format!("{}: {e}", path.display())))?;
        tracing::trace!(lock = %path.display(), "lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) -> Result<()> {
        self.file
            .unlock()
            .map_err(|e| Error::Locked(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn held_lock_excludes_other_handles() {
        let dir = tempdir().unwrap();
        let lock = FileLock::acquire(dir.path(), "tasks.json").unwrap();

        let other = File::open(lock.path()).unwrap();
        assert!(other.try_lock_exclusive().is_err());

        lock.release().unwrap();
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn lock_dir_and_file_are_created_on_demand() {
        let dir = tempdir().unwrap();
        let locks = dir.path().join(".locks");
        let lock = FileLock::acquire(&locks, "fresh.md").unwrap();
        assert_eq!(lock.path(), locks.join("fresh.md.lock"));
        assert!(lock.path().exists());
    }
}
