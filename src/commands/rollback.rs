use std::path::Path;

use crate::error::{Error, Result};
use crate::output::{self, Format};
use crate::store::repo;

/// Undo the latest migration from the backups it left on disk.
pub fn run(root: &Path, format: Format) -> Result<()> {
    let migrator = repo::migrator(root)?;
    let result = migrator.rollback_from_disk();
    output::print_rollback(&result, format)?;
    if result.success {
        Ok(())
    } else {
        Err(Error::Migration(result.errors.join("; ")))
    }
}
