use std::path::Path;

use crate::error::{Error, Result};
use crate::output::{self, Format};
use crate::store::repo;

/// Migrate legacy files, or with `dry_run` only report what would happen.
/// A failed migration prints its result and then returns an error.
pub fn run(root: &Path, dry_run: bool, format: Format) -> Result<()> {
    let mut migrator = repo::migrator(root)?;
    if dry_run {
        let plan = migrator.plan()?;
        return output::print_plan(plan.as_ref(), format);
    }

    let result = migrator.perform_migration();
    output::print_migration(&result, format)?;
    if result.success {
        Ok(())
    } else {
        Err(Error::Migration(
            result
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "migration did not complete".to_string()),
        ))
    }
}
