use std::path::Path;

use crate::error::{Error, Result};
use crate::output::{self, Format};
use crate::store::repo::Project;

/// Set a task's status. Accepts any recognised status alias.
pub fn run(root: &Path, id: &str, status: &str, format: Format) -> Result<()> {
    let mut project = Project::open(root)?;
    let task = project
        .store
        .update_status_and_save(id, status)?
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    project.rebuild()?;
    output::print_task(&task, format)
}
