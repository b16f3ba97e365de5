use std::path::Path;

use crate::error::Result;
use crate::model::Status;
use crate::output::{self, Format};
use crate::store::repo::Project;

/// Newest first, optionally filtered by status.
pub fn run(root: &Path, status: Option<Status>, format: Format) -> Result<()> {
    let project = Project::open(root)?;
    let mut tasks = project.store.get_all();
    if let Some(status) = status {
        tasks.retain(|t| t.status == status);
    }
    output::print_tasks(&tasks, format)
}
