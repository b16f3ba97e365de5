use std::path::Path;

use crate::error::Result;
use crate::output::Format;
use crate::store::repo::Project;

/// Re-read `tasks.json` after an external edit and re-render the mirror.
pub fn run(root: &Path, format: Format) -> Result<()> {
    let mut project = Project::open(root)?;
    project.store.load_from_file()?;
    project.rebuild()?;
    super::render::report(&project, project.store.len(), format);
    Ok(())
}
