use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Project;

pub fn run(root: &Path, id: &str, format: Format) -> Result<()> {
    let project = Project::open(root)?;
    let task = project.find(id)?;
    output::print_task(&task, format)
}
