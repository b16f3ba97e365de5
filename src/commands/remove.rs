use std::path::Path;

use colored::Colorize;

use crate::error::{Error, Result};
use crate::output::Format;
use crate::store::repo::Project;

pub fn run(root: &Path, id: &str, format: Format) -> Result<()> {
    let mut project = Project::open(root)?;
    if !project.store.remove_task_and_save(id)? {
        return Err(Error::NotFound(id.to_string()));
    }
    project.rebuild()?;
    match format {
        Format::Json => println!("{}", serde_json::json!({ "removed": id })),
        _ => println!("{} {id}", "removed".yellow()),
    }
    Ok(())
}
