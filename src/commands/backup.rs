use std::path::Path;

use crate::error::{Error, Result};
use crate::output::Format;
use crate::store::repo::Project;

pub fn run(root: &Path, format: Format) -> Result<()> {
    let project = Project::open(root)?;
    let Some(name) = project.store.create_backup() else {
        return Err(Error::Unavailable(format!(
            "could not write a backup of {}",
            project.config.tasks_file
        )));
    };
    match format {
        Format::Json => println!("{}", serde_json::json!({ "backup": name })),
        _ => println!("{name}"),
    }
    Ok(())
}
