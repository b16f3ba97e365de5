use std::path::Path;

use crate::error::Result;
use crate::output::Format;
use crate::store::repo::Project;

/// Write `tasks.md` from the stored list, or print it with `stdout`.
pub fn run(root: &Path, stdout: bool, format: Format) -> Result<()> {
    let project = Project::open(root)?;
    let tasks = project.store.get_all_chronological();
    if stdout {
        print!("{}", project.markdown.render(&tasks));
        return Ok(());
    }
    project.markdown.rebuild(&tasks)?;
    report(&project, tasks.len(), format);
    Ok(())
}

pub(crate) fn report(project: &Project, count: usize, format: Format) {
    match format {
        Format::Json => println!(
            "{}",
            serde_json::json!({ "file": project.config.markdown_file, "tasks": count })
        ),
        _ => println!("wrote {} ({count} task(s))", project.config.markdown_file),
    }
}
