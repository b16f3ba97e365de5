use std::path::Path;
use std::sync::Arc;

use crate::config::{CONFIG_FILE, Config};
use crate::error::Result;
use crate::render::MarkdownGenerator;
use crate::store::capability::{FileCapability, ProjectDir};
use crate::store::tasks::TaskStore;

pub fn run(root: &Path) -> Result<()> {
    let dir: Arc<dyn FileCapability> = Arc::new(ProjectDir::create(root)?);

    let config = if dir.exists(CONFIG_FILE)? {
        Config::load(dir.as_ref())?
    } else {
        let config = Config::default();
        config.save(dir.as_ref())?;
        config
    };

    let mut store = TaskStore::open(Arc::clone(&dir), config.clone())?;
    if !dir.exists(&config.tasks_file)? {
        store.save_to_file()?;
    }
    MarkdownGenerator::new(dir, config).rebuild(&store.get_all_chronological())?;

    eprintln!("Initialized taskmirror in {}", root.display());
    Ok(())
}
