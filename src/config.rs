use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::capability::FileCapability;

pub const CONFIG_FILE: &str = "taskmirror.json";

/// Per-project settings, read from `taskmirror.json` in the data directory.
/// Every field has a default so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tasks_file: String,
    pub markdown_file: String,
    pub legacy_stream_file: String,
    pub legacy_summary_file: String,
    pub legacy_detailed_file: String,
    pub comment_max_chars: usize,
    pub min_markdown_bytes: usize,
    pub required_field_ratio: f64,
    pub backup_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_file: "tasks.json".into(),
            markdown_file: "tasks.md".into(),
            legacy_stream_file: "annotations.jsonl".into(),
            legacy_summary_file: "todo.md".into(),
            legacy_detailed_file: "todo-detailed.md".into(),
            comment_max_chars: 100,
            min_markdown_bytes: 50,
            required_field_ratio: 0.9,
            backup_on_save: false,
        }
    }
}

impl Config {
    /// Load the config through the capability, falling back to defaults when absent.
    pub fn load(dir: &dyn FileCapability) -> Result<Self> {
        let Some(raw) = dir.read(CONFIG_FILE)? else {
            return Ok(Self::default());
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config =
            serde_json::from_str(&raw).map_err(|e| Error::corrupt(CONFIG_FILE, e))?;
        config.check()?;
        Ok(config)
    }

    pub fn save(&self, dir: &dyn FileCapability) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        dir.write(CONFIG_FILE, &json)
    }

    fn check(&self) -> Result<()> {
        if self.comment_max_chars < 4 {
            return Err(Error::corrupt(
                CONFIG_FILE,
                "comment_max_chars must be at least 4",
            ));
        }
        if !(0.0..=1.0).contains(&self.required_field_ratio) {
            return Err(Error::corrupt(
                CONFIG_FILE,
                "required_field_ratio must be between 0 and 1",
            ));
        }
        let mut names: Vec<&str> = vec![CONFIG_FILE];
        for name in [self.tasks_file.as_str(), self.markdown_file.as_str()]
            .into_iter()
            .chain(self.legacy_files())
        {
            if name.trim().is_empty() || names.contains(&name) {
                return Err(Error::corrupt(
                    CONFIG_FILE,
                    format!("file name '{name}' is empty or used twice"),
                ));
            }
            names.push(name);
        }
        Ok(())
    }

    /// Legacy artifact names, in the order the migrator probes them.
    pub fn legacy_files(&self) -> [&str; 3] {
        [
            &self.legacy_stream_file,
            &self.legacy_summary_file,
            &self.legacy_detailed_file,
        ]
    }
}
