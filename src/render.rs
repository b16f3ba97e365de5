//! Markdown mirror of the task list.
//!
//! Rendering is a pure function of the task slice plus the generation time;
//! the generated-at footer line is the only part that changes between two
//! renders of the same input.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::Config;
use crate::error::Result;
use crate::model::{Status, Task};
use crate::store::capability::FileCapability;
use crate::store::notify::{self, ChangeHook, ChangeSource};

pub const TITLE: &str = "# Tasks";
pub const EMPTY_PLACEHOLDER: &str = "_No tasks yet._";
pub const GENERATED_AT_PREFIX: &str = "_Source of truth: ";

/// Formatting knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub source_file: String,
    pub comment_max_chars: usize,
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self {
            source_file: config.tasks_file.clone(),
            comment_max_chars: config.comment_max_chars,
        }
    }
}

/// Per-status tallies shown in the summary line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub to_do: usize,
    pub doing: usize,
    pub done: usize,
}

impl StatusCounts {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            counts.total += 1;
            match task.status {
                Status::ToDo => counts.to_do += 1,
                Status::Doing => counts.doing += 1,
                Status::Done => counts.done += 1,
            }
        }
        counts
    }
}

/// Collapse runs of whitespace (newlines included) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace, then cut to `max_chars` characters ending in `...`.
pub fn truncate_comment(comment: &str, max_chars: usize) -> String {
    let flat = collapse_whitespace(comment);
    if flat.chars().count() > max_chars {
        let kept: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept.trim_end())
    } else {
        flat
    }
}

pub fn checkbox(status: Status) -> &'static str {
    if status.is_resolved() { "[x]" } else { "[ ]" }
}

/// Render the whole document. Never fails: invalid input produces a
/// well-formed document carrying an error message instead of the list.
pub fn render_markdown(tasks: &[Task], opts: &RenderOptions, now: DateTime<Utc>) -> String {
    let body = render_body(tasks, opts).unwrap_or_else(|e| {
        tracing::error!(error = %e, "could not render task list");
        format!("_Error generating task list: {}_\n", collapse_whitespace(&e.to_string()))
    });

    let mut doc = String::with_capacity(body.len() + 128);
    doc.push_str(TITLE);
    doc.push_str("\n\n");
    doc.push_str(&body);
    doc.push_str("\n---\n");
    let _ = writeln!(
        doc,
        "{GENERATED_AT_PREFIX}`{}`. Generated at {}._",
        opts.source_file,
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    doc
}

fn render_body(tasks: &[Task], opts: &RenderOptions) -> Result<String> {
    for task in tasks {
        task.validate()?;
    }

    let mut ordered: Vec<&Task> = tasks.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    let counts = StatusCounts::tally(ordered.iter().copied());
    let mut out = String::new();
    let _ = writeln!(
        out,
        "**Total**: {} | **To Do**: {} | **Doing**: {} | **Done**: {}",
        counts.total, counts.to_do, counts.doing, counts.done
    );
    out.push('\n');

    if ordered.is_empty() {
        out.push_str(EMPTY_PLACEHOLDER);
        out.push('\n');
        return Ok(out);
    }

    for (i, task) in ordered.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} {} – \"{}\"",
            i + 1,
            checkbox(task.status),
            collapse_whitespace(&task.title),
            truncate_comment(&task.comment, opts.comment_max_chars)
        );
    }
    Ok(out)
}

/// Owns the rendered-document file (`tasks.md`).
pub struct MarkdownGenerator {
    dir: Arc<dyn FileCapability>,
    config: Config,
    hook: Option<ChangeHook>,
}

impl MarkdownGenerator {
    pub fn new(dir: Arc<dyn FileCapability>, config: Config) -> Self {
        Self {
            dir,
            config,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: ChangeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.dir.is_available()
    }

    pub fn render(&self, tasks: &[Task]) -> String {
        self.render_at(tasks, Utc::now())
    }

    pub fn render_at(&self, tasks: &[Task], now: DateTime<Utc>) -> String {
        render_markdown(tasks, &RenderOptions::from(&self.config), now)
    }

    /// Atomically replace the markdown file with `text`.
    pub fn write_to_file(&self, text: &str) -> Result<()> {
        self.dir.write(&self.config.markdown_file, text)
    }

    /// Re-render `tasks` and write the result. The entry point after any mutation.
    pub fn rebuild(&self, tasks: &[Task]) -> Result<()> {
        let started = Instant::now();
        self.write_to_file(&self.render(tasks))?;
        tracing::debug!(file = %self.config.markdown_file, count = tasks.len(), "rebuilt markdown");
        notify::fire(self.hook.as_ref(), ChangeSource::Rebuild, tasks, started.elapsed());
        Ok(())
    }
}
