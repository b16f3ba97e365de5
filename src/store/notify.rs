use std::sync::Arc;
use std::time::Duration;

use crate::model::Task;

/// What produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// `tasks.json` was rewritten.
    Save,
    /// `tasks.md` was re-rendered.
    Rebuild,
    /// A legacy migration finished writing both canonical files.
    Migration,
}

/// Payload handed to the host after a successful save or rebuild.
#[derive(Debug)]
pub struct ChangeEvent<'a> {
    pub source: ChangeSource,
    /// The full task set, chronological.
    pub tasks: &'a [Task],
    pub elapsed: Duration,
}

/// Host callback fired after every successful save/rebuild so external views
/// can refresh. Return values are not expected.
pub type ChangeHook = Arc<dyn Fn(&ChangeEvent<'_>) + Send + Sync>;

pub(crate) fn fire(hook: Option<&ChangeHook>, source: ChangeSource, tasks: &[Task], elapsed: Duration) {
    if let Some(hook) = hook {
        hook(&ChangeEvent {
            source,
            tasks,
            elapsed,
        });
    }
}
