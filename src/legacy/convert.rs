use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::legacy::{LegacyAnnotation, LegacySource};
use crate::model::{BoundingRect, Status, Task};
use crate::render::{collapse_whitespace, truncate_comment};

/// Selector recorded for legacy tasks that never captured one.
pub const UNKNOWN_SELECTOR: &str = "legacy:unknown";

const DERIVED_TITLE_CHARS: usize = 40;

/// Canonical tasks produced from legacy annotations.
#[derive(Debug, Default, Clone)]
pub struct Conversion {
    /// Newest first.
    pub tasks: Vec<Task>,
    /// Annotations folded into an earlier one instead of becoming a task.
    pub enhanced: usize,
    /// Annotations with neither comment nor title.
    pub dropped: usize,
    pub warnings: Vec<String>,
}

/// Work-in-progress task while sources are merged.
#[derive(Debug)]
struct Draft {
    sources: Vec<LegacySource>,
    origin: String,
    id: Option<String>,
    title: Option<String>,
    comment: Option<String>,
    selector: Option<String>,
    status: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    bounding_rect: Option<BoundingRect>,
    screenshot_path: Option<String>,
}

/// Compare comment text, tolerating whitespace differences and a `...`
/// truncation on either side.
fn comments_match(a: &str, b: &str) -> bool {
    let a = collapse_whitespace(a);
    let b = collapse_whitespace(b);
    if a == b {
        return true;
    }
    let prefix_of = |short: &str, long: &str| {
        short
            .strip_suffix("...")
            .map(str::trim_end)
            .is_some_and(|stem| !stem.is_empty() && long.starts_with(stem))
    };
    prefix_of(&a, &b) || prefix_of(&b, &a)
}

impl Draft {
    fn from_annotation(ann: &LegacyAnnotation) -> Self {
        Self {
            sources: vec![ann.source],
            origin: ann.describe(),
            id: None,
            title: ann.title.clone(),
            comment: ann.comment.clone(),
            selector: ann.selector.clone(),
            status: ann.status.clone(),
            timestamp: ann.timestamp,
            bounding_rect: ann.bounding_rect,
            screenshot_path: ann.screenshot_path.clone(),
        }
    }

    /// Same logical task: same comment, or same title where one side has no
    /// comment to contradict it.
    fn matches(&self, ann: &LegacyAnnotation) -> bool {
        if let (Some(a), Some(b)) = (&self.comment, &ann.comment) {
            return comments_match(a, b);
        }
        matches!((&self.title, &ann.title), (Some(a), Some(b)) if a == b)
    }

    /// Both open with the same selector and comment. Such records collapse
    /// even within one source.
    fn same_open_content(&self, ann: &LegacyAnnotation) -> bool {
        let open = |status: &Option<String>| {
            status
                .as_deref()
                .and_then(Status::from_alias)
                .is_none_or(|s| !s.is_resolved())
        };
        fn trimmed(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }
        open(&self.status)
            && open(&ann.status)
            && trimmed(&self.selector).is_some()
            && trimmed(&self.selector) == trimmed(&ann.selector)
            && trimmed(&self.comment).is_some()
            && trimmed(&self.comment) == trimmed(&ann.comment)
    }

    /// Fold a later annotation in. `authoritative` lets it replace fields
    /// that are already set; otherwise it only fills gaps.
    fn enhance(&mut self, ann: &LegacyAnnotation, authoritative: bool) {
        fn merge<T: Clone>(slot: &mut Option<T>, value: &Option<T>, overwrite: bool) {
            if value.is_some() && (overwrite || slot.is_none()) {
                slot.clone_from(value);
            }
        }
        if !self.sources.contains(&ann.source) {
            self.sources.push(ann.source);
        }
        merge(&mut self.selector, &ann.selector, authoritative);
        merge(&mut self.status, &ann.status, authoritative);
        merge(&mut self.timestamp, &ann.timestamp, authoritative);
        merge(&mut self.title, &ann.title, false);
        merge(&mut self.comment, &ann.comment, false);
        merge(&mut self.bounding_rect, &ann.bounding_rect, false);
        merge(&mut self.screenshot_path, &ann.screenshot_path, false);

        // A full comment beats a truncated one.
        if let (Some(mine), Some(theirs)) = (&self.comment, &ann.comment)
            && mine.ends_with("...")
            && !theirs.ends_with("...")
            && comments_match(mine, theirs)
        {
            self.comment = Some(theirs.clone());
        }
    }
}

fn claim_id(slot: &mut Option<String>, candidate: Option<&String>, used: &mut HashSet<String>) {
    if slot.is_some() {
        return;
    }
    if let Some(id) = candidate
        && used.insert(id.clone())
    {
        *slot = Some(id.clone());
    }
}

/// Merge annotations from every source into canonical tasks.
///
/// Sources are applied stream first, then detailed, then summary. A later
/// annotation describing a task already seen (same legacy id, same comment,
/// or same title) enhances it; the detailed format is the richest and may
/// override selector, status and creation time. `taken_ids` are ids already
/// in use in the target store and are never reused.
pub fn convert(
    annotations: &[LegacyAnnotation],
    taken_ids: &HashSet<String>,
    now: DateTime<Utc>,
) -> Conversion {
    let mut ordered: Vec<&LegacyAnnotation> = annotations.iter().collect();
    ordered.sort_by_key(|a| a.source);

    let mut used: HashSet<String> = taken_ids.clone();
    let mut drafts: Vec<Draft> = Vec::new();
    let mut out = Conversion::default();

    for ann in ordered {
        let by_id = ann
            .id
            .as_ref()
            .and_then(|id| drafts.iter().position(|d| d.id.as_ref() == Some(id)));
        // Within one source, only an explicit id or identical open content
        // links two records.
        let by_content = || {
            drafts.iter().position(|d| {
                (!d.sources.contains(&ann.source) && d.matches(ann)) || d.same_open_content(ann)
            })
        };

        match by_id.or_else(by_content) {
            Some(idx) => {
                let draft = &mut drafts[idx];
                let authoritative = by_id.is_some() || ann.source == LegacySource::Detailed;
                draft.enhance(ann, authoritative);
                if ann.source == LegacySource::Detailed {
                    claim_id(&mut draft.id, ann.id.as_ref(), &mut used);
                }
                out.enhanced += 1;
            }
            None => {
                let mut draft = Draft::from_annotation(ann);
                claim_id(&mut draft.id, ann.id.as_ref(), &mut used);
                drafts.push(draft);
            }
        }
    }

    for draft in drafts {
        let Some(task) = finish(draft, now, &mut used, &mut out.warnings) else {
            out.dropped += 1;
            continue;
        };
        // Defaults such as the unknown selector can make two drafts identical.
        if !task.status.is_resolved()
            && let Some(open) = out.tasks.iter_mut().find(|t| {
                !t.status.is_resolved() && t.content_key() == task.content_key()
            })
        {
            if open.screenshot_path.is_empty() {
                open.screenshot_path = task.screenshot_path;
            }
            open.timestamp = open.timestamp.min(task.timestamp);
            out.enhanced += 1;
            continue;
        }
        out.tasks.push(task);
    }
    out.tasks.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

fn finish(
    draft: Draft,
    now: DateTime<Utc>,
    used: &mut HashSet<String>,
    warnings: &mut Vec<String>,
) -> Option<Task> {
    let Some(comment) = draft.comment.clone().or_else(|| draft.title.clone()) else {
        warnings.push(format!("{}: dropped, no comment or title", draft.origin));
        return None;
    };
    let title = draft
        .title
        .clone()
        .unwrap_or_else(|| truncate_comment(&comment, DERIVED_TITLE_CHARS));
    let selector = draft.selector.clone().unwrap_or_else(|| {
        warnings.push(format!(
            "{}: no selector, recorded as {UNKNOWN_SELECTOR}",
            draft.origin
        ));
        UNKNOWN_SELECTOR.to_string()
    });
    let status = match draft.status.as_deref() {
        None => Status::ToDo,
        Some(raw) => Status::from_alias(raw).unwrap_or_else(|| {
            warnings.push(format!(
                "{}: unknown status '{raw}', using to-do",
                draft.origin
            ));
            Status::ToDo
        }),
    };
    let id = draft.id.unwrap_or_else(|| loop {
        let fresh = Uuid::new_v4().to_string();
        if used.insert(fresh.clone()) {
            break fresh;
        }
    });

    Some(Task {
        id,
        title,
        comment,
        selector,
        bounding_rect: draft.bounding_rect.unwrap_or_default(),
        screenshot_path: draft.screenshot_path.unwrap_or_default(),
        status,
        timestamp: draft.timestamp.unwrap_or(now),
        last_modified: None,
    })
}
