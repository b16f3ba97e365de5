use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    ToDo,
    Doing,
    Done,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl Status {
    pub const ALL: [Status; 3] = [Status::ToDo, Status::Doing, Status::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToDo => "to-do",
            Self::Doing => "doing",
            Self::Done => "done",
        }
    }

    /// Map any known status word, canonical or legacy, onto the three states.
    ///
    /// Matching ignores case and treats `_`, `-` and spaces alike, so
    /// `In Progress`, `in_progress` and `in-progress` are the same word.
    pub fn from_alias(raw: &str) -> Option<Status> {
        let key: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        match key.as_str() {
            "todo" | "pending" | "open" | "new" | "inqueue" | "queued" => Some(Self::ToDo),
            "doing" | "inprogress" | "progress" | "sent" | "working" | "active" => {
                Some(Self::Doing)
            }
            "done" | "completed" | "complete" | "resolved" | "closed" | "fixed" | "x" => {
                Some(Self::Done)
            }
            _ => None,
        }
    }

    /// Strict parse used at the API boundary: unknown words are a validation error.
    pub fn parse(raw: &str) -> Result<Status> {
        Self::from_alias(raw).ok_or_else(|| {
            let expected: Vec<&str> = Self::ALL.iter().map(Status::as_str).collect();
            Error::Validation(format!(
                "unknown status '{raw}' (expected one of: {})",
                expected.join(", ")
            ))
        })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Screen geometry of the annotated element at capture time. Advisory only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, alias = "width")]
    pub w: f64,
    #[serde(default, alias = "height")]
    pub h: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub comment: String,
    pub selector: String,
    #[serde(default)]
    pub bounding_rect: BoundingRect,
    #[serde(default)]
    pub screenshot_path: String,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Task {
    /// Reject tasks whose required text fields are empty after trimming.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("id", &self.id),
            ("title", &self.title),
            ("comment", &self.comment),
            ("selector", &self.selector),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "task {} is missing required field '{field}'",
                    if self.id.is_empty() { "<no id>" } else { &self.id }
                )));
            }
        }
        Ok(())
    }

    pub fn has_screenshot(&self) -> bool {
        !self.screenshot_path.is_empty()
    }

    /// Key used for functional-duplicate detection.
    pub fn content_key(&self) -> (&str, &str) {
        (self.selector.trim(), self.comment.trim())
    }
}

/// Task-shaped data handed over by the capturing UI.
///
/// Every field is optional so the same shape serves creation and partial
/// merge-updates of an existing task.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_rect: Option<BoundingRect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl TaskInput {
    pub fn new(
        title: impl Into<String>,
        comment: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            comment: Some(comment.into()),
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    pub fn with_rect(mut self, rect: BoundingRect) -> Self {
        self.bounding_rect = Some(rect);
        self
    }

    /// Return the trimmed value of a required field, or a validation error.
    pub(crate) fn required(&self, field: &str) -> Result<String> {
        let value = match field {
            "title" => self.title.as_deref(),
            "comment" => self.comment.as_deref(),
            "selector" => self.selector.as_deref(),
            _ => None,
        };
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(Error::Validation(format!(
                "'{field}' is required and must not be empty"
            ))),
        }
    }
}
