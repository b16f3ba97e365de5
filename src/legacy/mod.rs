//! Upgrade path from the three historical on-disk formats to the canonical
//! `tasks.json` + `tasks.md` pair.
//!
//! - `parse`: tolerant, pure parsers, one per format.
//! - `convert`: merges parsed annotations into canonical tasks.
//! - `migrator`: detection, backup, write, validation, cleanup and rollback.

pub mod convert;
pub mod migrator;
pub mod parse;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::BoundingRect;

pub use convert::{Conversion, convert};
pub use migrator::{LegacyMigrator, MigrationPhase, MigrationRecord, MigrationResult, RollbackResult};

/// Which legacy artifact an annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacySource {
    /// Line-delimited JSON log, one annotation per line.
    Stream,
    /// Structured markdown with one section per task.
    Detailed,
    /// Numbered checkbox markdown.
    Summary,
}

impl std::fmt::Display for LegacySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Detailed => write!(f, "detailed"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// One task-shaped record recovered from any legacy format.
///
/// Every field is optional; the converter decides what is usable. Empty
/// strings never appear here, they are stored as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyAnnotation {
    pub source: LegacySource,
    /// Line number (stream, summary) or section number (detailed), 1-based.
    pub position: usize,
    pub id: Option<String>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub selector: Option<String>,
    /// Raw status word; mapped onto the canonical enum during conversion.
    pub status: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub bounding_rect: Option<BoundingRect>,
    pub screenshot_path: Option<String>,
}

impl LegacyAnnotation {
    pub fn new(source: LegacySource, position: usize) -> Self {
        Self {
            source,
            position,
            id: None,
            title: None,
            comment: None,
            selector: None,
            status: None,
            timestamp: None,
            bounding_rect: None,
            screenshot_path: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.is_none() && self.comment.is_none() && self.selector.is_none()
    }

    pub fn describe(&self) -> String {
        format!("{} #{}", self.source, self.position)
    }
}

/// Trim and turn empty text into `None`.
pub(crate) fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
