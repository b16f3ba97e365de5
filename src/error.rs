use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid task: {0}")]
    Validation(String),

    #[error("corrupt data in '{file}': {reason}")]
    CorruptData { file: String, reason: String },

    #[error("could not access '{file}': {source}")]
    Persistence {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("invalid file name '{0}' (must be a single path component)")]
    InvalidFileName(String),

    #[error("project directory unavailable: {0}")]
    Unavailable(String),

    #[error("locked by another writer: {0}")]
    Locked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::CorruptData { .. } => "corrupt_data",
            Self::Persistence { .. } => "persistence_error",
            Self::NotFound(_) => "not_found",
            Self::Migration(_) => "migration_error",
            Self::InvalidFileName(_) => "invalid_file_name",
            Self::Unavailable(_) => "unavailable",
            Self::Locked(_) => "locked",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    pub(crate) fn persistence(file: &str, source: std::io::Error) -> Self {
        Self::Persistence {
            file: file.to_string(),
            source,
        }
    }

    pub(crate) fn corrupt(file: &str, reason: impl std::fmt::Display) -> Self {
        Self::CorruptData {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
