pub mod capability;
pub mod lock;
pub mod notify;
pub mod repo;
pub mod tasks;

use chrono::{DateTime, SecondsFormat, Utc};

/// Marker between an original file name and its backup timestamp.
pub const BACKUP_MARKER: &str = ".backup-";

/// `<original>.backup-<RFC 3339 millis with ':' replaced by '-'>`.
pub fn backup_name(original: &str, at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("{original}{BACKUP_MARKER}{stamp}")
}

/// If `name` is a backup of `original`, return its timestamp suffix.
pub fn backup_suffix<'a>(name: &'a str, original: &str) -> Option<&'a str> {
    name.strip_prefix(original)?.strip_prefix(BACKUP_MARKER)
}
