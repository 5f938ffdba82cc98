//! Holder record stored inside every marker and reader token.
//!
//! The record is advisory: it feeds diagnostics and staleness classification
//! but never decides mutual exclusion. Anything that fails to parse, or that
//! carries an unknown `version`, is reported as `MetadataError::Corrupt` and
//! the holder is treated as stale.

use super::types::LockMode;
use crate::fs::atomic_write;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Current holder record format.
pub const METADATA_VERSION: u32 = 1;

/// Why a holder record could not be loaded.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The marker or token no longer exists.
    #[error("holder record not found")]
    Missing,

    /// The file exists but does not hold a valid record.
    #[error("holder record is corrupt: {0}")]
    Corrupt(String),

    /// Reading failed for another reason.
    #[error("failed to read holder record: {0}")]
    Io(#[source] io::Error),
}

/// Lock holder metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Record format version.
    pub version: u32,

    /// Unique id of the handle that created the holder.
    pub token: String,

    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Host the owner process runs on.
    pub host: String,

    /// Process ID of the lock holder.
    pub pid: u32,

    /// Mode the holder was acquired in.
    pub mode: LockMode,

    /// When the holder was created.
    pub created_at: DateTime<Utc>,

    /// When the holder was last renewed. Never moves backwards.
    pub updated_at: DateTime<Utc>,
}

impl LockMetadata {
    /// Create a fresh record for the current process.
    pub fn new(token: &str, mode: LockMode) -> Self {
        let now = Utc::now();
        Self {
            version: METADATA_VERSION,
            token: token.to_string(),
            owner: owner_string(),
            host: local_hostname(),
            pid: std::process::id(),
            mode,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parse a record from JSON.
    pub fn from_json(content: &str) -> Result<Self, MetadataError> {
        let meta: LockMetadata =
            serde_json::from_str(content).map_err(|e| MetadataError::Corrupt(e.to_string()))?;

        if meta.version != METADATA_VERSION {
            return Err(MetadataError::Corrupt(format!(
                "unsupported record version {}",
                meta.version
            )));
        }

        Ok(meta)
    }

    /// Load a record from a marker or token file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MetadataError::Missing,
            io::ErrorKind::InvalidData => MetadataError::Corrupt(e.to_string()),
            _ => MetadataError::Io(e),
        })?;

        Self::from_json(&content)
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> String {
        // Plain strings, integers, and timestamps cannot fail to serialize.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Replace the record at `path` atomically.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        atomic_write(path, self.to_json().as_bytes())
    }

    /// Advance `updated_at` to now, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Time since the holder was created.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Time since the holder was last renewed.
    pub fn idle(&self) -> Duration {
        Utc::now().signed_duration_since(self.updated_at)
    }

    /// Whether the holder has gone unrenewed for longer than `stale_timeout`.
    pub fn is_expired(&self, stale_timeout: std::time::Duration) -> bool {
        match Duration::from_std(stale_timeout) {
            Ok(limit) => self.idle() > limit,
            Err(_) => false,
        }
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds.max(0))
        }
    }
}

/// Get the owner string for holder records.
pub(crate) fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, local_hostname())
}

pub(crate) fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_record_describes_current_process() {
        let meta = LockMetadata::new("tok", LockMode::Shared);

        assert_eq!(meta.version, METADATA_VERSION);
        assert_eq!(meta.pid, std::process::id());
        assert_eq!(meta.created_at, meta.updated_at);
        assert!(meta.owner.contains('@'));
        assert!(meta.age().num_seconds() < 5);
    }

    #[test]
    fn corrupt_and_foreign_versions_are_rejected() {
        assert!(matches!(
            LockMetadata::from_json("{not json"),
            Err(MetadataError::Corrupt(_))
        ));

        let mut meta = LockMetadata::new("tok", LockMode::Exclusive);
        meta.version = 99;
        assert!(matches!(
            LockMetadata::from_json(&meta.to_json()),
            Err(MetadataError::Corrupt(_))
        ));
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = LockMetadata::from_file(temp_dir.path().join("nope"));
        assert!(matches!(result, Err(MetadataError::Missing)));
    }

    #[test]
    fn write_to_replaces_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("exclusive");
        let mut meta = LockMetadata::new("tok", LockMode::Exclusive);
        meta.write_to(&path).unwrap();

        meta.pid = 424242;
        meta.write_to(&path).unwrap();

        let loaded = LockMetadata::from_file(&path).unwrap();
        assert_eq!(loaded.pid, 424242);
        assert_eq!(loaded.token, "tok");
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut meta = LockMetadata::new("tok", LockMode::Shared);
        let future = Utc::now() + Duration::hours(1);
        meta.updated_at = future;

        meta.touch();
        assert_eq!(meta.updated_at, future);

        meta.updated_at = Utc::now() - Duration::seconds(30);
        let before = meta.updated_at;
        meta.touch();
        assert!(meta.updated_at > before);
    }

    #[test]
    fn expiry_uses_updated_at() {
        let mut meta = LockMetadata::new("tok", LockMode::Shared);
        assert!(!meta.is_expired(std::time::Duration::from_secs(5)));

        meta.updated_at = Utc::now() - Duration::seconds(10);
        assert!(meta.is_expired(std::time::Duration::from_secs(5)));
        assert!(!meta.is_expired(std::time::Duration::from_secs(60)));
    }

    #[test]
    fn age_string_scales_units() {
        let mut meta = LockMetadata::new("tok", LockMode::Shared);
        assert!(meta.age_string().ends_with('s'));

        meta.created_at = Utc::now() - Duration::hours(2);
        assert!(meta.age_string().contains('h'));

        meta.created_at = Utc::now() - Duration::days(3);
        assert!(meta.age_string().contains('d'));
    }
}
