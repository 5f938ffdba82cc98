//! Lock type definitions, options, and information structures.

use super::metadata::LockMetadata;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default age after which an unrenewed holder is presumed dead.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time an `acquire` call waits before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between acquisition attempts under contention.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Access mode requested for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Any number of readers; excludes writers.
    Shared,
    /// A single writer; excludes readers and other writers.
    Exclusive,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who holds a resource, from the point of view of one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// No marker or reader token exists.
    Unlocked,
    /// This handle holds the resource.
    Locked,
    /// Some other holder has the resource.
    LockedByOther,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Unlocked => "UNLOCKED",
            LockStatus::Locked => "LOCKED",
            LockStatus::LockedByOther => "LOCKED_BY_OTHER",
        }
    }
}

/// Why a holder was classified as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The recorded owner process no longer exists.
    OwnerDead,
    /// The holder has not been renewed within the stale timeout.
    Expired,
    /// The holder record is missing, corrupt, or of an unknown version.
    UnreadableMetadata,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::OwnerDead => write!(f, "owner process is gone"),
            StaleReason::Expired => write!(f, "not renewed within stale timeout"),
            StaleReason::UnreadableMetadata => write!(f, "holder record unreadable"),
        }
    }
}

/// Kind of on-disk artifact representing a holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderKind {
    /// The exclusive marker.
    Exclusive,
    /// A reader token with its unique id.
    Reader { token: String },
}

/// Snapshot of one holder at a resource.
#[derive(Debug, Clone)]
pub struct HolderInfo {
    /// Marker or reader token.
    pub kind: HolderKind,

    /// Path of the artifact on disk.
    pub path: PathBuf,

    /// Parsed holder record, `None` when missing or corrupt.
    pub metadata: Option<LockMetadata>,

    /// Staleness classification at snapshot time.
    pub stale: Option<StaleReason>,
}

impl HolderInfo {
    pub fn is_stale(&self) -> bool {
        self.stale.is_some()
    }

    /// Token of the handle that created this holder, if known.
    pub fn token(&self) -> Option<&str> {
        match &self.kind {
            HolderKind::Reader { token } => Some(token),
            HolderKind::Exclusive => self.metadata.as_ref().map(|m| m.token.as_str()),
        }
    }

    pub fn mode(&self) -> LockMode {
        match self.kind {
            HolderKind::Exclusive => LockMode::Exclusive,
            HolderKind::Reader { .. } => LockMode::Shared,
        }
    }
}

impl std::fmt::Display for HolderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.metadata {
            Some(meta) => write!(
                f,
                "{} (owner: {}, pid: {}, age: {})",
                self.mode(),
                meta.owner,
                meta.pid,
                meta.age_string()
            )?,
            None => write!(f, "{} (no readable holder record)", self.mode())?,
        }
        if let Some(reason) = self.stale {
            write!(f, " STALE: {}", reason)?;
        }
        Ok(())
    }
}

/// Diagnostic snapshot returned by `FileLock::get_info`.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// Logical resource name.
    pub resource: String,

    /// Ownership relative to the inspecting handle.
    pub status: LockStatus,

    /// Whether any holder other than the inspecting handle is stale.
    pub is_stale: bool,

    /// Every holder found: the exclusive marker first, then reader tokens.
    pub holders: Vec<HolderInfo>,
}

impl LockInfo {
    /// The primary holder: the exclusive marker if present, else the first reader.
    pub fn holder(&self) -> Option<&HolderInfo> {
        self.holders.first()
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.resource, self.status.as_str())?;
        if !self.holders.is_empty() {
            write!(f, " ({} holder(s))", self.holders.len())?;
        }
        if self.is_stale {
            write!(f, ", STALE")?;
        }
        Ok(())
    }
}

/// Per-call acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Total time to wait before failing with `AcquireTimeout`.
    pub timeout: Duration,

    /// Pause between attempts while the resource is contended.
    pub retry_interval: Duration,

    /// Remove stale blocking holders while waiting.
    pub auto_cleanup: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_ACQUIRE_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            auto_cleanup: false,
        }
    }
}

impl AcquireOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }
}

/// Per-handle settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Age after which an unrenewed holder counts as stale.
    pub stale_timeout: Duration,

    /// Defaults used by `FileLock::acquire`.
    pub acquire: AcquireOptions,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale_timeout: DEFAULT_STALE_TIMEOUT,
            acquire: AcquireOptions::default(),
        }
    }
}

impl LockOptions {
    pub fn with_stale_timeout(mut self, stale_timeout: Duration) -> Self {
        self.stale_timeout = stale_timeout;
        self
    }

    pub fn with_acquire(mut self, acquire: AcquireOptions) -> Self {
        self.acquire = acquire;
        self
    }
}
