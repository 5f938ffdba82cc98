//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a warden data root.
///
/// This struct represents the contents of `.warden/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Milliseconds after which an unrenewed lock holder is considered stale.
    #[serde(default = "default_lock_stale_timeout_ms")]
    pub lock_stale_timeout_ms: u64,

    /// Whether waiters remove stale holders while contending.
    #[serde(default = "default_true")]
    pub lock_auto_cleanup: bool,

    /// Milliseconds a store operation waits for its lock.
    #[serde(default = "default_lock_acquire_timeout_ms")]
    pub lock_acquire_timeout_ms: u64,

    /// Milliseconds between acquisition attempts under contention.
    #[serde(default = "default_lock_retry_interval_ms")]
    pub lock_retry_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_stale_timeout_ms: default_lock_stale_timeout_ms(),
            lock_auto_cleanup: default_true(),
            lock_acquire_timeout_ms: default_lock_acquire_timeout_ms(),
            lock_retry_interval_ms: default_lock_retry_interval_ms(),
        }
    }
}
