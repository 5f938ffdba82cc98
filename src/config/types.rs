//! Default value functions used by the Config struct.

use crate::locks::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_RETRY_INTERVAL, DEFAULT_STALE_TIMEOUT};

/// File name of the config inside the `.warden` directory.
pub const CONFIG_FILE: &str = "config.yaml";

pub(crate) fn default_lock_stale_timeout_ms() -> u64 {
    DEFAULT_STALE_TIMEOUT.as_millis() as u64
}

pub(crate) fn default_lock_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64
}

pub(crate) fn default_lock_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL.as_millis() as u64
}

pub(crate) fn default_true() -> bool {
    true
}
