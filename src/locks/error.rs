//! Error taxonomy for the lock subsystem.

use super::types::LockMode;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by lock handles and the scoped-use helper.
///
/// Contention and transient I/O failures are retried inside the acquisition
/// loop; only a deadline breach, an illegal mode change, or a non-acquisition
/// I/O failure crosses the public API.
#[derive(Error, Debug)]
pub enum LockError {
    /// The deadline passed before the lock could be acquired.
    #[error("timed out after {timeout:?} waiting for {mode} lock on '{resource}'")]
    AcquireTimeout {
        resource: String,
        mode: LockMode,
        timeout: Duration,
    },

    /// The handle already holds the resource in a different mode.
    #[error(
        "handle already holds a {held} lock on '{resource}'; release it before acquiring {requested}"
    )]
    InvalidState {
        resource: String,
        held: LockMode,
        requested: LockMode,
    },

    /// A filesystem operation failed for a reason other than contention.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        LockError::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            LockError::AcquireTimeout { .. } => "ACQUIRE_TIMEOUT",
            LockError::InvalidState { .. } => "INVALID_STATE",
            LockError::Io { .. } => "IO_ERROR",
        }
    }

    /// Whether the caller may simply retry later.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::AcquireTimeout { .. })
    }
}
