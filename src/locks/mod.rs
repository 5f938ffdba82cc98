//! Cross-process reader/writer locks for warden.
//!
//! Every participant (thread, task, or process) that shares the data
//! directory coordinates through plain files under `.warden/locks/`. There is
//! no daemon and no in-memory registry; the filesystem is the only shared
//! state.
//!
//! # Model
//!
//! A resource is any logical name, usually a record path. It is held either
//! by one exclusive writer or by any number of shared readers:
//!
//! - a writer atomically creates the resource's exclusive marker, then checks
//!   for reader tokens and withdraws if it finds any;
//! - a reader publishes its own token, then checks for the marker and removes
//!   the token if one exists.
//!
//! Both markers and tokens carry a JSON holder record (owner, pid, host,
//! timestamps) used for diagnostics and staleness classification.
//!
//! # Crash Recovery
//!
//! A holder whose process has died, whose record is unreadable, or which has
//! not been renewed within the stale timeout is stale. With `auto_cleanup`
//! enabled, waiters remove stale blockers and retry immediately.
//!
//! # Usage
//!
//! Most callers should go through [`with_lock`], which releases on every exit
//! path. [`FileLock`] also releases when dropped.

mod engine;
mod error;
mod handle;
mod liveness;
mod markers;
mod metadata;
mod scoped;
mod staleness;
mod types;


pub use error::LockError;
pub use handle::FileLock;
pub use liveness::{Liveness, probe, probe_owner};
pub use markers::MarkerStore;
pub use metadata::{LockMetadata, METADATA_VERSION, MetadataError};
pub(crate) use metadata::owner_string;
pub use scoped::with_lock;
pub use staleness::StalenessDetector;
pub use types::{
    AcquireOptions, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_RETRY_INTERVAL, DEFAULT_STALE_TIMEOUT,
    HolderInfo, HolderKind, LockInfo, LockMode, LockOptions, LockStatus, StaleReason,
};
