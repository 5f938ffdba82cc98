//! Acquire, run, release.

use super::error::LockError;
use super::handle::FileLock;
use super::markers::MarkerStore;
use super::types::{LockMode, LockOptions};
use std::future::Future;
use tracing::warn;

/// Run `f` while holding `resource` in `mode`.
///
/// A fresh handle is created for the call and released on every exit path.
/// If the returned future is dropped mid-flight the handle's `Drop` releases
/// the lock. When `f` fails, its error wins over a failed release; when `f`
/// succeeds, a failed release is reported.
pub async fn with_lock<T, E, F, Fut>(
    markers: &MarkerStore,
    resource: &str,
    mode: LockMode,
    options: &LockOptions,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let mut lock = FileLock::with_options(markers.clone(), resource, options.clone());
    lock.acquire(mode).await?;

    let outcome = f().await;
    let released = lock.release();

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(release_err.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            warn!(resource, error = %release_err, "failed to release lock after error");
            Err(e)
        }
    }
}
