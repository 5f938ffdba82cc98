//! The caller-facing lock handle.

use super::engine::AcquisitionEngine;
use super::error::LockError;
use super::markers::MarkerStore;
use super::staleness::StalenessDetector;
use super::types::{AcquireOptions, LockInfo, LockMode, LockOptions, LockStatus};
use tracing::{debug, warn};
use uuid::Uuid;

/// One participant's view of one resource.
///
/// A handle is a short-lived value: construct it, acquire, do the work,
/// release. Ownership is always re-derived from the filesystem; the in-memory
/// `held` flag only records which artifact this handle created. Dropping a
/// handle that still holds the resource releases it.
#[derive(Debug)]
pub struct FileLock {
    markers: MarkerStore,
    resource: String,
    token: String,
    options: LockOptions,
    held: Option<LockMode>,
}

impl FileLock {
    /// Create a handle with default options.
    pub fn new(markers: MarkerStore, resource: impl Into<String>) -> Self {
        Self::with_options(markers, resource, LockOptions::default())
    }

    pub fn with_options(
        markers: MarkerStore,
        resource: impl Into<String>,
        options: LockOptions,
    ) -> Self {
        Self {
            markers,
            resource: resource.into(),
            token: Uuid::new_v4().simple().to_string(),
            options,
            held: None,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Unique id written into every marker or token this handle creates.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Mode this handle currently holds, if any.
    pub fn held_mode(&self) -> Option<LockMode> {
        self.held
    }

    /// Acquire using the handle's default acquisition options.
    pub async fn acquire(&mut self, mode: LockMode) -> Result<(), LockError> {
        let options = self.options.acquire.clone();
        self.acquire_with(mode, &options).await
    }

    /// Acquire the resource in `mode`.
    ///
    /// Acquiring again in the mode already held is a no-op. Acquiring a
    /// different mode while holding one fails with `InvalidState`.
    pub async fn acquire_with(
        &mut self,
        mode: LockMode,
        options: &AcquireOptions,
    ) -> Result<(), LockError> {
        if let Some(held) = self.held {
            if held != mode {
                return Err(LockError::InvalidState {
                    resource: self.resource.clone(),
                    held,
                    requested: mode,
                });
            }
            if self.owns_artifact(held)? {
                return Ok(());
            }
            warn!(
                resource = %self.resource,
                %mode,
                "held lock disappeared from disk, acquiring again"
            );
            self.held = None;
        }

        let detector = StalenessDetector::new(self.options.stale_timeout);
        let engine = AcquisitionEngine::new(&self.markers, &self.resource, &self.token, detector);
        engine.acquire(mode, options).await?;

        self.held = Some(mode);
        Ok(())
    }

    /// Release this handle's marker or token.
    ///
    /// Succeeds without doing anything when nothing is held. A marker that
    /// was already removed, or now belongs to someone else, counts as
    /// released.
    pub fn release(&mut self) -> Result<(), LockError> {
        let Some(mode) = self.held else {
            return Ok(());
        };

        let removed = match mode {
            LockMode::Exclusive => {
                let token = self.token.as_str();
                self.markers.remove_exclusive_if(&self.resource, |current| {
                    current.is_none_or(|m| m.token == token)
                })?
            }
            LockMode::Shared => self.markers.remove_reader_token(&self.resource, &self.token)?,
        };

        if removed {
            debug!(resource = %self.resource, %mode, token = %self.token, "lock released");
        } else {
            debug!(resource = %self.resource, %mode, "lock was already gone at release");
        }

        self.held = None;
        Ok(())
    }

    /// Refresh `updated_at` on this handle's marker or token.
    ///
    /// Long-running holders call this more often than `stale_timeout` so
    /// waiters do not classify them as expired. Returns `false` when nothing
    /// is held or the artifact no longer belongs to this handle; a reaped
    /// marker is never put back.
    pub fn renew(&mut self) -> Result<bool, LockError> {
        let Some(mode) = self.held else {
            return Ok(false);
        };

        if self.markers.renew(&self.resource, mode, &self.token)? {
            return Ok(true);
        }

        warn!(resource = %self.resource, %mode, "cannot renew, lock is no longer ours");
        self.held = None;
        Ok(false)
    }

    /// Whether any holder (this handle or another) exists at the resource.
    pub fn is_locked(&self) -> Result<bool, LockError> {
        self.markers.has_any(&self.resource)
    }

    /// Read-only diagnostic snapshot of the resource.
    pub fn get_info(&self) -> Result<LockInfo, LockError> {
        let detector = StalenessDetector::new(self.options.stale_timeout);
        let mut holders = self.markers.holders(&self.resource)?;

        let mut mine = false;
        let mut is_stale = false;
        for holder in &mut holders {
            holder.stale = detector.classify(holder.metadata.as_ref());
            if holder.token() == Some(self.token.as_str()) {
                mine = true;
            } else if holder.stale.is_some() {
                is_stale = true;
            }
        }

        let status = if holders.is_empty() {
            LockStatus::Unlocked
        } else if mine {
            LockStatus::Locked
        } else {
            LockStatus::LockedByOther
        };

        Ok(LockInfo {
            resource: self.resource.clone(),
            status,
            is_stale,
            holders,
        })
    }

    /// Remove every marker and token at the resource, whoever holds them.
    ///
    /// Meant for operator-driven recovery; the acquisition loop never calls it.
    pub fn force_release(&mut self) -> Result<(), LockError> {
        let removed = self.markers.clear(&self.resource)?;
        self.held = None;
        warn!(resource = %self.resource, removed, "lock force-released");
        Ok(())
    }

    /// Remove anything on disk carrying this handle's token.
    ///
    /// Unlike `release`, this does not rely on the in-memory `held` flag, so
    /// it also sweeps up after an interrupted acquisition. Safe to repeat.
    pub fn cleanup(&mut self) -> Result<(), LockError> {
        let token = self.token.as_str();
        self.markers
            .remove_exclusive_if(&self.resource, |current| {
                current.is_some_and(|m| m.token == token)
            })?;
        self.markers.remove_reader_token(&self.resource, token)?;
        self.held = None;
        Ok(())
    }

    fn owns_artifact(&self, mode: LockMode) -> Result<bool, LockError> {
        let holder = match mode {
            LockMode::Exclusive => self.markers.read_exclusive(&self.resource)?,
            LockMode::Shared => self.markers.read_reader(&self.resource, &self.token)?,
        };
        Ok(holder.is_some_and(|h| match mode {
            LockMode::Exclusive => h.token() == Some(self.token.as_str()),
            LockMode::Shared => true,
        }))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.held.is_some()
            && let Err(e) = self.release()
        {
            warn!(resource = %self.resource, error = %e, "failed to release lock on drop");
        }
    }
}
