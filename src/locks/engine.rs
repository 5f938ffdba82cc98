//! Acquisition loop: attempt, classify blockers, back off, give up at the deadline.
//!
//! Waiting is done by polling with `tokio::time::sleep`, which suspends only
//! the calling task. Polling works on every filesystem, including network
//! mounts and sandboxes without change notification; the price is up to one
//! `retry_interval` of extra latency when the resource frees up.
//!
//! Waiters are not queued. Under sustained contention any waiter, and writers
//! facing a steady stream of readers in particular, can be starved until its
//! timeout expires.

use super::error::LockError;
use super::markers::MarkerStore;
use super::metadata::LockMetadata;
use super::staleness::StalenessDetector;
use super::types::{AcquireOptions, HolderInfo, HolderKind, LockMode};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, trace, warn};

/// Consecutive attempts allowed without sleeping after stale cleanup or a
/// vanished blocker.
const MAX_IMMEDIATE_RETRIES: u32 = 8;

/// Stand-in deadline distance for timeouts too large to add to `Instant::now()`.
const UNBOUNDED_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

enum Attempt {
    Acquired(LockMetadata),
    Blocked(Vec<HolderInfo>),
}

/// Drives one `acquire` call for one handle.
pub(crate) struct AcquisitionEngine<'a> {
    markers: &'a MarkerStore,
    resource: &'a str,
    token: &'a str,
    detector: StalenessDetector,
}

impl<'a> AcquisitionEngine<'a> {
    pub(crate) fn new(
        markers: &'a MarkerStore,
        resource: &'a str,
        token: &'a str,
        detector: StalenessDetector,
    ) -> Self {
        Self {
            markers,
            resource,
            token,
            detector,
        }
    }

    /// Retry until the lock is held or the deadline passes.
    ///
    /// I/O failures are retried like contention; if the last attempt before
    /// the deadline failed with I/O, that error is returned instead of
    /// `AcquireTimeout`. On failure nothing created by this call remains.
    pub(crate) async fn acquire(
        &self,
        mode: LockMode,
        options: &AcquireOptions,
    ) -> Result<LockMetadata, LockError> {
        let started = Instant::now();
        let deadline = started
            .checked_add(options.timeout)
            .unwrap_or_else(|| started + UNBOUNDED_WAIT);
        let mut last_error: Option<LockError> = None;
        let mut immediate_retries = 0;

        loop {
            let mut retry_now = false;

            match self.attempt(mode) {
                Ok(Attempt::Acquired(metadata)) => {
                    debug!(
                        resource = self.resource,
                        %mode,
                        token = self.token,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "lock acquired"
                    );
                    return Ok(metadata);
                }
                Ok(Attempt::Blocked(blockers)) => {
                    last_error = None;
                    trace!(
                        resource = self.resource,
                        %mode,
                        blockers = blockers.len(),
                        "lock contended"
                    );

                    if blockers.is_empty() {
                        // The blocker went away between our attempt and the read.
                        retry_now = true;
                    } else if options.auto_cleanup {
                        match self.remove_stale(&blockers) {
                            Ok(removed) => retry_now = removed > 0,
                            Err(e) => last_error = Some(e),
                        }
                    }
                }
                Err(e) => {
                    debug!(resource = self.resource, %mode, error = %e, "lock attempt failed, will retry");
                    last_error = Some(e);
                }
            }

            if retry_now && immediate_retries < MAX_IMMEDIATE_RETRIES {
                immediate_retries += 1;
                continue;
            }
            immediate_retries = 0;

            let now = Instant::now();
            if now >= deadline {
                debug!(resource = self.resource, %mode, timeout_ms = options.timeout.as_millis() as u64, "lock acquisition gave up");
                return Err(last_error.unwrap_or_else(|| LockError::AcquireTimeout {
                    resource: self.resource.to_string(),
                    mode,
                    timeout: options.timeout,
                }));
            }

            sleep(options.retry_interval.min(deadline - now)).await;
        }
    }

    fn attempt(&self, mode: LockMode) -> Result<Attempt, LockError> {
        let metadata = LockMetadata::new(self.token, mode);
        match mode {
            LockMode::Exclusive => self.attempt_exclusive(metadata),
            LockMode::Shared => self.attempt_shared(metadata),
        }
    }

    /// Win the marker first, then make sure no reader slipped in.
    fn attempt_exclusive(&self, metadata: LockMetadata) -> Result<Attempt, LockError> {
        if !self.markers.try_create_exclusive(self.resource, &metadata)? {
            let blockers = self.markers.read_exclusive(self.resource)?;
            return Ok(Attempt::Blocked(blockers.into_iter().collect()));
        }

        let readers = match self.markers.read_readers(self.resource) {
            Ok(readers) => readers,
            Err(e) => {
                if let Err(rollback) = self.withdraw_exclusive() {
                    warn!(resource = self.resource, error = %rollback, "failed to withdraw lock marker");
                }
                return Err(e);
            }
        };

        if readers.is_empty() {
            return Ok(Attempt::Acquired(metadata));
        }

        self.withdraw_exclusive()?;
        Ok(Attempt::Blocked(readers))
    }

    fn attempt_shared(&self, metadata: LockMetadata) -> Result<Attempt, LockError> {
        if self
            .markers
            .try_create_reader_token(self.resource, &metadata)?
        {
            return Ok(Attempt::Acquired(metadata));
        }

        let blockers = self.markers.read_exclusive(self.resource)?;
        Ok(Attempt::Blocked(blockers.into_iter().collect()))
    }

    /// Back out a marker this attempt created.
    fn withdraw_exclusive(&self) -> Result<bool, LockError> {
        let token = self.token;
        self.markers
            .remove_exclusive_if(self.resource, |current| {
                current.is_none_or(|m| m.token == token)
            })
    }

    /// Remove every stale blocker. Returns how many were removed.
    ///
    /// Each holder is re-read and re-classified under the namespace guard
    /// right before removal, so a holder that was replaced or renewed since
    /// the snapshot is left alone.
    fn remove_stale(&self, blockers: &[HolderInfo]) -> Result<usize, LockError> {
        let mut removed = 0;

        for holder in blockers {
            let Some(reason) = self.detector.classify(holder.metadata.as_ref()) else {
                continue;
            };

            let gone = match &holder.kind {
                HolderKind::Exclusive => {
                    let seen = holder.metadata.as_ref().map(|m| m.token.as_str());
                    self.markers.remove_exclusive_if(self.resource, |current| {
                        current.map(|m| m.token.as_str()) == seen
                            && self.detector.classify(current).is_some()
                    })?
                }
                HolderKind::Reader { token } => {
                    self.markers
                        .remove_reader_token_if(self.resource, token, |current| {
                            self.detector.classify(current).is_some()
                        })?
                }
            };

            if gone {
                removed += 1;
                info!(
                    resource = self.resource,
                    holder = %holder.mode(),
                    path = %holder.path.display(),
                    reason = %reason,
                    "removed stale lock holder"
                );
            }
        }

        Ok(removed)
    }
}
