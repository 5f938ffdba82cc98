//! Staleness classification of holders.

use super::liveness::{Liveness, probe_owner};
use super::metadata::LockMetadata;
use super::types::StaleReason;
use std::time::Duration;

/// Decides whether a blocking holder may be removed.
///
/// A holder is stale when its record is unreadable, its owner process is
/// known to be dead, or it has not been renewed within `stale_timeout`. An
/// inconclusive liveness probe never makes a holder stale on its own.
#[derive(Debug, Clone, Copy)]
pub struct StalenessDetector {
    stale_timeout: Duration,
}

impl StalenessDetector {
    pub fn new(stale_timeout: Duration) -> Self {
        Self { stale_timeout }
    }

    pub fn stale_timeout(&self) -> Duration {
        self.stale_timeout
    }

    /// Classify a holder from its record (`None` when missing or corrupt).
    pub fn classify(&self, metadata: Option<&LockMetadata>) -> Option<StaleReason> {
        let Some(meta) = metadata else {
            return Some(StaleReason::UnreadableMetadata);
        };

        if probe_owner(meta) == Liveness::Dead {
            return Some(StaleReason::OwnerDead);
        }

        if meta.is_expired(self.stale_timeout) {
            return Some(StaleReason::Expired);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::LockMode;
    use chrono::Utc;

    fn detector() -> StalenessDetector {
        StalenessDetector::new(Duration::from_secs(5))
    }

    #[test]
    fn live_fresh_holder_is_not_stale() {
        let meta = LockMetadata::new("tok", LockMode::Exclusive);
        assert_eq!(detector().classify(Some(&meta)), None);
    }

    #[test]
    fn missing_record_is_stale() {
        assert_eq!(
            detector().classify(None),
            Some(StaleReason::UnreadableMetadata)
        );
    }

    #[cfg(unix)]
    #[test]
    fn dead_owner_is_stale_even_when_fresh() {
        let mut meta = LockMetadata::new("tok", LockMode::Exclusive);
        meta.pid = 999_999_999;
        assert_eq!(detector().classify(Some(&meta)), Some(StaleReason::OwnerDead));
    }

    #[test]
    fn expired_holder_is_stale_even_when_alive() {
        let mut meta = LockMetadata::new("tok", LockMode::Shared);
        meta.updated_at = Utc::now() - chrono::Duration::seconds(10);
        assert_eq!(detector().classify(Some(&meta)), Some(StaleReason::Expired));
    }

    #[test]
    fn inconclusive_liveness_falls_back_to_time() {
        let mut meta = LockMetadata::new("tok", LockMode::Shared);
        meta.host = "elsewhere.invalid".to_string();
        meta.pid = 999_999_999;
        assert_eq!(detector().classify(Some(&meta)), None);

        meta.updated_at = Utc::now() - chrono::Duration::seconds(10);
        assert_eq!(detector().classify(Some(&meta)), Some(StaleReason::Expired));
    }
}
