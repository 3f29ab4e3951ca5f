//! Per-record retry backoff for sync passes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::SyncSettings;

/// Ceiling for any configured retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct RetryState {
    failures: u32,
    next_attempt: Instant,
}

/// Exponential backoff keyed by record, kept in memory only.
#[derive(Debug)]
pub struct RetryTracker {
    base: Duration,
    max: Duration,
    records: HashMap<String, RetryState>,
}

impl RetryTracker {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.min(MAX_RETRY_DELAY);
        Self {
            base,
            max: max.max(base).min(MAX_RETRY_DELAY),
            records: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.backoff_base(), settings.backoff_max())
    }

    /// Delay applied after the given number of consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Whether the record must sit out the current pass.
    pub fn is_deferred(&self, key: &str, now: Instant) -> bool {
        self.records
            .get(key)
            .is_some_and(|state| state.next_attempt > now)
    }

    /// Register a failed upload and return the delay before the next try.
    pub fn record_failure(&mut self, key: &str, now: Instant) -> Duration {
        let failures = self
            .records
            .get(key)
            .map_or(1, |state| state.failures.saturating_add(1));
        let delay = self.delay_for(failures);
        self.records.insert(
            key.to_string(),
            RetryState {
                failures,
                next_attempt: now.checked_add(delay).unwrap_or(now),
            },
        );
        delay
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.records.get(key).map_or(0, |state| state.failures)
    }

    pub fn clear(&mut self, key: &str) {
        self.records.remove(key);
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_capped() {
        let tracker = RetryTracker::new(Duration::from_secs(2), Duration::from_secs(20));
        assert_eq!(tracker.delay_for(0), Duration::ZERO);
        assert_eq!(tracker.delay_for(1), Duration::from_secs(2));
        assert_eq!(tracker.delay_for(2), Duration::from_secs(4));
        assert_eq!(tracker.delay_for(4), Duration::from_secs(16));
        assert_eq!(tracker.delay_for(5), Duration::from_secs(20));
        assert_eq!(tracker.delay_for(64), Duration::from_secs(20));
    }

    #[test]
    fn failures_defer_until_delay_elapses() {
        let mut tracker = RetryTracker::new(Duration::from_secs(2), Duration::from_secs(300));
        let now = Instant::now();

        assert!(!tracker.is_deferred("inspections/a", now));
        tracker.record_failure("inspections/a", now);
        tracker.record_failure("inspections/a", now);
        assert_eq!(tracker.failures("inspections/a"), 2);

        assert!(tracker.is_deferred("inspections/a", now + Duration::from_secs(3)));
        assert!(!tracker.is_deferred("inspections/a", now + Duration::from_secs(4)));

        tracker.clear("inspections/a");
        assert_eq!(tracker.failures("inspections/a"), 0);
    }

    #[test]
    fn oversized_settings_are_capped() {
        let mut tracker =
            RetryTracker::new(Duration::from_secs(u64::MAX / 2), Duration::from_secs(u64::MAX));
        let now = Instant::now();

        assert_eq!(tracker.record_failure("sites/x", now), MAX_RETRY_DELAY);
        assert_eq!(tracker.record_failure("sites/x", now), MAX_RETRY_DELAY);
        assert!(tracker.is_deferred("sites/x", now + Duration::from_secs(60)));
        assert_eq!(tracker.delay_for(64), MAX_RETRY_DELAY);
    }

    #[test]
    fn zero_base_never_defers() {
        let mut tracker = RetryTracker::new(Duration::ZERO, Duration::ZERO);
        let now = Instant::now();
        tracker.record_failure("sites/x", now);
        assert!(!tracker.is_deferred("sites/x", now));
    }
}
