//! Long-horizon abuse detection.
//!
//! Counts requests per client over a coarse window. Once a client goes past
//! the threshold inside the detection window it stays flagged until the
//! window runs out. Records are reset only after the reset horizon, which is
//! longer than the detection window; between the two the count keeps growing
//! but is no longer reported.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::SuspiciousConfig;
use crate::observability::metrics;
use crate::security::store::{EvictionPolicy, IdentifierMap};

/// Request counter for one client.
#[derive(Debug, Clone, Copy)]
pub struct SuspiciousRecord {
    pub request_count: u64,
    pub window_start: Instant,
}

impl SuspiciousRecord {
    fn start(now: Instant) -> Self {
        Self {
            request_count: 1,
            window_start: now,
        }
    }
}

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspiciousPolicy {
    pub detection_window: Duration,
    /// Requests allowed inside the detection window before flagging.
    pub threshold: u64,
    pub reset_horizon: Duration,
}

impl Default for SuspiciousPolicy {
    fn default() -> Self {
        Self {
            detection_window: Duration::from_millis(300_000),
            threshold: 10,
            reset_horizon: Duration::from_millis(3_600_000),
        }
    }
}

impl From<&SuspiciousConfig> for SuspiciousPolicy {
    fn from(config: &SuspiciousConfig) -> Self {
        Self {
            detection_window: Duration::from_millis(config.detection_window_ms),
            threshold: config.threshold,
            reset_horizon: Duration::from_millis(config.reset_horizon_ms),
        }
    }
}

/// Process-wide suspicious activity tracker.
pub struct SuspiciousActivityTracker {
    records: IdentifierMap<SuspiciousRecord>,
    policy: SuspiciousPolicy,
}

impl SuspiciousActivityTracker {
    pub fn new(clock: Arc<dyn Clock>, policy: SuspiciousPolicy, eviction: EvictionPolicy) -> Self {
        Self {
            records: IdentifierMap::new(clock, eviction),
            policy,
        }
    }

    /// Record a request from `identifier`; returns true when it is flagged.
    ///
    /// The request that takes a client past the threshold inside the detection
    /// window is the first one flagged. Flagged requests are not counted.
    pub fn check_suspicious(&self, identifier: &str) -> bool {
        let policy = self.policy;
        let flagged = self.records.update(
            identifier,
            SuspiciousRecord::start,
            |record, now, created| {
                if created {
                    return false;
                }

                let elapsed = now.saturating_duration_since(record.window_start);
                if elapsed < policy.detection_window && record.request_count + 1 > policy.threshold {
                    return true;
                }

                if elapsed > policy.reset_horizon {
                    *record = SuspiciousRecord::start(now);
                } else {
                    record.request_count += 1;
                }
                false
            },
        );

        metrics::record_tracked_identifiers("suspicious", self.records.len());
        if flagged {
            tracing::warn!(client = %identifier, "Suspicious activity detected");
        }
        flagged
    }

    /// Drop idle records according to the eviction policy.
    pub fn sweep(&self) -> usize {
        let removed = self.records.sweep();
        metrics::record_tracked_identifiers("suspicious", self.records.len());
        removed
    }

    pub fn tracked(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn tracker() -> (Arc<MockClock>, SuspiciousActivityTracker) {
        let clock = Arc::new(MockClock::new());
        let tracker = SuspiciousActivityTracker::new(
            clock.clone(),
            SuspiciousPolicy::default(),
            EvictionPolicy::disabled(),
        );
        (clock, tracker)
    }

    #[test]
    fn test_eleventh_request_in_window_is_flagged() {
        let (clock, tracker) = tracker();
        for _ in 0..10 {
            assert!(!tracker.check_suspicious("10.0.0.1"));
            clock.advance(Duration::from_millis(50));
        }
        assert!(tracker.check_suspicious("10.0.0.1"));
        // Flag sticks for the rest of the window.
        assert!(tracker.check_suspicious("10.0.0.1"));
        clock.advance(Duration::from_secs(200));
        assert!(tracker.check_suspicious("10.0.0.1"));
    }

    #[test]
    fn test_ten_requests_never_flagged() {
        let (clock, tracker) = tracker();
        for _ in 0..10 {
            assert!(!tracker.check_suspicious("10.0.0.2"));
            clock.advance(Duration::from_millis(100));
        }
    }

    #[test]
    fn test_grace_zone_between_window_and_horizon() {
        let (clock, tracker) = tracker();
        for _ in 0..11 {
            tracker.check_suspicious("10.0.0.3");
        }
        // Past the detection window but inside the reset horizon.
        clock.advance(Duration::from_secs(301));
        assert!(!tracker.check_suspicious("10.0.0.3"));
        assert!(!tracker.check_suspicious("10.0.0.3"));
    }

    #[test]
    fn test_reset_after_horizon() {
        let (clock, tracker) = tracker();
        for _ in 0..15 {
            tracker.check_suspicious("10.0.0.4");
        }
        assert!(tracker.check_suspicious("10.0.0.4"));

        clock.advance(Duration::from_secs(3601));
        assert!(!tracker.check_suspicious("10.0.0.4"));

        // Fresh window: ten more requests are fine again.
        for _ in 0..9 {
            assert!(!tracker.check_suspicious("10.0.0.4"));
        }
        assert!(tracker.check_suspicious("10.0.0.4"));
    }

    #[test]
    fn test_clients_are_tracked_separately() {
        let (_clock, tracker) = tracker();
        for _ in 0..11 {
            tracker.check_suspicious("10.0.0.5");
        }
        assert!(tracker.check_suspicious("10.0.0.5"));
        assert!(!tracker.check_suspicious("10.0.0.6"));
        assert_eq!(tracker.tracked(), 2);
    }

    #[test]
    fn test_custom_policy() {
        let clock = Arc::new(MockClock::new());
        let policy = SuspiciousPolicy {
            detection_window: Duration::from_secs(10),
            threshold: 2,
            reset_horizon: Duration::from_secs(20),
        };
        let tracker = SuspiciousActivityTracker::new(clock, policy, EvictionPolicy::disabled());
        assert!(!tracker.check_suspicious("c"));
        assert!(!tracker.check_suspicious("c"));
        assert!(tracker.check_suspicious("c"));
    }

    #[test]
    fn test_concurrent_checks_flag_exactly_past_threshold() {
        let (_clock, tracker) = tracker();
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| !tracker.check_suspicious("10.9.9.9"))
                        .count()
                })
            })
            .collect();

        let unflagged: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(unflagged, 10);
    }
}
