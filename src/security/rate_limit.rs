//! Per-identifier rate limiting.
//!
//! Each identifier gets its own [`TokenBucket`], created on first sight with
//! `capacity = limit` and a refill rate that fills the bucket over `window_ms`.
//!
//! # First writer wins
//! Bucket parameters are fixed when the bucket is created. Later calls for the
//! same identifier with a different `limit` or `window_ms` reuse the existing
//! bucket and their parameters are ignored. Callers that need different limits
//! must use different identifiers (e.g. by prefixing the endpoint name).

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::observability::metrics;
use crate::security::store::{EvictionPolicy, IdentifierMap};
use crate::security::token_bucket::TokenBucket;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Bucket capacity in effect for the identifier.
    pub limit: u32,
    /// Whole tokens left after this check.
    pub remaining: u32,
    /// Time until the bucket is full again.
    pub reset_after: Duration,
}

impl RateLimitDecision {
    fn refused(limit: u32) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_after: Duration::ZERO,
        }
    }
}

/// Process-wide registry of token buckets.
pub struct RateLimitRegistry {
    buckets: IdentifierMap<TokenBucket>,
}

impl RateLimitRegistry {
    pub fn new(clock: Arc<dyn Clock>, eviction: EvictionPolicy) -> Self {
        Self {
            buckets: IdentifierMap::new(clock, eviction),
        }
    }

    /// Take one token from the bucket for `identifier`.
    pub fn check_rate_limit(&self, identifier: &str, limit: u32, window_ms: u64) -> bool {
        self.check(identifier, limit, window_ms).allowed
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit) but reports remaining
    /// capacity for response headers.
    ///
    /// A zero `limit` or `window_ms` is refused outright and no bucket is created.
    pub fn check(&self, identifier: &str, limit: u32, window_ms: u64) -> RateLimitDecision {
        if limit == 0 || window_ms == 0 {
            tracing::warn!(
                identifier = %identifier,
                limit,
                window_ms,
                "Refusing rate limit check with non-positive parameters"
            );
            return RateLimitDecision::refused(limit);
        }

        let decision = self.buckets.update(
            identifier,
            |now| {
                let capacity = f64::from(limit);
                let refill_rate = capacity / (window_ms as f64 / 1000.0);
                TokenBucket::new(capacity, refill_rate, now)
            },
            |bucket, now, _| {
                let allowed = bucket.consume(1.0, now);
                RateLimitDecision {
                    allowed,
                    limit: bucket.capacity() as u32,
                    remaining: bucket.tokens(now).floor() as u32,
                    reset_after: bucket.time_to_full(),
                }
            },
        );

        metrics::record_tracked_identifiers("rate_limit", self.buckets.len());
        if !decision.allowed {
            tracing::debug!(identifier = %identifier, "Token bucket empty");
        }
        decision
    }

    /// Drop idle buckets according to the eviction policy.
    pub fn sweep(&self) -> usize {
        let removed = self.buckets.sweep();
        metrics::record_tracked_identifiers("rate_limit", self.buckets.len());
        removed
    }

    /// Number of identifiers currently holding a bucket.
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
