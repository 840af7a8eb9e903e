//! Lazily refilled token bucket.

use std::time::{Duration, Instant};

/// A single-resource token bucket.
///
/// Tokens are recomputed on every access from the time elapsed since the last
/// refill; there is no background timer.
///
/// Precondition: `capacity` and `refill_rate` are strictly positive. The
/// bucket does not check this itself; [`RateLimitRegistry`](super::rate_limit::RateLimitRegistry)
/// never builds one otherwise. With non-positive values the bucket simply never
/// admits anything.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Try to take `n` tokens. Returns false and takes nothing if fewer than
    /// `n` are available after refilling.
    pub fn consume(&mut self, n: f64, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Tokens available at `now`.
    pub fn tokens(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Time until the bucket is full again, assuming no further consumption.
    pub fn time_to_full(&self) -> Duration {
        if self.refill_rate <= 0.0 || self.tokens >= self.capacity {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((self.capacity - self.tokens) / self.refill_rate)
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = self.last_refill.max(now);
    }
}
