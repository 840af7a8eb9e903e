//! Concurrent identifier map with opt-in eviction.
//!
//! Backs both the rate limit registry and the suspicious activity tracker.
//! Updates to a single identifier run under its shard lock, so a
//! read-modify-write closure is atomic with respect to other requests for the
//! same identifier.
//!
//! With the default [`EvictionPolicy`] nothing is ever removed and the map
//! grows with the number of distinct identifiers seen.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::EvictionConfig;

/// When identifiers may be dropped from a tracked map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Identifiers untouched for longer than this are removed by [`IdentifierMap::sweep`].
    pub idle_ttl: Option<Duration>,
    /// Upper bound on tracked identifiers; the least recently touched one is
    /// evicted to make room for a new identifier.
    pub max_entries: Option<usize>,
}

impl EvictionPolicy {
    /// Keep everything forever.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.idle_ttl.is_some() || self.max_entries.is_some()
    }
}

impl From<&EvictionConfig> for EvictionPolicy {
    fn from(config: &EvictionConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            idle_ttl: config.idle_ttl_secs.map(Duration::from_secs),
            max_entries: config.max_entries,
        }
    }
}

struct Slot<V> {
    value: V,
    last_seen: Instant,
}

/// Identifier-keyed state shared between request handlers.
pub struct IdentifierMap<V> {
    slots: DashMap<String, Slot<V>>,
    clock: Arc<dyn Clock>,
    policy: EvictionPolicy,
}

impl<V> IdentifierMap<V> {
    pub fn new(clock: Arc<dyn Clock>, policy: EvictionPolicy) -> Self {
        Self {
            slots: DashMap::new(),
            clock,
            policy,
        }
    }

    /// Run `update` against the state for `identifier`, creating it with
    /// `init` on first sight.
    ///
    /// `init` and `update` both receive the current instant. The closure runs
    /// while the identifier's shard is locked; it must not touch this map.
    pub fn update<R>(
        &self,
        identifier: &str,
        init: impl FnOnce(Instant) -> V,
        update: impl FnOnce(&mut V, Instant, bool) -> R,
    ) -> R {
        let now = self.clock.now();

        if let Some(max) = self.policy.max_entries {
            if !self.slots.contains_key(identifier) {
                while self.slots.len() >= max.max(1) {
                    if !self.evict_least_recent() {
                        break;
                    }
                }
            }
        }

        let mut created = false;
        let mut slot = self.slots.entry(identifier.to_string()).or_insert_with(|| {
            created = true;
            Slot {
                value: init(now),
                last_seen: now,
            }
        });
        slot.last_seen = now;
        update(&mut slot.value, now, created)
    }

    /// Remove identifiers idle for longer than the configured TTL.
    ///
    /// Returns how many were removed. A no-op when no TTL is configured.
    pub fn sweep(&self) -> usize {
        let Some(ttl) = self.policy.idle_ttl else {
            return 0;
        };
        let now = self.clock.now();
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| now.saturating_duration_since(slot.last_seen) <= ttl);
        before.saturating_sub(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.slots.contains_key(identifier)
    }

    fn evict_least_recent(&self) -> bool {
        // Collect the key first; removing while iterating would deadlock on the shard.
        let oldest = self
            .slots
            .iter()
            .min_by_key(|entry| entry.value().last_seen)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                tracing::debug!(identifier = %key, "Evicting least recently used identifier");
                self.slots.remove(&key).is_some()
            }
            None => false,
        }
    }
}
