#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-windowed in-memory cache.
//!
//! Each key holds one payload stamped with its fetch instant. An entry is
//! served from [`TimedCache::get`] only while younger than the TTL; after
//! that it is stale, not gone — [`TimedCache::get_stale`] still returns it,
//! because a caller whose refresh just failed prefers an old answer over
//! none. Only [`TimedCache::invalidate`] or a newer
//! [`TimedCache::put`] replaces an entry.
//!
//! The clock is injected so freshness transitions are testable without
//! sleeping.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No payload stored for the key.
    Empty,
    /// A payload is stored and younger than the TTL.
    Fresh,
    /// A payload is stored but at or past the TTL.
    Stale,
}

struct CacheSlot<V> {
    value: V,
    fetched_at: Instant,
}

/// A per-key payload cache with a fixed time-to-live.
pub struct TimedCache<K, V> {
    slots: BTreeMap<K, CacheSlot<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Ord, V> TimedCache<K, V> {
    /// Creates a cache with the given TTL on the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache with the given TTL and clock.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: BTreeMap::new(),
            ttl,
            clock,
        }
    }

    /// Returns the payload for `key` while it is fresh: strictly younger
    /// than the TTL. An entry whose age equals the TTL is already stale.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = self.slots.get(key)?;
        let now = self.clock.now();
        (now.duration_since(slot.fetched_at) < self.ttl).then_some(&slot.value)
    }

    /// Returns the payload for `key` regardless of freshness.
    ///
    /// This is the availability-over-consistency path: after a failed
    /// refresh, a stale payload beats no payload.
    #[must_use]
    pub fn get_stale(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Stores a payload for `key`, stamping the current instant. Replaces
    /// any previous payload for the key.
    pub fn put(&mut self, key: K, value: V) {
        self.slots.insert(
            key,
            CacheSlot {
                value,
                fetched_at: self.clock.now(),
            },
        );
    }

    /// Clears one entry, or every entry when `key` is `None`.
    pub fn invalidate(&mut self, key: Option<&K>) {
        match key {
            Some(key) => {
                self.slots.remove(key);
            }
            None => self.slots.clear(),
        }
    }

    /// Reports the lifecycle state of `key`.
    #[must_use]
    pub fn state(&self, key: &K) -> CacheState {
        self.slots.get(key).map_or(CacheState::Empty, |slot| {
            if self.clock.now().duration_since(slot.fetched_at) < self.ttl {
                CacheState::Fresh
            } else {
                CacheState::Stale
            }
        })
    }

    /// Number of stored entries, fresh or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K: Ord + fmt::Debug, V> fmt::Debug for TimedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedCache")
            .field("ttl", &self.ttl)
            .field("keys", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// A clock advanced by hand.
    struct ManualClock {
        origin: Instant,
        elapsed: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.elapsed.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + *self.elapsed.lock().unwrap()
        }
    }

    const TTL: Duration = Duration::from_secs(30);

    fn cache_on(clock: &Arc<ManualClock>) -> TimedCache<&'static str, u32> {
        TimedCache::with_clock(TTL, Arc::clone(clock) as Arc<dyn Clock>)
    }

    #[test]
    fn fresh_strictly_before_ttl_stale_exactly_at_ttl() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache_on(&clock);
        cache.put("datos", 7);

        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(cache.get(&"datos"), Some(&7));
        assert_eq!(cache.state(&"datos"), CacheState::Fresh);

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(&"datos"), None);
        assert_eq!(cache.state(&"datos"), CacheState::Stale);
    }

    #[test]
    fn stale_entries_survive_for_get_stale() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache_on(&clock);
        cache.put("datos", 7);

        clock.advance(TTL * 10);
        assert_eq!(cache.get(&"datos"), None);
        assert_eq!(cache.get_stale(&"datos"), Some(&7));
    }

    #[test]
    fn invalidate_all_empties_immediately_after_put() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache_on(&clock);
        cache.put("datos", 7);
        cache.put("timestamps", 9);

        cache.invalidate(None);
        assert_eq!(cache.get(&"datos"), None);
        assert_eq!(cache.get_stale(&"datos"), None);
        assert_eq!(cache.state(&"timestamps"), CacheState::Empty);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_one_leaves_the_rest() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache_on(&clock);
        cache.put("datos", 7);
        cache.put("timestamps", 9);

        cache.invalidate(Some(&"datos"));
        assert_eq!(cache.state(&"datos"), CacheState::Empty);
        assert_eq!(cache.get(&"timestamps"), Some(&9));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn newer_put_refreshes_a_stale_entry() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache_on(&clock);
        cache.put("datos", 7);

        clock.advance(TTL);
        assert_eq!(cache.state(&"datos"), CacheState::Stale);

        cache.put("datos", 8);
        assert_eq!(cache.get(&"datos"), Some(&8));
        assert_eq!(cache.state(&"datos"), CacheState::Fresh);
    }
}
