//! In-memory LRU cache with per-entry TTL.
//!
//! Expiry is lazy: a stale entry keeps its slot until a `get` touches it
//! (or it is evicted as least-recently-used). One lock guards the entries and
//! the statistics together.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};

/// Counters kept for the lifetime of the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub sets: u64,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards counts as zero age.
        let age = (now - self.created_at).to_std().unwrap_or_default();
        age >= self.ttl
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    stats: CacheStats,
}

/// Thread-safe LRU cache with TTL support.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| {
            tracing::warn!("Cache capacity 0 requested, using 1");
            NonZeroUsize::MIN
        });

        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            capacity: capacity.get(),
            clock,
        }
    }

    /// Look up a live entry, marking it most-recently-used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let Inner { entries, stats } = &mut *guard;

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                stats.misses += 1;
                return None;
            }
        };

        if expired {
            entries.pop(key);
            stats.misses += 1;
            return None;
        }

        stats.hits += 1;
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace `key`. Evicts the least-recently-used entry when a
    /// new key arrives at capacity.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl,
        };

        let mut guard = self.inner.lock();
        let Inner { entries, stats } = &mut *guard;

        if !entries.contains(&key) && entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.pop_lru() {
                tracing::debug!("Cache evicted {}", evicted);
                stats.evictions += 1;
            }
        }

        entries.put(key, entry);
        stats.sets += 1;
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Stored entries, including expired ones not yet purged.
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
