//! Bounded LRU store for query results.
//!
//! Entries never expire on their own. Past the staleness threshold a probe
//! still returns the old values; it additionally claims the right to refresh
//! the entry, so at most one refresh per key is in flight at a time. Only
//! capacity pressure removes entries, least recently used first. Purge and
//! close advance a generation counter; refreshes claimed before either
//! settle without writing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use linked_hash_map::LinkedHashMap;
use tokio::time::Instant;

use crate::config::CacheConfig;

/// A cached query outcome.
///
/// Failed fetches are cached as an empty value list, so a broken backend is
/// asked about a given key at most once per staleness window.
#[derive(Debug, Clone)]
struct CacheEntry {
    values: Vec<String>,
    refreshed_at: Instant,
    refreshing: bool,
}

/// Outcome of a successful cache probe.
#[derive(Debug, Clone)]
pub struct Hit {
    /// The cached values, possibly stale.
    pub values: Vec<String>,
    /// True when the entry went stale and this probe claimed its refresh.
    /// The caller is now responsible for scheduling one.
    pub refresh_due: bool,
    /// Generation observed by this probe. A claimed refresh quotes it back
    /// when it settles; a purge or close in between moves the generation
    /// and the late write is dropped.
    pub generation: u64,
}

/// Point-in-time counters for a [`QueryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
}

#[derive(Debug)]
struct CacheInner {
    entries: LinkedHashMap<String, CacheEntry>,
    generation: u64,
    closed: bool,
}

/// Thread-safe LRU cache keyed by the caller's cache-key strings.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl QueryCache {
    /// Create a cache bounded to `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LinkedHashMap::new(),
                generation: 0,
                closed: false,
            }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// Look up `key`, marking it most recently used.
    ///
    /// On a stale entry with no refresh in flight, the returned hit carries
    /// `refresh_due = true` and the in-flight flag is set; no other probe
    /// will claim the refresh until it completes or fails.
    pub fn probe(&self, key: &str) -> Option<Hit> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        let generation = inner.generation;
        let Some(entry) = inner.entries.get_refresh(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        self.hits.fetch_add(1, Ordering::Relaxed);
        let stale = entry.refreshed_at.elapsed() > CacheConfig::STALE_AFTER;
        let refresh_due = stale && !entry.refreshing;
        if refresh_due {
            entry.refreshing = true;
        }
        Some(Hit {
            values: entry.values.clone(),
            refresh_due,
            generation,
        })
    }

    /// Insert or replace `key` with freshly fetched values.
    pub fn store(&self, key: &str, values: Vec<String>) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        self.insert_locked(&mut inner, key, values);
    }

    /// Complete a refresh claimed at `generation` with new values.
    ///
    /// Dropped silently when the cache was purged or closed since the claim;
    /// a refresh settling late must not resurrect dropped entries.
    pub fn refresh_complete(&self, key: &str, values: Vec<String>, generation: u64) {
        let mut inner = self.lock();
        if inner.closed || inner.generation != generation {
            return;
        }
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        self.insert_locked(&mut inner, key, values);
    }

    /// Release a refresh claimed at `generation` without touching the entry.
    ///
    /// The timestamp stays stale, so the next probe claims a new refresh.
    pub fn refresh_failed(&self, key: &str, generation: u64) {
        let mut inner = self.lock();
        if inner.closed || inner.generation != generation {
            return;
        }
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.refreshing = false;
        }
    }

    /// Drop every entry, keeping the cache usable.
    ///
    /// Refreshes claimed before the purge settle without writing.
    pub fn purge(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.entries.clear();
    }

    /// Drop every entry and refuse all further writes.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.entries.clear();
        inner.closed = true;
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock().entries.len();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }

    fn insert_locked(&self, inner: &mut CacheInner, key: &str, values: Vec<String>) {
        if inner.entries.contains_key(key) {
            inner.entries.remove(key);
        } else if inner.entries.len() >= self.capacity {
            inner.entries.pop_front();
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        inner.entries.insert(
            key.to_owned(),
            CacheEntry {
                values,
                refreshed_at: Instant::now(),
                refreshing: false,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // No critical section leaves the map inconsistent.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
