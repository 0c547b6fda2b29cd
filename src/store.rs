//! Cache Store Module
//!
//! Core keyed storage with TTL handling and statistics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::stats::CacheStats;

/// Shared, thread-safe handle to a [`CacheStore`].
///
/// The mutex guards individual map operations only; callers must not hold
/// it across slow work such as invoking the function being cached.
pub type StoreHandle<V> = Arc<Mutex<CacheStore<V>>>;

/// The backing store for cached results.
///
/// Expiration is lazy: an expired entry is dropped by the lookup that
/// discovers it, or by an explicit [`cleanup_expired`](Self::cleanup_expired)
/// sweep. Lookups therefore take `&mut self`.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Internal storage
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Usage statistics
    stats: CacheStats,
}

impl<V> CacheStore<V> {
    // == Constructors ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            stats: CacheStats::new(),
        }
    }

    // == Get ==
    /// Looks up a live entry, cloning its value out.
    ///
    /// Finding an expired entry removes it and counts both a miss and an
    /// expiration, so a subsequent insert for the key is a fresh entry.
    pub fn get(&mut self, key: &CacheKey) -> Option<V>
    where
        V: Clone,
    {
        match self.entries.get(key) {
            Some(entry) => {
                if entry.is_expired() {
                    self.entries.remove(key);
                    self.stats.record_expired();
                    self.stats.record_miss();
                    self.stats.set_total_entries(self.entries.len());
                    None
                } else {
                    self.stats.record_hit();
                    Some(entry.value.clone())
                }
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Insert ==
    /// Stores a value under `key`, replacing any existing entry and
    /// restarting its TTL.
    pub fn insert(&mut self, key: CacheKey, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry::new(value, ttl);
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Remove ==
    /// Removes an entry regardless of its expiration state, returning the
    /// stored value if one was present.
    pub fn remove(&mut self, key: &CacheKey) -> Option<V> {
        let removed = self.entries.remove(key).map(|entry| entry.value);
        if removed.is_some() {
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Clear ==
    /// Drops every entry. Cumulative counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Cleanup ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.entries.remove(&key);
            self.stats.record_expired();
        }
        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Inspection ==
    /// Whether a live entry exists for `key`. Does not touch statistics
    /// and does not evict.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.get(key).map_or(false, |entry| !entry.is_expired())
    }

    /// Number of entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the usage statistics.
    pub fn stats(&mut self) -> CacheStats {
        self.stats.set_total_entries(self.entries.len());
        self.stats.clone()
    }
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
