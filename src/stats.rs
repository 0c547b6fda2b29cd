//! Cache Statistics Module
//!
//! Tracks cache performance metrics.

use serde::Serialize;

/// Counters describing how a cache has been used.
///
/// A lookup that finds a live entry is a hit. A lookup that finds nothing,
/// or finds an entry past its TTL, is a miss; the latter also counts as an
/// expiration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries removed because their TTL elapsed
    pub expired: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the hit rate as a percentage of all lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    // == Recording ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expired(&mut self) {
        self.expired += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
