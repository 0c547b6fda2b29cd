//! Cache Entry Module
//!
//! Defines the structure of a cached value with TTL support.

use std::time::{Duration, Instant};

/// A single cached value together with its expiration state.
///
/// Timestamps use [`Instant`], so expiration follows the monotonic clock
/// and is immune to wall-clock adjustments.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was created
    pub created_at: Instant,
    /// When the entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with an optional TTL.
    ///
    /// `None` and `Some(Duration::ZERO)` both produce an entry that never
    /// expires; a zero duration disables expiration rather than arming an
    /// already-expired entry.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        let created_at = Instant::now();
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| created_at.checked_add(ttl));

        Self {
            value,
            created_at,
            expires_at,
        }
    }

    // == Expiration Check ==
    /// Checks if the entry has expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() >= expires_at,
            None => false,
        }
    }

    // == TTL Remaining ==
    /// Returns the remaining time to live, `None` if the entry never
    /// expires, `Some(Duration::ZERO)` once it has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }
}
