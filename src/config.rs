//! Configuration Module
//!
//! Per-cache settings applied when wrapping a function.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a single cache.
///
/// All fields have usable defaults; setters chain so a config can be built
/// inline at the wrap site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoConfig {
    /// Time to live for cached results. `None` and `Some(Duration::ZERO)`
    /// both mean results never expire.
    pub ttl: Option<Duration>,
    /// Initial capacity of the backing map
    pub initial_capacity: usize,
    /// Name used to identify this cache in log lines
    pub name: String,
}

impl MemoConfig {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Builder Setters ==
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            initial_capacity: 0,
            name: "memocache".to_string(),
        }
    }
}
