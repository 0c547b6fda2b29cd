//! memocache - A lightweight memoizing cache with TTL expiration
//!
//! Wraps functions so repeat calls with the same arguments return a cached
//! result until it expires.
//!
//! ```
//! use std::time::Duration;
//! use memocache::wrap_with_ttl;
//!
//! let lookup = wrap_with_ttl(|user_id: u64| user_id * 7, Duration::from_secs(60));
//!
//! assert_eq!(lookup.call((6,)).unwrap(), 42); // computed
//! assert_eq!(lookup.call((6,)).unwrap(), 42); // served from cache
//! ```
//!
//! Async functions are wrapped through [`future`], which mirrors [`memo`].

pub mod config;
pub mod entry;
pub mod error;
pub mod future;
pub mod key;
pub mod memo;
pub mod stats;
pub mod store;
pub mod tasks;


pub use config::MemoConfig;
pub use entry::CacheEntry;
pub use error::{Result, UnhashableArgumentError};
pub use key::{CacheKey, KeyBuilder, KeyEncoder, KeyPart};
pub use memo::{
    try_wrap, try_wrap_with_config, try_wrap_with_ttl, wrap, wrap_with_config, wrap_with_ttl,
    CachedFn, MemoFn,
};
pub use stats::CacheStats;
pub use store::{CacheStore, StoreHandle};
pub use tasks::spawn_cleanup_task;
