//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::StoreHandle;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// sweeps. The store lock is held only while a sweep runs, never while
/// sleeping. Without this task (or explicit `cleanup_expired` calls),
/// an expired entry is removed by the next lookup that touches it.
///
/// # Arguments
/// * `store` - shared handle to the store to sweep, obtained from
///   [`CachedFn::store_handle`](crate::memo::CachedFn::store_handle)
/// * `interval` - time between sweeps
///
/// # Returns
/// A `JoinHandle` for the spawned task, which can be used to abort the
/// task during shutdown.
///
/// # Example
/// ```ignore
/// let cached = wrap_with_ttl(expensive, Duration::from_secs(60));
/// let handle = spawn_cleanup_task(cached.store_handle(), Duration::from_secs(5));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(store: StoreHandle<V>, interval: Duration) -> JoinHandle<()>
where
    V: Send + 'static,
{
    tokio::spawn(async move {
        info!("cleanup task started (interval: {:?})", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.lock().cleanup_expired();

            if removed > 0 {
                info!("cleanup removed {} expired entries", removed);
            } else {
                debug!("cleanup found no expired entries");
            }
        }
    })
}
