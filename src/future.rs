//! Async Memoization Module
//!
//! Twin of [`crate::memo`] for async functions and future-returning
//! closures. Types mirror the sync module; import them through this module
//! rather than the crate root, e.g. `memocache::future::wrap`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::MemoConfig;
use crate::error::Result;
use crate::key::{CacheKey, KeyBuilder};
use crate::store::{CacheStore, StoreHandle};

// == Async Memoized Function Trait ==
/// An async callable that can be memoized.
///
/// Implemented for every `Fn` of arity 0 through 8 that returns a future
/// and whose arguments all implement [`KeyPart`](crate::key::KeyPart).
pub trait AsyncMemoFn<Args> {
    /// What the returned future resolves to.
    type Output;
    /// The future returned by one invocation.
    type Fut: Future<Output = Self::Output>;

    /// Derives the cache key for an argument tuple.
    fn cache_key(args: &Args) -> Result<CacheKey>;

    /// Starts one invocation.
    fn invoke(&self, args: Args) -> Self::Fut;
}

macro_rules! impl_async_memo_fn {
    ($($ty:ident => $idx:tt),*) => {
        impl<Func, Fut, $($ty),*> AsyncMemoFn<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Fut,
            Fut: Future,
            $($ty: crate::key::KeyPart,)*
        {
            type Output = Fut::Output;
            type Fut = Fut;

            fn cache_key(_args: &($($ty,)*)) -> Result<CacheKey> {
                #[allow(unused_mut)]
                let mut builder = KeyBuilder::new();
                $(builder.positional(&_args.$idx)?;)*
                Ok(builder.finish())
            }

            fn invoke(&self, _args: ($($ty,)*)) -> Fut {
                (self)($(_args.$idx),*)
            }
        }
    };
}

impl_async_memo_fn!();
impl_async_memo_fn!(T1 => 0);
impl_async_memo_fn!(T1 => 0, T2 => 1);
impl_async_memo_fn!(T1 => 0, T2 => 1, T3 => 2);
impl_async_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3);
impl_async_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4);
impl_async_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5);
impl_async_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5, T7 => 6);
impl_async_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5, T7 => 6, T8 => 7);

// == Cached Async Function ==
/// An async function together with its result cache.
///
/// The store lock is released before the wrapped future is awaited and
/// never held across an await point, so `call` futures stay `Send` and
/// concurrent callers are not serialized behind a slow computation.
pub struct CachedFn<F, A, V> {
    func: F,
    config: MemoConfig,
    store: StoreHandle<V>,
    _args: PhantomData<fn(A)>,
}

impl<F, A, V> CachedFn<F, A, V>
where
    F: AsyncMemoFn<A>,
{
    fn from_parts(func: F, config: MemoConfig) -> Self {
        let store = Arc::new(Mutex::new(CacheStore::with_capacity(
            config.initial_capacity,
        )));
        Self {
            func,
            config,
            store,
            _args: PhantomData,
        }
    }

    // == Maintenance ==
    pub fn ttl(&self) -> Option<Duration> {
        self.config.ttl
    }

    pub fn clear(&self) {
        self.store.lock().clear();
        debug!(cache = %self.config.name, "cache cleared");
    }

    pub fn invalidate(&self, args: &A) -> Result<Option<V>> {
        let key = F::cache_key(args)?;
        let removed = self.store.lock().remove(&key);
        if removed.is_some() {
            debug!(cache = %self.config.name, "entry invalidated");
        }
        Ok(removed)
    }

    pub fn cleanup_expired(&self) -> usize {
        self.store.lock().cleanup_expired()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn stats(&self) -> crate::stats::CacheStats {
        self.store.lock().stats()
    }

    pub fn store_handle(&self) -> StoreHandle<V> {
        Arc::clone(&self.store)
    }
}

impl<F, A> CachedFn<F, A, <F as AsyncMemoFn<A>>::Output>
where
    F: AsyncMemoFn<A>,
{
    // == Constructors ==
    pub fn new(func: F) -> Self {
        Self::from_parts(func, MemoConfig::new())
    }

    pub fn with_ttl(func: F, ttl: Duration) -> Self {
        Self::from_parts(func, MemoConfig::new().with_ttl(ttl))
    }

    pub fn with_config(func: F, config: MemoConfig) -> Self {
        Self::from_parts(func, config)
    }

    // == Call ==
    /// Calls the async function through the cache.
    ///
    /// Concurrent callers that miss simultaneously each run the future;
    /// the last to finish leaves its value cached.
    pub async fn call(&self, args: A) -> Result<<F as AsyncMemoFn<A>>::Output>
    where
        <F as AsyncMemoFn<A>>::Output: Clone,
    {
        let key = F::cache_key(&args)?;
        let cached = self.store.lock().get(&key);
        if let Some(value) = cached {
            trace!(cache = %self.config.name, "hit");
            return Ok(value);
        }
        trace!(cache = %self.config.name, "miss");

        let value = self.func.invoke(args).await;
        self.store.lock().insert(key, value.clone(), self.config.ttl);
        Ok(value)
    }
}

impl<F, A, T, E> CachedFn<F, A, T>
where
    F: AsyncMemoFn<A, Output = std::result::Result<T, E>>,
{
    // == Fallible Constructors ==
    pub fn try_new(func: F) -> Self {
        Self::from_parts(func, MemoConfig::new())
    }

    pub fn try_with_ttl(func: F, ttl: Duration) -> Self {
        Self::from_parts(func, MemoConfig::new().with_ttl(ttl))
    }

    pub fn try_with_config(func: F, config: MemoConfig) -> Self {
        Self::from_parts(func, config)
    }

    // == Fallible Call ==
    /// Calls a fallible async function through the cache; only `Ok`
    /// results are cached.
    pub async fn try_call(&self, args: A) -> Result<std::result::Result<T, E>>
    where
        T: Clone,
    {
        let key = F::cache_key(&args)?;
        let cached = self.store.lock().get(&key);
        if let Some(value) = cached {
            trace!(cache = %self.config.name, "hit");
            return Ok(Ok(value));
        }
        trace!(cache = %self.config.name, "miss");

        match self.func.invoke(args).await {
            Ok(value) => {
                self.store.lock().insert(key, value.clone(), self.config.ttl);
                Ok(Ok(value))
            }
            Err(err) => {
                trace!(cache = %self.config.name, "error result not cached");
                Ok(Err(err))
            }
        }
    }
}

impl<F, A, V> std::fmt::Debug for CachedFn<F, A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFn")
            .field("name", &self.config.name)
            .field("ttl", &self.config.ttl)
            .field("entries", &self.store.lock().len())
            .finish_non_exhaustive()
    }
}

// == Wrap Functions ==
/// Wraps an async function in a cache with no expiration.
///
/// # Example
///
/// ```
/// use memocache::future;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let double = future::wrap(|x: u64| async move { x * 2 });
/// assert_eq!(double.call((8,)).await.unwrap(), 16);
/// # });
/// ```
pub fn wrap<F, A>(func: F) -> CachedFn<F, A, <F as AsyncMemoFn<A>>::Output>
where
    F: AsyncMemoFn<A>,
{
    CachedFn::new(func)
}

/// Wraps an async function in a cache whose results expire after `ttl`.
pub fn wrap_with_ttl<F, A>(func: F, ttl: Duration) -> CachedFn<F, A, <F as AsyncMemoFn<A>>::Output>
where
    F: AsyncMemoFn<A>,
{
    CachedFn::with_ttl(func, ttl)
}

/// Wraps an async function in a cache built from `config`.
pub fn wrap_with_config<F, A>(
    func: F,
    config: MemoConfig,
) -> CachedFn<F, A, <F as AsyncMemoFn<A>>::Output>
where
    F: AsyncMemoFn<A>,
{
    CachedFn::with_config(func, config)
}

/// Wraps a fallible async function; only `Ok` results are cached.
pub fn try_wrap<F, A, T, E>(func: F) -> CachedFn<F, A, T>
where
    F: AsyncMemoFn<A, Output = std::result::Result<T, E>>,
{
    CachedFn::try_new(func)
}

/// Wraps a fallible async function with a TTL; only `Ok` results are
/// cached.
pub fn try_wrap_with_ttl<F, A, T, E>(func: F, ttl: Duration) -> CachedFn<F, A, T>
where
    F: AsyncMemoFn<A, Output = std::result::Result<T, E>>,
{
    CachedFn::try_with_ttl(func, ttl)
}

/// Wraps a fallible async function with a full config; only `Ok` results
/// are cached.
pub fn try_wrap_with_config<F, A, T, E>(func: F, config: MemoConfig) -> CachedFn<F, A, T>
where
    F: AsyncMemoFn<A, Output = std::result::Result<T, E>>,
{
    CachedFn::try_with_config(func, config)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_call_memoizes_async_results() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let double = wrap(move |x: u64| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                x * 2
            }
        });

        assert_eq!(double.call((4,)).await.unwrap(), 8);
        assert_eq!(double.call((4,)).await.unwrap(), 8);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_eq!(double.call((5,)).await.unwrap(), 10);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_recomputes() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let cached = wrap_with_ttl(
            move |x: u64| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    x
                }
            },
            Duration::from_millis(30),
        );

        cached.call((1,)).await.unwrap();
        cached.call((1,)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        cached.call((1,)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_try_call_does_not_cache_errors() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let flaky = try_wrap(move |x: u32| {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("boom".to_string())
                } else {
                    Ok(x * 2)
                }
            }
        });

        assert_eq!(flaky.try_call((3,)).await.unwrap(), Err("boom".to_string()));
        assert_eq!(flaky.try_call((3,)).await.unwrap(), Ok(6));
        assert_eq!(flaky.try_call((3,)).await.unwrap(), Ok(6));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unhashable_argument_skips_invocation() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let cached = wrap(move |x: f64| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                x
            }
        });

        assert!(cached.call((f64::NAN,)).await.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_agree_on_value() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let cached = Arc::new(wrap(move |x: u64| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                x * 2
            }
        }));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cached = Arc::clone(&cached);
            handles.push(tokio::spawn(async move { cached.call((7,)).await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 14);
        }

        // Racing misses may each compute, but exactly one entry survives.
        let computations = count.load(Ordering::SeqCst);
        assert!(computations >= 1);
        assert!(computations <= 8);
        assert_eq!(cached.len(), 1);

        cached.call((7,)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), computations);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cached = wrap(|x: u64| async move { x * 2 });

        cached.call((1,)).await.unwrap();
        cached.call((2,)).await.unwrap();
        assert_eq!(cached.len(), 2);

        assert_eq!(cached.invalidate(&(1,)).unwrap(), Some(2));
        assert_eq!(cached.len(), 1);

        cached.clear();
        assert!(cached.is_empty());
    }
}
