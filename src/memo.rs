//! Memoization Module
//!
//! Wraps plain functions and closures so repeat calls with the same
//! arguments return the cached result instead of recomputing.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::MemoConfig;
use crate::error::Result;
use crate::key::{CacheKey, KeyBuilder};
use crate::store::{CacheStore, StoreHandle};

// == Memoized Function Trait ==
/// A callable that can be memoized.
///
/// `Args` is the argument list as a tuple; implementations exist for every
/// `Fn` of arity 0 through 8 whose arguments all implement
/// [`KeyPart`](crate::key::KeyPart). The trait splits a call into the two
/// halves the cache needs: deriving the key from borrowed arguments, and
/// invoking the callable with owned ones.
pub trait MemoFn<Args> {
    /// What the callable returns.
    type Output;

    /// Derives the cache key for an argument tuple.
    fn cache_key(args: &Args) -> Result<CacheKey>;

    /// Invokes the callable.
    fn invoke(&self, args: Args) -> Self::Output;
}

macro_rules! impl_memo_fn {
    ($($ty:ident => $idx:tt),*) => {
        impl<Func, Out, $($ty),*> MemoFn<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Out,
            $($ty: crate::key::KeyPart,)*
        {
            type Output = Out;

            fn cache_key(_args: &($($ty,)*)) -> Result<CacheKey> {
                #[allow(unused_mut)]
                let mut builder = KeyBuilder::new();
                $(builder.positional(&_args.$idx)?;)*
                Ok(builder.finish())
            }

            fn invoke(&self, _args: ($($ty,)*)) -> Out {
                (self)($(_args.$idx),*)
            }
        }
    };
}

impl_memo_fn!();
impl_memo_fn!(T1 => 0);
impl_memo_fn!(T1 => 0, T2 => 1);
impl_memo_fn!(T1 => 0, T2 => 1, T3 => 2);
impl_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3);
impl_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4);
impl_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5);
impl_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5, T7 => 6);
impl_memo_fn!(T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5, T7 => 6, T8 => 7);

// == Cached Function ==
/// A function together with its result cache.
///
/// Built with [`wrap`]/[`try_wrap`] and their `_with_ttl`/`_with_config`
/// variants. The cache is keyed by canonicalized arguments; results live
/// until the configured TTL elapses, or forever without one.
///
/// `CachedFn` is `Send`/`Sync` whenever the wrapped callable and value type
/// are; clones of the [`StoreHandle`] share one cache, so a wrapper can be
/// used from many threads behind an [`Arc`].
pub struct CachedFn<F, A, V> {
    func: F,
    config: MemoConfig,
    store: StoreHandle<V>,
    _args: PhantomData<fn(A)>,
}

impl<F, A, V> CachedFn<F, A, V>
where
    F: MemoFn<A>,
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
    /// The configured time to live, `None` when results never expire.
    pub fn ttl(&self) -> Option<Duration> {
        self.config.ttl
    }

    /// Drops every cached result.
    pub fn clear(&self) {
        self.store.lock().clear();
        debug!(cache = %self.config.name, "cache cleared");
    }

    /// Drops the cached result for one argument tuple, returning it if an
    /// entry was present.
    pub fn invalidate(&self, args: &A) -> Result<Option<V>> {
        let key = F::cache_key(args)?;
        let removed = self.store.lock().remove(&key);
        if removed.is_some() {
            debug!(cache = %self.config.name, "entry invalidated");
        }
        Ok(removed)
    }

    /// Sweeps expired entries out of the cache, returning how many were
    /// dropped.
    pub fn cleanup_expired(&self) -> usize {
        self.store.lock().cleanup_expired()
    }

    /// Number of cached entries, including any not yet swept.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Snapshot of the cache's usage statistics.
    pub fn stats(&self) -> crate::stats::CacheStats {
        self.store.lock().stats()
    }

    /// A shared handle to the backing store, e.g. for
    /// [`spawn_cleanup_task`](crate::tasks::spawn_cleanup_task).
    pub fn store_handle(&self) -> StoreHandle<V> {
        Arc::clone(&self.store)
    }
}

impl<F, A> CachedFn<F, A, <F as MemoFn<A>>::Output>
where
    F: MemoFn<A>,
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
    /// Calls the function through the cache.
    ///
    /// A hit returns a clone of the stored value without invoking the
    /// function. A miss invokes it, stores the result, and returns it.
    /// Arguments that cannot be canonicalized fail before the function
    /// runs. The store lock is never held while the function executes, so
    /// concurrent callers that miss simultaneously each invoke it; the last
    /// to finish leaves its value cached.
    pub fn call(&self, args: A) -> Result<<F as MemoFn<A>>::Output>
    where
        <F as MemoFn<A>>::Output: Clone,
    {
        let key = F::cache_key(&args)?;
        if let Some(value) = self.store.lock().get(&key) {
            trace!(cache = %self.config.name, "hit");
            return Ok(value);
        }
        trace!(cache = %self.config.name, "miss");

        let value = self.func.invoke(args);
        self.store.lock().insert(key, value.clone(), self.config.ttl);
        Ok(value)
    }
}

impl<F, A, T, E> CachedFn<F, A, T>
where
    F: MemoFn<A, Output = std::result::Result<T, E>>,
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
    /// Calls a fallible function through the cache.
    ///
    /// Only `Ok` results are cached; an `Err` is returned to the caller
    /// untouched and the next call with the same arguments invokes the
    /// function again. The outer `Result` reports key derivation failure,
    /// the inner one is the function's own.
    pub fn try_call(&self, args: A) -> Result<std::result::Result<T, E>>
    where
        T: Clone,
    {
        let key = F::cache_key(&args)?;
        if let Some(value) = self.store.lock().get(&key) {
            trace!(cache = %self.config.name, "hit");
            return Ok(Ok(value));
        }
        trace!(cache = %self.config.name, "miss");

        match self.func.invoke(args) {
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
/// Wraps a function in a cache with no expiration.
///
/// # Example
///
/// ```
/// use memocache::wrap;
///
/// let double = wrap(|x: u64| x * 2);
/// assert_eq!(double.call((8,)).unwrap(), 16);
/// assert_eq!(double.call((8,)).unwrap(), 16);
/// ```
pub fn wrap<F, A>(func: F) -> CachedFn<F, A, <F as MemoFn<A>>::Output>
where
    F: MemoFn<A>,
{
    CachedFn::new(func)
}

/// Wraps a function in a cache whose results expire after `ttl`.
///
/// A zero `ttl` disables expiration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use memocache::wrap_with_ttl;
///
/// let fetch = wrap_with_ttl(|id: u32| id * 10, Duration::from_secs(60));
/// assert_eq!(fetch.call((3,)).unwrap(), 30);
/// ```
pub fn wrap_with_ttl<F, A>(func: F, ttl: Duration) -> CachedFn<F, A, <F as MemoFn<A>>::Output>
where
    F: MemoFn<A>,
{
    CachedFn::with_ttl(func, ttl)
}

/// Wraps a function in a cache built from `config`.
pub fn wrap_with_config<F, A>(
    func: F,
    config: MemoConfig,
) -> CachedFn<F, A, <F as MemoFn<A>>::Output>
where
    F: MemoFn<A>,
{
    CachedFn::with_config(func, config)
}

/// Wraps a fallible function; only `Ok` results are cached.
///
/// # Example
///
/// ```
/// use memocache::try_wrap;
///
/// let parse = try_wrap(|s: String| s.parse::<u32>());
/// assert_eq!(parse.try_call(("7".to_string(),)).unwrap(), Ok(7));
/// assert!(parse.try_call(("x".to_string(),)).unwrap().is_err());
/// ```
pub fn try_wrap<F, A, T, E>(func: F) -> CachedFn<F, A, T>
where
    F: MemoFn<A, Output = std::result::Result<T, E>>,
{
    CachedFn::try_new(func)
}

/// Wraps a fallible function with a TTL; only `Ok` results are cached.
pub fn try_wrap_with_ttl<F, A, T, E>(func: F, ttl: Duration) -> CachedFn<F, A, T>
where
    F: MemoFn<A, Output = std::result::Result<T, E>>,
{
    CachedFn::try_with_ttl(func, ttl)
}

/// Wraps a fallible function with a full config; only `Ok` results are
/// cached.
pub fn try_wrap_with_config<F, A, T, E>(func: F, config: MemoConfig) -> CachedFn<F, A, T>
where
    F: MemoFn<A, Output = std::result::Result<T, E>>,
{
    CachedFn::try_with_config(func, config)
}
