//! Integration Tests for the Public API
//!
//! Exercises wrapped functions end to end: memoization, expiration,
//! invalidation, error passthrough, statistics, and shared use across
//! threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use memocache::{
    future, spawn_cleanup_task, try_wrap, wrap, wrap_with_config, wrap_with_ttl, MemoConfig,
};

// == Helper Functions ==

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let reader = Arc::clone(&count);
    (count, move || reader.load(Ordering::SeqCst))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// == Memoization Tests ==

#[test]
fn test_wrapped_function_runs_once_per_distinct_argument() {
    let (count, calls) = counter();
    let square = wrap(move |x: i64| {
        count.fetch_add(1, Ordering::SeqCst);
        x * x
    });

    assert_eq!(square.call((4,)).unwrap(), 16);
    assert_eq!(square.call((4,)).unwrap(), 16);
    assert_eq!(square.call((5,)).unwrap(), 25);

    assert_eq!(calls(), 2);
    assert_eq!(square.len(), 2);
}

#[test]
fn test_results_never_expire_without_ttl() {
    let (count, calls) = counter();
    let cached = wrap(move |x: u32| {
        count.fetch_add(1, Ordering::SeqCst);
        x + 1
    });

    cached.call((1,)).unwrap();
    thread::sleep(Duration::from_millis(50));
    cached.call((1,)).unwrap();

    assert_eq!(calls(), 1);
    assert_eq!(cached.ttl(), None);
}

// == Expiration Tests ==

#[test]
fn test_results_expire_after_ttl() {
    let (count, calls) = counter();
    let cached = wrap_with_ttl(
        move |x: u32| {
            count.fetch_add(1, Ordering::SeqCst);
            x * 10
        },
        Duration::from_millis(30),
    );

    // Two calls inside the TTL window share one computation
    assert_eq!(cached.call((2,)).unwrap(), 20);
    assert_eq!(cached.call((2,)).unwrap(), 20);
    assert_eq!(calls(), 1);

    thread::sleep(Duration::from_millis(60));

    // The entry has expired, so the function runs again
    assert_eq!(cached.call((2,)).unwrap(), 20);
    assert_eq!(calls(), 2);
}

#[test]
fn test_zero_ttl_disables_expiration() {
    let (count, calls) = counter();
    let cached = wrap_with_ttl(
        move |x: u32| {
            count.fetch_add(1, Ordering::SeqCst);
            x
        },
        Duration::ZERO,
    );

    cached.call((1,)).unwrap();
    thread::sleep(Duration::from_millis(30));
    cached.call((1,)).unwrap();

    assert_eq!(calls(), 1);
}

#[test]
fn test_explicit_sweep_drops_expired_entries() {
    let cached = wrap_with_ttl(|x: u32| x, Duration::from_millis(10));

    cached.call((1,)).unwrap();
    cached.call((2,)).unwrap();
    cached.call((3,)).unwrap();
    assert_eq!(cached.len(), 3);

    thread::sleep(Duration::from_millis(20));

    assert_eq!(cached.cleanup_expired(), 3);
    assert!(cached.is_empty());
}

// == Fallible Function Tests ==

#[test]
fn test_error_results_pass_through_uncached() {
    let (count, calls) = counter();
    let flaky = try_wrap(move |x: u32| {
        if count.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(format!("transient failure for {x}"))
        } else {
            Ok(x * 2)
        }
    });

    // First call fails; the failure is returned but not stored
    let first = flaky.try_call((5,)).unwrap();
    assert_eq!(first, Err("transient failure for 5".to_string()));
    assert!(flaky.is_empty());

    // Retry succeeds and the success is cached
    assert_eq!(flaky.try_call((5,)).unwrap(), Ok(10));
    assert_eq!(flaky.try_call((5,)).unwrap(), Ok(10));
    assert_eq!(calls(), 2);
}

// == Key Derivation Failure Tests ==

#[test]
fn test_nan_argument_fails_without_invoking() {
    let (count, calls) = counter();
    let cached = wrap(move |x: f64| {
        count.fetch_add(1, Ordering::SeqCst);
        x.to_bits()
    });

    let err = cached.call((f64::NAN,)).unwrap_err();
    assert_eq!(err.type_name(), "f64");
    assert!(err.to_string().contains("cache key"));
    assert_eq!(calls(), 0);

    // Ordinary floats still work
    assert_eq!(cached.call((1.5,)).unwrap(), 1.5f64.to_bits());
    assert_eq!(calls(), 1);
}

// == Invalidation Tests ==

#[test]
fn test_invalidate_drops_one_entry() {
    let (count, calls) = counter();
    let cached = wrap(move |x: i64| {
        count.fetch_add(1, Ordering::SeqCst);
        x * 2
    });

    cached.call((1,)).unwrap();
    cached.call((2,)).unwrap();

    assert_eq!(cached.invalidate(&(1,)).unwrap(), Some(2));
    assert_eq!(cached.len(), 1);

    // The invalidated argument recomputes; the other is still cached
    cached.call((1,)).unwrap();
    cached.call((2,)).unwrap();
    assert_eq!(calls(), 3);
}

#[test]
fn test_clear_resets_cache() {
    let (count, calls) = counter();
    let cached = wrap(move |x: i64| {
        count.fetch_add(1, Ordering::SeqCst);
        x
    });

    cached.call((1,)).unwrap();
    cached.call((2,)).unwrap();

    cached.clear();
    assert!(cached.is_empty());
    assert_eq!(cached.stats().total_entries, 0);

    cached.call((1,)).unwrap();
    assert_eq!(calls(), 3);
}

// == Statistics Tests ==

#[test]
fn test_stats_expose_hits_misses_and_hit_rate() {
    let cached = wrap(|x: u32| x);

    cached.call((1,)).unwrap(); // miss
    cached.call((1,)).unwrap(); // hit
    cached.call((2,)).unwrap(); // miss
    cached.call((2,)).unwrap(); // hit

    let stats = cached.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.hit_rate(), 50.0);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["hits"].as_u64().unwrap(), 2);
    assert_eq!(json["misses"].as_u64().unwrap(), 2);
    assert_eq!(json["total_entries"].as_u64().unwrap(), 2);
}

// == Configuration Tests ==

#[test]
fn test_wrap_with_config_applies_settings() {
    let (count, calls) = counter();
    let config = MemoConfig::new()
        .with_ttl(Duration::from_millis(25))
        .with_capacity(8)
        .with_name("users");
    let cached = wrap_with_config(
        move |id: u64| {
            count.fetch_add(1, Ordering::SeqCst);
            format!("user-{id}")
        },
        config,
    );

    assert_eq!(cached.ttl(), Some(Duration::from_millis(25)));
    assert_eq!(cached.call((7,)).unwrap(), "user-7");
    assert_eq!(cached.call((7,)).unwrap(), "user-7");
    assert_eq!(calls(), 1);

    thread::sleep(Duration::from_millis(50));
    cached.call((7,)).unwrap();
    assert_eq!(calls(), 2);
}

// == Concurrency Tests ==

#[test]
fn test_concurrent_callers_share_one_cache() {
    init_tracing();

    let (count, calls) = counter();
    let cached = Arc::new(wrap(move |x: u64| {
        count.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        x * 2
    }));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cached = Arc::clone(&cached);
            thread::spawn(move || cached.call((21,)).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 42);
    }

    // Racing misses may each compute, but one entry survives and later
    // calls hit it
    let computations = calls();
    assert!(computations >= 1 && computations <= 8);
    assert_eq!(cached.len(), 1);

    cached.call((21,)).unwrap();
    assert_eq!(calls(), computations);

    // The store survived the race: an unrelated argument still computes
    // its own value
    assert_eq!(cached.call((5,)).unwrap(), 10);
    assert_eq!(cached.len(), 2);
}

#[test]
fn test_concurrent_callers_with_distinct_arguments() {
    let (count, calls) = counter();
    let cached = Arc::new(wrap(move |x: u64| {
        count.fetch_add(1, Ordering::SeqCst);
        x * 2
    }));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cached = Arc::clone(&cached);
            thread::spawn(move || (i, cached.call((i,)).unwrap()))
        })
        .collect();

    for handle in handles {
        let (arg, result) = handle.join().unwrap();
        assert_eq!(result, arg * 2);
    }

    assert_eq!(calls(), 8);
    assert_eq!(cached.len(), 8);
}

// == Background Cleanup Tests ==

#[tokio::test]
async fn test_cleanup_task_sweeps_wrapper_store() {
    init_tracing();

    let cached = wrap_with_ttl(|x: u32| x, Duration::from_millis(10));
    cached.call((1,)).unwrap();
    cached.call((2,)).unwrap();
    assert_eq!(cached.len(), 2);

    let handle = spawn_cleanup_task(cached.store_handle(), Duration::from_millis(20));

    // Entries expire at 10ms; the first sweep runs at 20ms
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(cached.is_empty());
    assert_eq!(cached.stats().expired, 2);

    handle.abort();
}

// == Async Wrapper Tests ==

#[tokio::test]
async fn test_async_wrapper_memoizes() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let fetch = future::wrap(move |id: u64| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            format!("record-{id}")
        }
    });

    assert_eq!(fetch.call((3,)).await.unwrap(), "record-3");
    assert_eq!(fetch.call((3,)).await.unwrap(), "record-3");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
