//! End-to-end entry lifecycle through a registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use eager_cache::{create_cache, start_sweeper, EagerCache, EagerError, Registry, Result};

const TTL: Duration = Duration::from_millis(100);
const PAST_TTL: Duration = Duration::from_millis(150);

fn counting_cache(registry: &Arc<Registry>) -> (EagerCache<String>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let cache = registry
        .create_cache(TTL, move |key: &str| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("v{key}{n}"))
        })
        .unwrap();
    (cache, calls)
}

fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_accessed_entry_is_refreshed_by_sweep() {
    let registry = Registry::new();
    let (cache, calls) = counting_cache(&registry);

    assert_eq!(cache.get("a").unwrap(), "va1");
    assert_eq!(cache.get("a").unwrap(), "va1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    thread::sleep(PAST_TTL);
    let before_sweep = Instant::now();
    let summary = registry.sweep_all();

    assert_eq!(summary.refreshed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.peek("a").unwrap().expires_at() >= before_sweep + TTL);

    assert_eq!(cache.get("a").unwrap(), "va2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unread_entry_is_evicted_by_sweep() {
    let registry = Registry::new();
    let (cache, calls) = counting_cache(&registry);

    assert_eq!(cache.get("b").unwrap(), "vb1");

    thread::sleep(PAST_TTL);
    let summary = registry.sweep_all();

    assert_eq!(summary.evicted, 1);
    assert!(!cache.contains_key("b"));
    assert_eq!(cache.get("b").unwrap(), "vb2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_closed_cache_is_never_swept() {
    let registry = Registry::new();
    let (open, open_calls) = counting_cache(&registry);
    let (closed, closed_calls) = counting_cache(&registry);

    for cache in [&open, &closed] {
        cache.get("a").unwrap();
        cache.get("a").unwrap();
    }
    closed.close().unwrap();

    thread::sleep(PAST_TTL);
    let summary = registry.sweep_all();

    assert_eq!(summary.caches, 1);
    assert_eq!(open_calls.load(Ordering::SeqCst), 2);
    assert_eq!(closed_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(closed.get("a"), Err(EagerError::CacheClosed)));
}

#[test]
fn test_double_close_leaves_other_caches_registered() {
    let registry = Registry::new();
    let (first, _) = counting_cache(&registry);
    let (second, _) = counting_cache(&registry);
    let (third, _) = counting_cache(&registry);

    second.close().unwrap();
    second.close().unwrap();

    assert_eq!(registry.slot_count(), 3);
    assert_eq!(registry.live_caches(), 2);

    first.close().unwrap();
    third.close().unwrap();
    assert_eq!(registry.live_caches(), 0);
}

#[test]
fn test_background_sweeper_evicts_and_refreshes() {
    let registry = Registry::new();
    let (cache, calls) = counting_cache(&registry);

    cache.get("hot").unwrap();
    cache.get("hot").unwrap();
    cache.get("cold").unwrap();

    registry.start_sweeper(Duration::from_millis(20)).unwrap();

    assert!(wait_for(Duration::from_secs(3), || !cache.contains_key("cold")));
    assert!(wait_for(Duration::from_secs(3), || {
        cache.peek("hot").is_some_and(|entry| entry.value() == "vhot3")
    }));
    assert!(calls.load(Ordering::SeqCst) >= 3);
}

#[test]
fn test_independent_caches_keep_separate_entries() {
    let registry = Registry::new();
    let upper = registry
        .create_cache(TTL, |key: &str| Ok(key.to_uppercase()))
        .unwrap();
    let length = registry.create_cache(TTL, |key: &str| Ok(key.len())).unwrap();

    assert_eq!(upper.get("abc").unwrap(), "ABC");
    assert_eq!(length.get("abc").unwrap(), 3);
    assert_eq!(registry.live_caches(), 2);
}

#[test]
fn test_loader_failure_is_isolated_per_key() {
    let registry = Registry::new();
    let cache = registry
        .create_cache(TTL, |key: &str| -> Result<String> {
            if key == "bad" {
                Err(EagerError::loader(key, "rejected"))
            } else {
                Ok(key.to_string())
            }
        })
        .unwrap();

    assert!(cache.get("bad").unwrap_err().is_recoverable());
    assert_eq!(cache.get("good").unwrap(), "good");
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_global_registry_api() {
    start_sweeper(Duration::from_secs(60)).unwrap();
    assert!(!start_sweeper(Duration::from_millis(1)).unwrap());
    assert_eq!(Registry::global().sweep_interval(), Duration::from_secs(60));

    let cache = create_cache(Duration::from_secs(60), |key: &str| Ok(format!("<{key}>"))).unwrap();
    assert_eq!(cache.get("x").unwrap(), "<x>");
    cache.close().unwrap();
}
