//! Unit tests for the response cache

use super::*;

fn body(text: &str) -> Arc<[u8]> {
    Arc::from(text.as_bytes())
}

#[test]
fn test_insert_and_get() {
    let cache = ResponseCache::new();
    let uri = "https://repo.example/com/example/lib/1.0/lib-1.0.pom";
    assert!(cache.get(uri).is_none());

    cache.insert(uri, body("<project/>"));
    assert_eq!(cache.get(uri).as_deref(), Some(&b"<project/>"[..]));
    assert!(cache.contains_fresh(uri));
    assert!(!cache.contains_fresh("https://repo.example/other"));
}

#[test]
fn test_entry_freshness() {
    let entry = CacheEntry::new(body("x"));
    assert_eq!(entry.ttl, DEFAULT_TTL);
    assert!(entry.is_fresh());

    let expired = CacheEntry::with_ttl(body("x"), Duration::ZERO);
    assert!(!expired.is_fresh());
}

#[test]
fn test_stale_entries_are_dropped() {
    let cache = ResponseCache::new();
    cache.insert_with_ttl("stale", body("old"), Duration::ZERO);
    cache.insert("fresh", body("new"));

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.fresh_entries, 1);
    assert_eq!(stats.stale_entries, 1);
    assert_eq!(stats.total_bytes, 6);

    assert!(cache.get("stale").is_none());
    assert_eq!(cache.stats().total_entries, 1);
}

#[test]
fn test_cleanup_and_clear() {
    let cache = ResponseCache::new();
    cache.insert_with_ttl("a", body("a"), Duration::ZERO);
    cache.insert_with_ttl("b", body("b"), Duration::ZERO);
    cache.insert("c", body("c"));

    assert_eq!(cache.cleanup(), 2);
    assert_eq!(cache.stats().total_entries, 1);

    cache.clear();
    assert_eq!(cache.stats().total_entries, 0);
}

#[test]
fn test_concurrent_access() {
    let cache = Arc::new(ResponseCache::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let uri = format!("uri-{}", i);
                cache.insert(uri.clone(), body("payload"));
                cache.get(&uri).is_some()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(cache.stats().total_entries, 8);
}
