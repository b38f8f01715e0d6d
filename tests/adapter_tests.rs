//! Integration tests for the cache adapter over the in-process store
//!
//! These tests cover:
//! - Lifecycle and reconnects
//! - Round trips of structured values
//! - Backend-driven expiry
//! - Idempotent drops
//! - Error propagation

use mongo_cache_adapter::{CacheConfig, CacheError, CacheKey, MemoryStore, MongoCache};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PARTITION: &str = "unit-testing";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn new_cache(store: &MemoryStore) -> MongoCache {
    init_tracing();
    MongoCache::with_store(CacheConfig::new(PARTITION), Arc::new(store.clone()))
        .expect("valid configuration")
}

#[tokio::test]
async fn test_set_get_string() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "item");
    cache.set(&key, &json!("123"), 500).await.unwrap();

    let envelope = cache.get(&key).await.unwrap().expect("cache hit");
    assert_eq!(envelope.item, json!("123"));
    assert_eq!(envelope.ttl, 500);

    cache.stop().await;
}

#[tokio::test]
async fn test_set_get_falsy_values() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();

    for (id, value) in [
        ("zero", json!(0)),
        ("false", json!(false)),
        ("empty", json!("")),
        ("null", json!(null)),
    ] {
        let key = CacheKey::new("mockSegment", id);
        cache.set(&key, &value, 20).await.unwrap();

        let envelope = cache.get(&key).await.unwrap().expect("cache hit");
        assert_eq!(envelope.item, value, "value for {}", id);
    }
}

#[tokio::test]
async fn test_set_get_structured_value() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "item");
    let value = json!({
        "object": { "a": "b" },
        "array": [1, 2, 3],
        "number": 5.85,
        "string": "hapi",
        "date": "2014-03-07T00:00:00Z",
        "boolean": false
    });

    cache.set(&key, &value, 500).await.unwrap();
    let envelope = cache.get(&key).await.unwrap().expect("cache hit");

    assert_eq!(envelope.item, value);
}

#[tokio::test]
async fn test_set_replaces_existing_entry() {
    let store = MemoryStore::new();
    let cache = new_cache(&store);
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "item");
    cache.set(&key, &json!({ "a": 1, "b": 2 }), 500).await.unwrap();
    cache.set(&key, &json!({ "a": 3 }), 900).await.unwrap();

    let envelope = cache.get(&key).await.unwrap().expect("cache hit");
    assert_eq!(envelope.item, json!({ "a": 3 }));
    assert_eq!(envelope.ttl, 900);
    assert_eq!(store.stats().await.documents, 1);
}

#[tokio::test]
async fn test_get_missing_key() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "missing");
    assert!(cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_entry_is_purged_by_backend() {
    let store = MemoryStore::new();
    let cache = new_cache(&store);
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "expired");
    cache.set(&key, &json!("x"), 1).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    // The adapter itself never filters on expiry
    assert!(cache.get(&key).await.unwrap().is_some());

    assert_eq!(store.purge_expired().await, 1);
    assert!(cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_drop() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "item");
    cache.set(&key, &json!("123"), 500).await.unwrap();
    cache.drop(&key).await.unwrap();

    assert!(cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_drop_missing_key() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();

    let key = CacheKey::new("mockSegment", "never-set");
    cache.drop(&key).await.unwrap();
    cache.drop(&key).await.unwrap();
}

#[tokio::test]
async fn test_empty_id_fails_without_touching_storage() {
    let store = MemoryStore::new();
    let cache = new_cache(&store);
    cache.start().await.unwrap();

    let key = CacheKey::new("seg", "");

    let err = cache.set(&key, &json!(1), 1000).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid key");
    assert!(matches!(cache.get(&key).await, Err(CacheError::InvalidKey)));
    assert!(matches!(cache.drop(&key).await, Err(CacheError::InvalidKey)));

    assert!(store.document(PARTITION, "seg", "").await.is_none());
}

#[tokio::test]
async fn test_segments_are_isolated() {
    let store = MemoryStore::new();
    let cache = new_cache(&store);
    cache.start().await.unwrap();

    cache
        .set(&CacheKey::new("first", "item"), &json!(1), 500)
        .await
        .unwrap();
    cache
        .set(&CacheKey::new("second", "item"), &json!(2), 500)
        .await
        .unwrap();

    let first = cache.get(&CacheKey::new("first", "item")).await.unwrap();
    let second = cache.get(&CacheKey::new("second", "item")).await.unwrap();
    assert_eq!(first.unwrap().item, json!(1));
    assert_eq!(second.unwrap().item, json!(2));

    assert!(store.expiry_index(PARTITION, "first").await.is_some());
    assert!(store.expiry_index(PARTITION, "second").await.is_some());
}

#[tokio::test]
async fn test_operations_fail_after_stop() {
    let cache = new_cache(&MemoryStore::new());
    cache.start().await.unwrap();
    cache.stop().await;

    let key = CacheKey::new("mockSegment", "item");

    assert!(matches!(cache.get(&key).await, Err(CacheError::NotStarted)));
    assert!(matches!(
        cache.set(&key, &json!(1), 500).await,
        Err(CacheError::NotStarted)
    ));
    assert!(matches!(cache.drop(&key).await, Err(CacheError::NotStarted)));
}

#[tokio::test]
async fn test_reconnect_after_stop() {
    let store = MemoryStore::new();
    let cache = new_cache(&store);
    let key = CacheKey::new("mockSegment", "item");

    cache.start().await.unwrap();
    cache.set(&key, &json!("before"), 60_000).await.unwrap();
    cache.stop().await;

    cache.start().await.unwrap();
    assert!(cache.is_ready());

    let envelope = cache.get(&key).await.unwrap().expect("persisted across reconnect");
    assert_eq!(envelope.item, json!("before"));
    assert_eq!(store.stats().await.connects, 2);
}

#[tokio::test]
async fn test_connects_after_failed_attempt() {
    let store = MemoryStore::new();
    let cache = new_cache(&store);

    store.set_reject_connections(true);
    let err = cache.start().await.unwrap_err();
    assert!(err.as_backend().is_some());
    assert!(err
        .to_string()
        .contains("failed to connect to server [127.0.0.1:27017] on first connect"));
    assert!(!cache.is_ready());

    store.set_reject_connections(false);
    cache.start().await.unwrap();
    assert!(cache.is_ready());
}

#[tokio::test]
async fn test_concurrent_operations() {
    let store = MemoryStore::new();
    let cache = Arc::new(new_cache(&store));
    cache.start().await.unwrap();

    let writes = (0..16).map(|i| {
        let cache = Arc::clone(&cache);
        async move {
            let key = CacheKey::new(format!("segment-{}", i % 4), format!("item-{}", i));
            cache.set(&key, &json!(i), 60_000).await
        }
    });

    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }

    let stats = store.stats().await;
    assert_eq!(stats.documents, 16);
    assert_eq!(stats.index_creations, 4);
}

#[test]
fn test_construction_rejects_bad_partitions() {
    for partition in ["admin", "local", "config", ""] {
        let result =
            MongoCache::with_store(CacheConfig::new(partition), Arc::new(MemoryStore::new()));
        assert!(
            matches!(result, Err(CacheError::InvalidConfiguration(_))),
            "partition {:?} should be rejected",
            partition
        );
    }

    let long = "x".repeat(64);
    assert!(MongoCache::with_store(CacheConfig::new(long), Arc::new(MemoryStore::new())).is_err());
}

#[test]
fn test_validate_segment_name_before_start() {
    let cache = new_cache(&MemoryStore::new());

    assert!(cache.validate_segment_name("valid").is_ok());
    assert_eq!(
        cache.validate_segment_name("").unwrap_err().to_string(),
        "Empty string"
    );
    assert_eq!(
        cache
            .validate_segment_name(&"0123456789".repeat(10))
            .unwrap_err()
            .to_string(),
        "Segment and partition name lengths exceeds 100 characters"
    );
}

#[test]
fn test_start_blocking() {
    let cache = new_cache(&MemoryStore::new());

    tokio_test::block_on(async {
        cache.start().await.unwrap();
        assert!(cache.is_ready());
        cache.stop().await;
    });

    assert!(!cache.is_ready());
}
