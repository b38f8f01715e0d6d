//! Integration tests against a live MongoDB deployment
//!
//! These tests require a running MongoDB instance.
//! Run with: MONGODB_URI=mongodb://127.0.0.1:27017 cargo test -- --ignored

use mongo_cache_adapter::{CacheClient, CacheConfig, CacheError, CacheKey, MongoCache};
use serde_json::json;
use std::time::Duration;

// Helper function to get MongoDB connection details from environment or use defaults
fn get_mongodb_config() -> CacheConfig {
    let uri = std::env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://127.0.0.1:27017/?maxPoolSize=5".to_string());

    CacheConfig::builder()
        .uri(uri)
        .partition("unit-testing")
        .build()
}

fn unique_segment() -> String {
    format!("segment_{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore] // Run with: cargo test --ignored
async fn test_start_and_stop() {
    let cache = MongoCache::new(get_mongodb_config()).expect("valid configuration");

    cache.start().await.expect("Failed to connect to MongoDB");
    assert!(cache.is_ready());

    cache.stop().await;
    assert!(!cache.is_ready());
}

#[tokio::test]
#[ignore]
async fn test_round_trip() {
    let cache = MongoCache::new(get_mongodb_config()).unwrap();
    cache.start().await.unwrap();

    let key = CacheKey::new(unique_segment(), "item");
    let value = json!({
        "object": { "a": "b" },
        "array": [1, 2, 3],
        "number": 5.85,
        "string": "hapi",
        "boolean": false,
        "zero": 0
    });

    cache.set(&key, &value, 5_000).await.unwrap();

    let envelope = cache.get(&key).await.unwrap().expect("cache hit");
    assert_eq!(envelope.item, value);
    assert_eq!(envelope.ttl, 5_000);

    cache.drop(&key).await.unwrap();
    assert!(cache.get(&key).await.unwrap().is_none());

    cache.drop(&key).await.unwrap();
    cache.stop().await;
}

#[tokio::test]
#[ignore]
async fn test_client_expiry() {
    let client = CacheClient::new(MongoCache::new(get_mongodb_config()).unwrap());
    client.start().await.unwrap();

    let key = CacheKey::new(unique_segment(), "expired");
    client.set(&key, "x", Duration::from_millis(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(client.get::<String>(&key).await.unwrap().is_none());

    client.stop().await;
}

#[tokio::test]
#[ignore]
async fn test_reconnect() {
    let cache = MongoCache::new(get_mongodb_config()).unwrap();
    let key = CacheKey::new(unique_segment(), "item");

    cache.start().await.unwrap();
    cache.stop().await;
    assert!(matches!(cache.get(&key).await, Err(CacheError::NotStarted)));

    cache.start().await.unwrap();
    cache.set(&key, &json!("back"), 5_000).await.unwrap();
    assert!(cache.get(&key).await.unwrap().is_some());

    cache.stop().await;
}

#[tokio::test]
async fn test_connection_failure_unknown_host() {
    let config = CacheConfig::builder()
        .uri("mongodb://nonexistent-host-12345.invalid:27017")
        .partition("unit-testing")
        .connect_timeout(Duration::from_millis(200))
        .server_selection_timeout(Duration::from_millis(200))
        .build();

    let cache = MongoCache::new(config).unwrap();
    let err = cache.start().await.unwrap_err();

    // The driver's own error comes through untouched
    assert!(err.as_backend().is_some());
    assert!(err
        .as_backend()
        .and_then(|e| e.downcast_ref::<mongodb::error::Error>())
        .is_some());
    assert!(!cache.is_ready());
}
