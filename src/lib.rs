//! # MongoDB Cache Adapter (mongo-cache-adapter)
//!
//! Stores segmented cache entries in MongoDB and lets the server expire them.
//!
//! ## Features
//!
//! - One database per partition, one collection per segment
//! - Backend-native expiry through a TTL index on `expiresAt`
//! - Explicit connection lifecycle (`start` / `stop` / `is_ready`)
//! - Connection string rewriting that keeps hosts, credentials and options
//! - Pluggable document store, with an in-process store for tests
//!
//! ## Adapter
//!
//! The adapter works on raw JSON values and reports exactly what was stored.
//!
//! ```no_run
//! use mongo_cache_adapter::{CacheConfig, CacheKey, MongoCache};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CacheConfig::builder()
//!         .uri("mongodb://127.0.0.1:27017")
//!         .partition("sessions")
//!         .build();
//!
//!     let cache = MongoCache::new(config)?;
//!     cache.start().await?;
//!
//!     let key = CacheKey::new("users", "42");
//!     cache.set(&key, &json!({ "name": "hapi" }), 60_000).await?;
//!
//!     if let Some(envelope) = cache.get(&key).await? {
//!         println!("Cached {} at {}", envelope.item, envelope.stored);
//!     }
//!
//!     cache.drop(&key).await?;
//!     cache.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Client
//!
//! [`CacheClient`] adds key checks, typed values and TTL-aware reads on top of
//! any [`CacheEngine`].
//!
//! ```no_run
//! use mongo_cache_adapter::{CacheClient, CacheConfig, CacheKey, MongoCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CacheClient::new(MongoCache::new(CacheConfig::from_env()?)?);
//!     client.start().await?;
//!
//!     let key = CacheKey::new("greetings", "en");
//!     client.set(&key, "hello", Duration::from_secs(30)).await?;
//!
//!     let cached = client.get::<String>(&key).await?;
//!     assert_eq!(cached.map(|envelope| envelope.item).as_deref(), Some("hello"));
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod segment;
pub mod store;
pub mod uri;

// Re-export main types for convenience
pub use adapter::{ConnectionPhase, MongoCache};
pub use client::CacheClient;
pub use config::{get_settings, CacheConfig, CacheConfigBuilder, ConnectOptions, Settings};
pub use engine::CacheEngine;
pub use error::{BackendError, CacheError, Result};
pub use record::{CacheKey, Envelope, Record};
pub use segment::{validate_segment_name, SegmentNameError};
pub use store::{DocumentStore, MemoryStore, MongoStore};
