//! Cache engine contract
//!
//! The operations a host cache framework drives: lifecycle, segment name
//! validation, and get/set/drop by `{segment, id}`.

use crate::adapter::MongoCache;
use crate::error::Result;
use crate::record::{CacheKey, Envelope};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Storage engine behind a [`CacheClient`](crate::client::CacheClient)
#[async_trait]
pub trait CacheEngine: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self);

    fn is_ready(&self) -> bool;

    fn validate_segment_name(&self, name: &str) -> Result<()>;

    async fn get(&self, key: &CacheKey) -> Result<Option<Envelope>>;

    /// Store `value` under `key` for `ttl` milliseconds
    async fn set(&self, key: &CacheKey, value: &Value, ttl: u64) -> Result<()>;

    async fn drop(&self, key: &CacheKey) -> Result<()>;
}

#[async_trait]
impl CacheEngine for MongoCache {
    async fn start(&self) -> Result<()> {
        MongoCache::start(self).await
    }

    async fn stop(&self) {
        MongoCache::stop(self).await
    }

    fn is_ready(&self) -> bool {
        MongoCache::is_ready(self)
    }

    fn validate_segment_name(&self, name: &str) -> Result<()> {
        MongoCache::validate_segment_name(self, name)
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Envelope>> {
        MongoCache::get(self, key).await
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: u64) -> Result<()> {
        MongoCache::set(self, key, value, ttl).await
    }

    async fn drop(&self, key: &CacheKey) -> Result<()> {
        MongoCache::drop(self, key).await
    }
}

#[async_trait]
impl<E> CacheEngine for Arc<E>
where
    E: CacheEngine + ?Sized,
{
    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn stop(&self) {
        (**self).stop().await
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn validate_segment_name(&self, name: &str) -> Result<()> {
        (**self).validate_segment_name(name)
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Envelope>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: u64) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn drop(&self, key: &CacheKey) -> Result<()> {
        CacheEngine::drop(&**self, key).await
    }
}
