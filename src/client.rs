//! Caller-facing cache client
//!
//! Wraps a [`CacheEngine`] with the checks a host framework performs before
//! reaching storage: the engine must be ready, keys must name a segment and
//! an id, zero TTLs are not stored, and entries past their TTL read as misses
//! even if the backend has not purged them yet (MongoDB's expiry monitor only
//! runs periodically).

use crate::engine::CacheEngine;
use crate::error::{CacheError, Result};
use crate::record::{CacheKey, Envelope};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Typed cache client over any engine
pub struct CacheClient<E> {
    engine: E,
}

impl<E: CacheEngine> CacheClient<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// The wrapped engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub async fn start(&self) -> Result<()> {
        self.engine.start().await
    }

    pub async fn stop(&self) {
        self.engine.stop().await
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn validate_segment_name(&self, name: &str) -> Result<()> {
        self.engine.validate_segment_name(name)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.engine.is_ready() {
            Ok(())
        } else {
            Err(CacheError::Disconnected)
        }
    }

    fn validate_key(&self, key: &CacheKey) -> Result<()> {
        if key.id.is_empty() || key.segment.is_empty() {
            return Err(CacheError::InvalidKey);
        }
        self.engine.validate_segment_name(&key.segment)
    }

    /// Read and decode the entry for `key`
    ///
    /// The returned envelope's `ttl` is the time left before the entry
    /// expires, in milliseconds.
    pub async fn get<T>(&self, key: &CacheKey) -> Result<Option<Envelope<T>>>
    where
        T: DeserializeOwned,
    {
        self.ensure_ready()?;
        self.validate_key(key)?;

        let Some(envelope) = self.engine.get(key).await? else {
            return Ok(None);
        };

        let expires_at = envelope
            .stored
            .saturating_add(i64::try_from(envelope.ttl).unwrap_or(i64::MAX));
        let remaining = expires_at.saturating_sub(Utc::now().timestamp_millis());

        if remaining <= 0 {
            debug!("Cache entry expired: {}", key);
            return Ok(None);
        }

        Ok(Some(Envelope {
            item: serde_json::from_value(envelope.item)?,
            stored: envelope.stored,
            ttl: u64::try_from(remaining).unwrap_or(0),
        }))
    }

    /// Encode and store `value` under `key` for `ttl`
    ///
    /// A zero `ttl` stores nothing.
    pub async fn set<T>(&self, key: &CacheKey, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_ready()?;
        self.validate_key(key)?;

        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if ttl_ms == 0 {
            debug!("Skipping cache entry with zero ttl: {}", key);
            return Ok(());
        }

        let value = serde_json::to_value(value)?;
        self.engine.set(key, &value, ttl_ms).await
    }

    /// Remove the entry for `key`
    pub async fn drop(&self, key: &CacheKey) -> Result<()> {
        self.ensure_ready()?;
        self.validate_key(key)?;

        self.engine.drop(key).await
    }
}
