//! Cache keys and the persisted record envelope

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Composite key of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Segment (collection) the entry belongs to
    pub segment: String,

    /// Identifier of the entry within its segment
    pub id: String,
}

impl CacheKey {
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.segment, self.id)
    }
}

/// Persisted form of one cache entry
///
/// `stored` and `expires_at` are always set on write. They are optional here
/// because documents read back from the store are not guaranteed to have
/// been written by this adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Caller payload, opaque to the adapter
    pub value: Value,

    /// Time of the write
    pub stored: Option<DateTime<Utc>>,

    /// Time-to-live in milliseconds, as given by the caller
    pub ttl: u64,

    /// `stored + ttl`, drives backend expiry
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Build a record written at `now`
    pub fn new(value: Value, ttl: u64, now: DateTime<Utc>) -> Self {
        Self {
            value,
            stored: Some(now),
            ttl,
            expires_at: Some(expiry_instant(now, ttl)),
        }
    }

    /// Whether the record's expiry instant is at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// `now + ttl`, saturating at the largest representable instant
pub fn expiry_instant(now: DateTime<Utc>, ttl: u64) -> DateTime<Utc> {
    i64::try_from(ttl)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Result of a successful read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    /// The stored value
    pub item: T,

    /// Time of the write, in epoch milliseconds
    pub stored: i64,

    /// Time-to-live in milliseconds
    pub ttl: u64,
}

impl Envelope<Value> {
    /// Decode the item into a concrete type
    pub fn decode<T>(self) -> serde_json::Result<Envelope<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(Envelope {
            item: serde_json::from_value(self.item)?,
            stored: self.stored,
            ttl: self.ttl,
        })
    }
}
