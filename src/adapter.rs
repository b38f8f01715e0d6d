//! MongoDB cache adapter
//!
//! Owns the backend client for its whole lifetime, provisions one collection
//! (with an expiry index) per segment, and maps cache entries onto documents
//! of the form `{_id, value, stored, ttl, expiresAt}`.

use crate::config::{get_settings, CacheConfig, Settings};
use crate::error::{CacheError, Result};
use crate::record::{CacheKey, Envelope, Record};
use crate::segment::{validate_segment_name, SegmentNameError};
use crate::store::{
    DocumentStore, MongoStore, StoreClient, StoreCollection, StoreDatabase, EXPIRES_AT_FIELD,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Observable connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Connected,
}

struct Connection {
    client: Arc<dyn StoreClient>,
    database: Arc<dyn StoreDatabase>,
}

enum ConnectionState {
    Idle,
    Connecting,
    Connected(Connection),
}

impl ConnectionState {
    fn phase(&self) -> ConnectionPhase {
        match self {
            ConnectionState::Idle => ConnectionPhase::Idle,
            ConnectionState::Connecting => ConnectionPhase::Connecting,
            ConnectionState::Connected(_) => ConnectionPhase::Connected,
        }
    }
}

/// Provisioned once, shared by every caller of the same segment
type CollectionSlot = Arc<OnceCell<Arc<dyn StoreCollection>>>;

/// Cache adapter backed by a document store
pub struct MongoCache {
    settings: Settings,
    store: Arc<dyn DocumentStore>,
    state: Mutex<ConnectionState>,
    collections: Mutex<HashMap<String, CollectionSlot>>,
}

/// Puts the state back to `Idle` if a connect attempt is abandoned midway
struct ConnectAttempt<'a> {
    state: &'a Mutex<ConnectionState>,
    armed: bool,
}

impl ConnectAttempt<'_> {
    fn finish(mut self, next: ConnectionState) {
        *self.state.lock() = next;
        self.armed = false;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            if matches!(*state, ConnectionState::Connecting) {
                *state = ConnectionState::Idle;
            }
        }
    }
}

impl MongoCache {
    /// Create an adapter that connects through the MongoDB driver
    ///
    /// Fails with [`CacheError::InvalidConfiguration`] if the partition is
    /// reserved, too long, or the connection string is not a MongoDB one.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(MongoStore::new()))
    }

    /// Create an adapter on top of any document store
    pub fn with_store(config: CacheConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let settings = get_settings(&config)?;

        Ok(Self {
            settings,
            store,
            state: Mutex::new(ConnectionState::Idle),
            collections: Mutex::new(HashMap::new()),
        })
    }

    /// Derived settings in effect
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn partition(&self) -> &str {
        &self.settings.partition
    }

    /// Current connection phase
    pub fn phase(&self) -> ConnectionPhase {
        self.state.lock().phase()
    }

    /// Connect to the backend
    ///
    /// Returns immediately when already connected or when another call is
    /// already connecting; such a caller should poll [`is_ready`](Self::is_ready)
    /// rather than assume the connection is up. A failed attempt leaves the
    /// adapter idle and returns the backend error untouched.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Connected(_) | ConnectionState::Connecting => return Ok(()),
                ConnectionState::Idle => *state = ConnectionState::Connecting,
            }
        }

        let attempt = ConnectAttempt {
            state: &self.state,
            armed: true,
        };

        debug!("Connecting to {}", self.settings.redacted_uri());

        let connected = match self
            .store
            .connect(&self.settings.uri, &self.settings.connect)
            .await
        {
            Ok(client) => client
                .default_database()
                .map(|database| Connection { client, database }),
            Err(e) => Err(e),
        };

        match connected {
            Ok(connection) => {
                attempt.finish(ConnectionState::Connected(connection));
                info!(
                    "Cache connected (partition: {})",
                    self.settings.partition
                );
                Ok(())
            }
            Err(e) => {
                attempt.finish(ConnectionState::Idle);
                error!("Cache connection failed: {}", e);
                Err(CacheError::Backend(e))
            }
        }
    }

    /// Disconnect from the backend and forget every provisioned collection
    ///
    /// Does nothing when no client is held, so it is safe to call repeatedly.
    pub async fn stop(&self) {
        let connection = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, ConnectionState::Idle) {
                ConnectionState::Connected(connection) => {
                    // Cleared under the state lock so no slot of this
                    // connection can be inserted afterwards
                    self.collections.lock().clear();
                    connection
                }
                other => {
                    *state = other;
                    return;
                }
            }
        };

        if let Err(e) = connection.client.close().await {
            warn!("Failed to close cache connection cleanly: {}", e);
        }

        info!(
            "Cache disconnected (partition: {})",
            self.settings.partition
        );
    }

    /// Whether a connection is established
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), ConnectionState::Connected(_))
    }

    /// Check that `name` can be used as a segment in this partition
    pub fn validate_segment_name(&self, name: &str) -> Result<()> {
        validate_segment_name(name, &self.settings.partition)?;
        Ok(())
    }

    fn ensure_started(&self) -> Result<()> {
        match *self.state.lock() {
            ConnectionState::Idle => Err(CacheError::NotStarted),
            _ => Ok(()),
        }
    }

    fn ensure_key(&self, key: &CacheKey) -> Result<()> {
        self.ensure_started()?;

        if key.id.is_empty() {
            return Err(CacheError::InvalidKey);
        }
        Ok(())
    }

    /// Database of the live connection and the segment's slot, taken together
    /// so a concurrent `stop()` cannot clear the map in between
    fn provisioning_slot(&self, name: &str) -> Result<(Arc<dyn StoreDatabase>, CollectionSlot)> {
        let state = self.state.lock();
        let ConnectionState::Connected(connection) = &*state else {
            return Err(CacheError::NotReady);
        };

        if name.is_empty() {
            return Err(SegmentNameError::Empty.into());
        }

        let mut collections = self.collections.lock();
        let slot = Arc::clone(collections.entry(name.to_string()).or_default());
        Ok((Arc::clone(&connection.database), slot))
    }

    /// Collection backing the segment `name`
    ///
    /// The first call per segment creates the expiry index; later calls reuse
    /// the cached handle. If index creation fails nothing is cached, so the
    /// next call provisions again.
    pub async fn get_collection(&self, name: &str) -> Result<Arc<dyn StoreCollection>> {
        let (database, slot) = self.provisioning_slot(name)?;

        let collection = slot
            .get_or_try_init(|| async {
                let collection = database.collection(name);
                collection
                    .create_expiry_index(EXPIRES_AT_FIELD, Duration::ZERO)
                    .await
                    .map_err(CacheError::Backend)?;

                debug!("Provisioned collection {}.{}", database.name(), name);
                Ok::<_, CacheError>(collection)
            })
            .await?;

        Ok(Arc::clone(collection))
    }

    /// Read the entry for `key`; `None` on a miss
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Envelope>> {
        self.ensure_key(key)?;

        let collection = self.get_collection(&key.segment).await?;
        let record = collection
            .find_one(&key.id)
            .await
            .map_err(CacheError::Backend)?;

        let Some(record) = record else {
            debug!("Cache miss: {}", key);
            return Ok(None);
        };

        let stored = record.stored.ok_or(CacheError::MalformedRecord)?;

        debug!("Cache hit: {}", key);
        Ok(Some(Envelope {
            item: record.value,
            stored: stored.timestamp_millis(),
            ttl: record.ttl,
        }))
    }

    /// Create or replace the entry for `key`, expiring `ttl` milliseconds from now
    pub async fn set(&self, key: &CacheKey, value: &Value, ttl: u64) -> Result<()> {
        self.ensure_key(key)?;

        let collection = self.get_collection(&key.segment).await?;
        let record = Record::new(value.clone(), ttl, Utc::now());

        collection
            .upsert(&key.id, &record)
            .await
            .map_err(CacheError::Backend)?;

        debug!("Stored cache entry: {} (ttl: {}ms)", key, ttl);
        Ok(())
    }

    /// Remove the entry for `key`; removing a missing entry succeeds
    pub async fn drop(&self, key: &CacheKey) -> Result<()> {
        self.ensure_key(key)?;

        let collection = self.get_collection(&key.segment).await?;
        collection
            .delete_one(&key.id)
            .await
            .map_err(CacheError::Backend)?;

        debug!("Dropped cache entry: {}", key);
        Ok(())
    }
}
