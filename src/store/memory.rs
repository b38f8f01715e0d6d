//! In-process document store
//!
//! Documents live in a shared map keyed by database, collection and id. Like
//! MongoDB, nothing expires on its own: [`MemoryStore::purge_expired`] plays
//! the part of the server's background TTL monitor and removes documents
//! whose expiry instant has passed, but only in collections that carry an
//! expiry index.

use super::{
    BackendResult, DocumentStore, StoreClient, StoreCollection, StoreDatabase, EXPIRES_AT_FIELD,
};
use crate::config::ConnectOptions;
use crate::record::Record;
use crate::uri::ConnectionString;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Counters describing how the store has been used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Successful connects
    pub connects: u64,

    /// Client closes
    pub closes: u64,

    /// Expiry index creations, including repeated ones
    pub index_creations: u64,

    /// Documents currently held across all databases
    pub documents: usize,
}

/// Shared in-process document store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    /// database -> collection -> data
    databases: RwLock<HashMap<String, HashMap<String, CollectionData>>>,
    reject_connections: AtomicBool,
    fail_index_creation: AtomicBool,
    connects: AtomicU64,
    closes: AtomicU64,
    index_creations: AtomicU64,
}

#[derive(Default)]
struct CollectionData {
    documents: HashMap<String, Record>,
    expire_after: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connects fail as if the server were unreachable
    pub fn set_reject_connections(&self, reject: bool) {
        self.inner.reject_connections.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent expiry index creations fail
    pub fn set_fail_index_creation(&self, fail: bool) {
        self.inner.fail_index_creation.store(fail, Ordering::SeqCst);
    }

    /// Store a document verbatim, bypassing the adapter
    pub async fn insert_raw(&self, database: &str, collection: &str, id: &str, record: Record) {
        let mut databases = self.inner.databases.write().await;
        databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), record);
    }

    /// Read a document directly, without expiry checks
    pub async fn document(&self, database: &str, collection: &str, id: &str) -> Option<Record> {
        let databases = self.inner.databases.read().await;
        databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .and_then(|data| data.documents.get(id))
            .cloned()
    }

    /// Expiry grace configured on a collection's index, if it has one
    pub async fn expiry_index(&self, database: &str, collection: &str) -> Option<Duration> {
        let databases = self.inner.databases.read().await;
        databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .and_then(|data| data.expire_after)
    }

    /// Remove every document whose expiry has passed at `now`
    ///
    /// Returns the number of documents removed.
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut databases = self.inner.databases.write().await;
        let mut removed = 0;

        for collections in databases.values_mut() {
            for data in collections.values_mut() {
                let Some(expire_after) = data.expire_after else {
                    continue;
                };
                let grace = TimeDelta::from_std(expire_after).unwrap_or(TimeDelta::zero());

                let before = data.documents.len();
                data.documents.retain(|_, record| match record.expires_at {
                    Some(expires_at) => !expires_at
                        .checked_add_signed(grace)
                        .is_some_and(|purge_at| purge_at <= now),
                    None => true,
                });
                removed += before - data.documents.len();
            }
        }

        if removed > 0 {
            debug!("Purged {} expired documents", removed);
        }
        removed
    }

    /// Remove every document whose expiry has passed
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    /// Usage counters
    pub async fn stats(&self) -> MemoryStats {
        let databases = self.inner.databases.read().await;
        let documents = databases
            .values()
            .flat_map(|collections| collections.values())
            .map(|data| data.documents.len())
            .sum();

        MemoryStats {
            connects: self.inner.connects.load(Ordering::SeqCst),
            closes: self.inner.closes.load(Ordering::SeqCst),
            index_creations: self.inner.index_creations.load(Ordering::SeqCst),
            documents,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(
        &self,
        uri: &str,
        _options: &ConnectOptions,
    ) -> BackendResult<Arc<dyn StoreClient>> {
        let parsed = ConnectionString::parse(uri)?;

        if self.inner.reject_connections.load(Ordering::SeqCst) {
            return Err(format!(
                "failed to connect to server [{}] on first connect",
                parsed.hosts()
            )
            .into());
        }

        let database = parsed
            .database()
            .ok_or("Connection string does not name a database")?
            .to_string();

        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MemoryClient {
            inner: Arc::clone(&self.inner),
            database,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct MemoryClient {
    inner: Arc<MemoryInner>,
    database: String,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl StoreClient for MemoryClient {
    fn default_database(&self) -> BackendResult<Arc<dyn StoreDatabase>> {
        Ok(Arc::new(MemoryDatabase {
            inner: Arc::clone(&self.inner),
            name: self.database.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn close(&self) -> BackendResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.inner.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct MemoryDatabase {
    inner: Arc<MemoryInner>,
    name: String,
    closed: Arc<AtomicBool>,
}

impl StoreDatabase for MemoryDatabase {
    fn collection(&self, name: &str) -> Arc<dyn StoreCollection> {
        Arc::new(MemoryCollection {
            inner: Arc::clone(&self.inner),
            database: self.name.clone(),
            name: name.to_string(),
            closed: Arc::clone(&self.closed),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct MemoryCollection {
    inner: Arc<MemoryInner>,
    database: String,
    name: String,
    closed: Arc<AtomicBool>,
}

impl MemoryCollection {
    fn ensure_open(&self) -> BackendResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err("Client is closed".into());
        }
        Ok(())
    }
}

#[async_trait]
impl StoreCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_expiry_index(&self, field: &str, expire_after: Duration) -> BackendResult<()> {
        self.ensure_open()?;

        if self.inner.fail_index_creation.load(Ordering::SeqCst) {
            return Err("`createIndex` error".into());
        }

        if field != EXPIRES_AT_FIELD {
            return Err(format!("Unsupported expiry field: {}", field).into());
        }

        let mut databases = self.inner.databases.write().await;
        databases
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default()
            .expire_after = Some(expire_after);

        self.inner.index_creations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_one(&self, id: &str) -> BackendResult<Option<Record>> {
        self.ensure_open()?;

        let databases = self.inner.databases.read().await;
        Ok(databases
            .get(&self.database)
            .and_then(|collections| collections.get(&self.name))
            .and_then(|data| data.documents.get(id))
            .cloned())
    }

    async fn upsert(&self, id: &str, record: &Record) -> BackendResult<()> {
        self.ensure_open()?;

        let mut databases = self.inner.databases.write().await;
        databases
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default()
            .documents
            .insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> BackendResult<()> {
        self.ensure_open()?;

        let mut databases = self.inner.databases.write().await;
        if let Some(data) = databases
            .get_mut(&self.database)
            .and_then(|collections| collections.get_mut(&self.name))
        {
            data.documents.remove(id);
        }
        Ok(())
    }
}
