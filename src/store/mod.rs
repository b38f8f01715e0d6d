//! Document store seam
//!
//! The adapter talks to its backend only through these traits. They mirror
//! the small slice of a document database the adapter needs: connect and
//! close a client, resolve the default database, hand out collections, and
//! on a collection create an expiry index, find, upsert and delete by id.
//!
//! - [`mongo::MongoStore`] drives a real MongoDB deployment
//! - [`memory::MemoryStore`] keeps documents in process, for tests and local use

pub mod memory;
pub mod mongo;

use crate::config::ConnectOptions;
use crate::error::BackendError;
use crate::record::Record;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result type for document store calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Name of the field carrying the expiry instant
pub const EXPIRES_AT_FIELD: &str = "expiresAt";

/// Factory for connected clients
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a client for `uri`; fails if the deployment cannot be reached
    /// within the given timeouts
    async fn connect(&self, uri: &str, options: &ConnectOptions)
        -> BackendResult<Arc<dyn StoreClient>>;
}

/// A connected client
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Database named by the connection string
    fn default_database(&self) -> BackendResult<Arc<dyn StoreDatabase>>;

    /// Release every resource held by the client
    async fn close(&self) -> BackendResult<()>;
}

/// Handle to one database
pub trait StoreDatabase: Send + Sync {
    /// Handle to the collection `name`; no round trip to the server
    fn collection(&self, name: &str) -> Arc<dyn StoreCollection>;

    fn name(&self) -> &str;
}

/// Handle to one collection
#[async_trait]
pub trait StoreCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Ensure an ascending expiry index on `field`; documents are purged
    /// `expire_after` past the instant stored in that field
    async fn create_expiry_index(&self, field: &str, expire_after: Duration) -> BackendResult<()>;

    /// Document with primary key `id`
    async fn find_one(&self, id: &str) -> BackendResult<Option<Record>>;

    /// Create or replace the document with primary key `id`
    async fn upsert(&self, id: &str, record: &Record) -> BackendResult<()>;

    /// Delete the document with primary key `id`; absent documents are not an error
    async fn delete_one(&self, id: &str) -> BackendResult<()>;
}
