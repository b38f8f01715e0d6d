//! MongoDB implementation of the document store traits

use super::{
    BackendResult, DocumentStore, StoreClient, StoreCollection, StoreDatabase, EXPIRES_AT_FIELD,
};
use crate::config::ConnectOptions;
use crate::record::Record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Connects to MongoDB through the official driver
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoStore;

impl MongoStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn connect(
        &self,
        uri: &str,
        options: &ConnectOptions,
    ) -> BackendResult<Arc<dyn StoreClient>> {
        let mut client_options = ClientOptions::parse(uri).await?;
        client_options.connect_timeout = Some(options.connect_timeout);
        client_options.server_selection_timeout = Some(options.server_selection_timeout);

        let client = Client::with_options(client_options)?;
        let database = client
            .default_database()
            .ok_or("Connection string does not name a database")?;

        // The driver connects lazily; ping so that auth and network failures
        // surface here rather than on the first data operation
        database.run_command(doc! { "ping": 1 }).await?;

        info!("Connected to MongoDB (database: {})", database.name());

        Ok(Arc::new(MongoClient { client, database }))
    }
}

struct MongoClient {
    client: Client,
    database: Database,
}

#[async_trait]
impl StoreClient for MongoClient {
    fn default_database(&self) -> BackendResult<Arc<dyn StoreDatabase>> {
        Ok(Arc::new(MongoDatabase {
            database: self.database.clone(),
        }))
    }

    async fn close(&self) -> BackendResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

struct MongoDatabase {
    database: Database,
}

impl StoreDatabase for MongoDatabase {
    fn collection(&self, name: &str) -> Arc<dyn StoreCollection> {
        Arc::new(MongoCollection {
            collection: self.database.collection::<Document>(name),
        })
    }

    fn name(&self) -> &str {
        self.database.name()
    }
}

struct MongoCollection {
    collection: Collection<Document>,
}

#[async_trait]
impl StoreCollection for MongoCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn create_expiry_index(&self, field: &str, expire_after: Duration) -> BackendResult<()> {
        let mut keys = Document::new();
        keys.insert(field, 1);

        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().expire_after(expire_after).build())
            .build();

        self.collection.create_index(index).await?;
        debug!("Ensured expiry index on {}.{}", self.collection.name(), field);
        Ok(())
    }

    async fn find_one(&self, id: &str) -> BackendResult<Option<Record>> {
        match self.collection.find_one(doc! { "_id": id }).await? {
            Some(document) => Ok(Some(record_from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, id: &str, record: &Record) -> BackendResult<()> {
        let document = document_from_record(id, record)?;

        self.collection
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> BackendResult<()> {
        self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(())
    }
}

fn to_bson_datetime(instant: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(instant.timestamp_millis())
}

fn from_bson_datetime(instant: &bson::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(instant.timestamp_millis())
}

/// `{_id, value, stored, ttl, expiresAt}`
fn document_from_record(id: &str, record: &Record) -> BackendResult<Document> {
    let mut document = doc! {
        "_id": id,
        "value": bson::to_bson(&record.value)?,
        "ttl": i64::try_from(record.ttl).unwrap_or(i64::MAX),
    };

    if let Some(stored) = record.stored {
        document.insert("stored", to_bson_datetime(stored));
    }

    if let Some(expires_at) = record.expires_at {
        document.insert(EXPIRES_AT_FIELD, to_bson_datetime(expires_at));
    }

    Ok(document)
}

fn record_from_document(mut document: Document) -> BackendResult<Record> {
    let value = match document.remove("value") {
        Some(value) => bson::from_bson(value)?,
        None => serde_json::Value::Null,
    };

    let stored = match document.get("stored") {
        Some(Bson::DateTime(stored)) => from_bson_datetime(stored),
        _ => None,
    };

    let expires_at = match document.get(EXPIRES_AT_FIELD) {
        Some(Bson::DateTime(expires_at)) => from_bson_datetime(expires_at),
        _ => None,
    };

    let ttl = match document.get("ttl") {
        Some(Bson::Int64(ttl)) => u64::try_from(*ttl).unwrap_or(0),
        Some(Bson::Int32(ttl)) => u64::try_from(*ttl).unwrap_or(0),
        Some(Bson::Double(ttl)) if *ttl >= 0.0 => *ttl as u64,
        _ => 0,
    };

    Ok(Record {
        value,
        stored,
        ttl,
        expires_at,
    })
}
