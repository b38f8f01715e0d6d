//! Adapter configuration and derived settings

use crate::error::{CacheError, Result};
use crate::uri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection string used when the caller does not provide one
pub const DEFAULT_URI: &str = "mongodb://127.0.0.1:27017/?maxPoolSize=5";

/// Default timeout for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default timeout for selecting a server
pub const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Database names the server reserves for itself
pub const RESERVED_PARTITIONS: [&str; 3] = ["admin", "local", "config"];

/// Upper bound (exclusive) on the partition name length, in bytes
pub const MAX_PARTITION_LENGTH: usize = 64;

/// Caller-supplied configuration
///
/// Unset fields fall back to the documented defaults when settings are derived.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// MongoDB connection string; its database path is replaced by `partition`
    pub uri: Option<String>,

    /// Logical namespace, used as the database name
    pub partition: String,

    /// Timeout for establishing a connection
    pub connect_timeout: Option<Duration>,

    /// Timeout for selecting a server
    pub server_selection_timeout: Option<Duration>,
}

impl CacheConfig {
    /// Configuration for `partition` with every other field defaulted
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            uri: None,
            partition: partition.into(),
            connect_timeout: None,
            server_selection_timeout: None,
        }
    }

    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load configuration from the environment (and a `.env` file if present)
    ///
    /// Reads `MONGODB_URI`, `CACHE_PARTITION`, `MONGODB_CONNECT_TIMEOUT_MS` and
    /// `MONGODB_SERVER_SELECTION_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let partition = std::env::var("CACHE_PARTITION").map_err(|_| {
            CacheError::InvalidConfiguration("CACHE_PARTITION is not set".to_string())
        })?;

        let mut builder = Self::builder().partition(partition);

        if let Ok(uri) = std::env::var("MONGODB_URI") {
            builder = builder.uri(uri);
        }

        if let Some(timeout) = millis_from_env("MONGODB_CONNECT_TIMEOUT_MS")? {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(timeout) = millis_from_env("MONGODB_SERVER_SELECTION_TIMEOUT_MS")? {
            builder = builder.server_selection_timeout(timeout);
        }

        Ok(builder.build())
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("uri", &self.uri.as_deref().map(uri::redact))
            .field("partition", &self.partition)
            .field("connect_timeout", &self.connect_timeout)
            .field("server_selection_timeout", &self.server_selection_timeout)
            .finish()
    }
}

fn millis_from_env(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| CacheError::InvalidConfiguration(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    uri: Option<String>,
    partition: Option<String>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set the connection string
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the partition (database name)
    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the server selection timeout
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    /// Build the configuration; a missing partition is rejected later by
    /// [`get_settings`]
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            uri: self.uri,
            partition: self.partition.unwrap_or_default(),
            connect_timeout: self.connect_timeout,
            server_selection_timeout: self.server_selection_timeout,
        }
    }
}

/// Timeouts handed to the document store when connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            server_selection_timeout: DEFAULT_SERVER_SELECTION_TIMEOUT,
        }
    }
}

/// Settings derived from a [`CacheConfig`]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Connection string whose database path equals `partition`
    pub uri: String,
    pub partition: String,
    pub connect: ConnectOptions,
}

impl Settings {
    /// Connection string with the password masked
    pub fn redacted_uri(&self) -> String {
        uri::redact(&self.uri)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("uri", &self.redacted_uri())
            .field("partition", &self.partition)
            .field("connect", &self.connect)
            .finish()
    }
}

/// Check a partition against the server's database naming rules
///
/// - empty string is not valid
/// - admin, local and config are reserved
/// - limited to 64 bytes
pub fn validate_partition(partition: &str) -> Result<()> {
    if partition.is_empty() {
        return Err(CacheError::InvalidConfiguration(
            "Cache partition is required when using MongoDB".to_string(),
        ));
    }

    if RESERVED_PARTITIONS.contains(&partition) {
        return Err(CacheError::InvalidConfiguration(
            "Cache partition name cannot be \"admin\", \"local\", or \"config\" when using MongoDB"
                .to_string(),
        ));
    }

    if partition.len() >= MAX_PARTITION_LENGTH {
        return Err(CacheError::InvalidConfiguration(
            "Cache partition must be less than 64 bytes when using MongoDB".to_string(),
        ));
    }

    Ok(())
}

/// Derive settings from `config`: validate the partition, fill in defaults,
/// and point the connection string at the partition's database
pub fn get_settings(config: &CacheConfig) -> Result<Settings> {
    validate_partition(&config.partition)?;

    let defaults = ConnectOptions::default();
    let base_uri = config.uri.as_deref().unwrap_or(DEFAULT_URI);

    Ok(Settings {
        uri: uri::rewrite_database(base_uri, &config.partition)?,
        partition: config.partition.clone(),
        connect: ConnectOptions {
            connect_timeout: config.connect_timeout.unwrap_or(defaults.connect_timeout),
            server_selection_timeout: config
                .server_selection_timeout
                .unwrap_or(defaults.server_selection_timeout),
        },
    })
}
