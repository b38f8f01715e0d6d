//! Error types for cache adapter operations
//!
//! Adapter-originated failures carry stable, human-readable reasons.
//! Failures raised by the document store are passed through untouched.

use crate::segment::SegmentNameError;
use thiserror::Error;

/// Error raised by the document store, kept as-is so callers can downcast
/// to the driver's own error type.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration rejected at construction (partition or connection string)
    #[error("{0}")]
    InvalidConfiguration(String),

    /// Data operation issued before `start()` or after `stop()`
    #[error("Connection not started")]
    NotStarted,

    /// Collection requested while no connection is established
    #[error("Connection not ready")]
    NotReady,

    /// Segment name cannot be used as a collection name
    #[error("{0}")]
    InvalidSegmentName(#[from] SegmentNameError),

    /// A stored document does not have the record envelope shape
    #[error("Incorrect record structure")]
    MalformedRecord,

    /// Key with an empty id or segment
    #[error("Invalid key")]
    InvalidKey,

    /// Client-level operation issued while the engine is not ready
    #[error("Disconnected")]
    Disconnected,

    /// Value could not be encoded into or decoded from its stored form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any failure surfaced by the document store
    #[error(transparent)]
    Backend(BackendError),
}

impl CacheError {
    /// Wrap a document store failure without altering its message
    pub fn backend<E>(error: E) -> Self
    where
        E: Into<BackendError>,
    {
        CacheError::Backend(error.into())
    }

    /// Borrow the underlying backend failure, if this is one
    pub fn as_backend(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            CacheError::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
