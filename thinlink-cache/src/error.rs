//! Error types for the cache layer.

use crate::store::RecordId;
use thiserror::Error;

/// Result type for cache storage operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by backing stores and value codecs.
///
/// `ObjectCache` logs these and degrades to a miss; they only reach callers
/// that use a `BackingStore` directly.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Index (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No record with this id.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A record is missing both its CIID and its key, or is otherwise unusable.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A value could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(#[from] thinlink_protocol::ProtocolError),
}
