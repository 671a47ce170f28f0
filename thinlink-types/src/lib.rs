//! Core type definitions for thinlink.
//!
//! This crate defines the identifiers shared by the protocol, cache and
//! transport crates:
//! - `CacheItemId` (CIID), the 14-byte identity of a server-originated item
//! - `EntityKey`, the 10-byte alternate cache key
//!
//! Both types are fixed-size and reject ambiguous input at construction.

mod ids;

pub use ids::{CacheItemId, EntityKey, CIID_LEN, ENTITY_KEY_LEN};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, IdError>;

/// Errors that can occur while constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid id string: {0}")]
    InvalidFormat(String),
}
