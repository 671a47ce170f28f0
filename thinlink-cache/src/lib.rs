//! Local object cache for thinlink.
//!
//! - [`ObjectCache`]: dual-keyed (CIID and byte key) cache with a live-object overlay
//! - [`BackingStore`]: pluggable persistence, with [`FileStore`] and [`SqliteStore`]
//! - [`CachedValue`]: the registry of storable types and their versioned envelope

pub mod cache;
pub mod config;
pub mod error;
pub mod file_store;
pub mod hint;
pub mod sqlite_store;
pub mod store;
pub mod value;

pub use cache::{CacheLookup, CachePut, CacheStats, LiveObject, ObjectCache};
pub use config::{CacheBackend, CacheConfig};
pub use error::{CacheError, CacheResult};
pub use file_store::{FileStore, INLINE_THRESHOLD};
pub use hint::CacheHint;
pub use sqlite_store::SqliteStore;
pub use store::{
    application_of, BackingStore, CacheMode, CacheRecord, NewRecord, RecordId, RecordSummary,
};
pub use value::{CachedValue, StoredType, ENVELOPE_VERSION};
