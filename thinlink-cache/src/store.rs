//! Backing store abstraction.
//!
//! A store persists records and hands out opaque `RecordId`s. It knows
//! nothing about the cache's lookup indices; `ObjectCache` rebuilds those
//! from `enumerate_all` whenever it opens a store.

use crate::error::CacheResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use thinlink_types::{CacheItemId, EntityKey};

/// Opaque record handle assigned by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Record lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Dropped the next time the cache is opened.
    Session,
    Persistent,
}

impl CacheMode {
    pub(crate) fn as_i64(self) -> i64 {
        match self {
            Self::Session => 0,
            Self::Persistent => 1,
        }
    }

    pub(crate) fn from_i64(value: i64) -> Self {
        if value == 0 { Self::Session } else { Self::Persistent }
    }
}

/// A record to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub ciid: Option<CacheItemId>,
    pub key: Option<Vec<u8>>,
    pub entity_type: u16,
    pub mode: CacheMode,
    /// Envelope bytes (see `value`).
    pub data: Vec<u8>,
}

/// A stored record with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub id: RecordId,
    pub ciid: Option<CacheItemId>,
    pub key: Option<Vec<u8>>,
    pub entity_type: u16,
    pub mode: CacheMode,
    pub data: Vec<u8>,
}

/// Record metadata without the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: RecordId,
    pub ciid: Option<CacheItemId>,
    pub key: Option<Vec<u8>>,
    pub entity_type: u16,
    pub mode: CacheMode,
}

/// Application id embedded in a key, if the key is an `EntityKey`.
pub fn application_of(key: &[u8]) -> Option<i32> {
    EntityKey::from_bytes(key).ok().map(|k| k.application_id)
}

/// Persistent record storage used by `ObjectCache`.
///
/// Implementations need not be internally synchronized: the cache holds
/// its store behind a mutex.
pub trait BackingStore: Send {
    /// Loads a full record.
    fn load_record(&self, id: RecordId) -> CacheResult<CacheRecord>;

    /// Makes pending changes durable.
    fn flush(&mut self) -> CacheResult<()>;

    /// Adds a record and returns its id. At least one of `ciid`/`key` must
    /// be set.
    fn add_record(&mut self, record: NewRecord) -> CacheResult<RecordId>;

    /// Removes a record. Removing an unknown id is not an error.
    fn remove_record(&mut self, id: RecordId) -> CacheResult<()>;

    /// Lists every stored record.
    fn enumerate_all(&self) -> CacheResult<Vec<RecordSummary>>;

    /// Removes every record whose key decodes to an `EntityKey` of
    /// `application_id`. Returns the number removed.
    fn purge_by_application(&mut self, application_id: i32) -> CacheResult<usize>;

    /// Removes every record.
    fn clear(&mut self) -> CacheResult<()>;
}
