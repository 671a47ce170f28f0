//! Cache configuration.

use crate::error::CacheResult;
use crate::file_store::{FileStore, INLINE_THRESHOLD};
use crate::sqlite_store::SqliteStore;
use crate::store::BackingStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Database file name used by the SQLite backend inside `root`.
pub const SQLITE_FILE: &str = "cache.db";

/// Which `BackingStore` implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Sqlite,
}

/// Configuration for the object cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the cache files.
    pub root: PathBuf,
    pub backend: CacheBackend,
    /// Payloads above this size go to side files (file backend only).
    pub inline_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("thinlink-cache"),
            backend: CacheBackend::File,
            inline_threshold: INLINE_THRESHOLD,
        }
    }
}

impl CacheConfig {
    /// Opens the configured store, creating the root directory if needed.
    pub fn open_store(&self) -> CacheResult<Box<dyn BackingStore>> {
        Ok(match self.backend {
            CacheBackend::File => Box::new(FileStore::with_inline_threshold(
                self.root.clone(),
                self.inline_threshold,
            )?),
            CacheBackend::Sqlite => {
                std::fs::create_dir_all(&self.root)?;
                Box::new(SqliteStore::open(self.root.join(SQLITE_FILE))?)
            }
        })
    }
}
