//! Directory-backed store: a JSON index plus side files for large payloads.
//!
//! ```text
//! <root>/index.json       record metadata and inline payloads (hex)
//! <root>/blob-<id>.bin    payloads above the inline threshold
//! ```
//!
//! Changes are held in memory until `flush`, which rewrites the index
//! through a temporary file and a rename.

use crate::error::{CacheError, CacheResult};
use crate::store::{
    application_of, BackingStore, CacheMode, CacheRecord, NewRecord, RecordId, RecordSummary,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thinlink_types::CacheItemId;
use tracing::{debug, info, warn};

/// Payloads larger than this many bytes are written to side files.
pub const INLINE_THRESHOLD: usize = 4096;

const INDEX_FILE: &str = "index.json";
const INDEX_TMP: &str = "index.json.tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    next_id: u64,
    records: BTreeMap<u64, IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ciid: Option<CacheItemId>,
    /// Hex-encoded key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    entity_type: u16,
    mode: CacheMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    app_id: Option<i32>,
    /// Hex-encoded payload; `None` when stored in a side file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline: Option<String>,
}

impl IndexEntry {
    fn decoded_key(&self) -> Option<Vec<u8>> {
        self.key.as_deref().and_then(|k| hex::decode(k).ok())
    }
}

/// File-system `BackingStore`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    inline_threshold: usize,
    index: IndexFile,
    dirty: bool,
}

impl FileStore {
    /// Opens (or creates) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::with_inline_threshold(root, INLINE_THRESHOLD)
    }

    pub fn with_inline_threshold(root: impl Into<PathBuf>, inline_threshold: usize) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let index = match fs::read(root.join(INDEX_FILE)) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => IndexFile::default(),
            Err(e) => return Err(e.into()),
        };
        info!(root = %root.display(), records = index.records.len(), "opened file cache store");

        Ok(Self {
            root,
            inline_threshold,
            index,
            dirty: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn side_file(&self, id: u64) -> PathBuf {
        self.root.join(format!("blob-{id}.bin"))
    }

    fn remove_side_file(&self, id: u64) {
        match fs::remove_file(self.side_file(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(id, error = %e, "failed to remove cache side file"),
        }
    }

    fn drop_entry(&mut self, id: u64) -> bool {
        match self.index.records.remove(&id) {
            Some(entry) => {
                if entry.inline.is_none() {
                    self.remove_side_file(id);
                }
                self.dirty = true;
                true
            }
            None => false,
        }
    }
}

impl BackingStore for FileStore {
    fn load_record(&self, id: RecordId) -> CacheResult<CacheRecord> {
        let entry = self
            .index
            .records
            .get(&id.0)
            .ok_or(CacheError::RecordNotFound(id))?;

        let data = match &entry.inline {
            Some(hex_data) => hex::decode(hex_data)
                .map_err(|e| CacheError::InvalidRecord(format!("{id}: bad inline payload: {e}")))?,
            None => fs::read(self.side_file(id.0))?,
        };

        Ok(CacheRecord {
            id,
            ciid: entry.ciid,
            key: entry.decoded_key(),
            entity_type: entry.entity_type,
            mode: entry.mode,
            data,
        })
    }

    fn flush(&mut self) -> CacheResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_vec(&self.index)?;
        let tmp = self.root.join(INDEX_TMP);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.root.join(INDEX_FILE))?;
        self.dirty = false;
        debug!(records = self.index.records.len(), "cache index flushed");
        Ok(())
    }

    fn add_record(&mut self, record: NewRecord) -> CacheResult<RecordId> {
        if record.ciid.is_none() && record.key.is_none() {
            return Err(CacheError::InvalidRecord(
                "record needs a ciid or a key".to_string(),
            ));
        }
        let id = self.index.next_id;

        let inline = if record.data.len() > self.inline_threshold {
            fs::write(self.side_file(id), &record.data)?;
            None
        } else {
            Some(hex::encode(&record.data))
        };

        self.index.next_id += 1;
        self.index.records.insert(
            id,
            IndexEntry {
                ciid: record.ciid,
                app_id: record.key.as_deref().and_then(application_of),
                key: record.key.as_deref().map(hex::encode),
                entity_type: record.entity_type,
                mode: record.mode,
                inline,
            },
        );
        self.dirty = true;
        Ok(RecordId(id))
    }

    fn remove_record(&mut self, id: RecordId) -> CacheResult<()> {
        self.drop_entry(id.0);
        Ok(())
    }

    fn enumerate_all(&self) -> CacheResult<Vec<RecordSummary>> {
        Ok(self
            .index
            .records
            .iter()
            .map(|(&id, entry)| RecordSummary {
                id: RecordId(id),
                ciid: entry.ciid,
                key: entry.decoded_key(),
                entity_type: entry.entity_type,
                mode: entry.mode,
            })
            .collect())
    }

    fn purge_by_application(&mut self, application_id: i32) -> CacheResult<usize> {
        let doomed: Vec<u64> = self
            .index
            .records
            .iter()
            .filter(|(_, e)| e.app_id == Some(application_id))
            .map(|(&id, _)| id)
            .collect();
        for id in &doomed {
            self.drop_entry(*id);
        }
        Ok(doomed.len())
    }

    fn clear(&mut self) -> CacheResult<()> {
        let ids: Vec<u64> = self.index.records.keys().copied().collect();
        for id in ids {
            self.drop_entry(id);
        }
        self.dirty = true;
        Ok(())
    }
}
