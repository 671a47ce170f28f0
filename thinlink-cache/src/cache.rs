//! The dual-keyed object cache.
//!
//! Records are addressed by `CacheItemId`, by an opaque byte key (usually
//! an encoded `EntityKey`), or both. Lookup indices live in memory and are
//! rebuilt from the backing store when the cache is opened. A live-object
//! overlay keeps already-deserialized instances next to their records.
//!
//! Every operation is best-effort: store and codec failures are logged and
//! reported as a miss or `false`.

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::hint::CacheHint;
use crate::store::{BackingStore, CacheMode, NewRecord, RecordId, RecordSummary};
use crate::value::CachedValue;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thinlink_types::CacheItemId;
use tracing::{debug, info, warn};

/// An in-memory instance attached to a record. Never persisted.
pub type LiveObject = Arc<dyn Any + Send + Sync>;

/// How to find a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup<'a> {
    Ciid(&'a CacheItemId),
    Key(&'a [u8]),
}

impl<'a> From<&'a CacheItemId> for CacheLookup<'a> {
    fn from(ciid: &'a CacheItemId) -> Self {
        Self::Ciid(ciid)
    }
}

impl<'a> From<&'a [u8]> for CacheLookup<'a> {
    fn from(key: &'a [u8]) -> Self {
        Self::Key(key)
    }
}

/// One item of a batch insert.
#[derive(Debug, Clone)]
pub struct CachePut {
    pub value: CachedValue,
    pub ciid: Option<CacheItemId>,
    pub key: Option<Vec<u8>>,
    pub entity_type: u16,
    pub hint: CacheHint,
}

/// Counters reported by [`ObjectCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub records: usize,
    pub with_ciid: usize,
    pub with_key: usize,
    pub live_objects: usize,
}

#[derive(Debug, Clone, Default)]
struct Links {
    ciid: Option<CacheItemId>,
    key: Option<Vec<u8>>,
}

#[derive(Default)]
struct CacheIndex {
    by_ciid: HashMap<CacheItemId, RecordId>,
    by_key: HashMap<Vec<u8>, RecordId>,
    /// Reverse map: record to its CIID and key.
    links: HashMap<RecordId, Links>,
    live: HashMap<RecordId, LiveObject>,
}

impl CacheIndex {
    fn link(&mut self, id: RecordId, ciid: Option<CacheItemId>, key: Option<Vec<u8>>) {
        if let Some(c) = ciid {
            self.by_ciid.insert(c, id);
        }
        if let Some(k) = &key {
            self.by_key.insert(k.clone(), id);
        }
        self.links.insert(id, Links { ciid, key });
    }

    fn unlink(&mut self, id: RecordId) {
        if let Some(links) = self.links.remove(&id) {
            if let Some(c) = links.ciid {
                if self.by_ciid.get(&c) == Some(&id) {
                    self.by_ciid.remove(&c);
                }
            }
            if let Some(k) = links.key {
                if self.by_key.get(&k) == Some(&id) {
                    self.by_key.remove(&k);
                }
            }
        }
        self.live.remove(&id);
    }

    fn resolve(&self, lookup: CacheLookup<'_>) -> Option<RecordId> {
        match lookup {
            CacheLookup::Ciid(c) => self.by_ciid.get(c).copied(),
            CacheLookup::Key(k) => self.by_key.get(k).copied(),
        }
    }

    /// Replaces the index with `summaries`, keeping live objects of
    /// records that survive.
    fn rebuild(&mut self, summaries: Vec<RecordSummary>) {
        let mut live = std::mem::take(&mut self.live);
        *self = Self::default();
        for s in summaries {
            if let Some(obj) = live.remove(&s.id) {
                self.live.insert(s.id, obj);
            }
            self.link(s.id, s.ciid, s.key);
        }
    }
}

struct Inner {
    store: Box<dyn BackingStore>,
    index: CacheIndex,
}

impl Inner {
    fn flush(&mut self) {
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "cache flush failed");
        }
    }


    fn remove_id(&mut self, id: RecordId) -> CacheResult<()> {
        self.index.unlink(id);
        self.store.remove_record(id)
    }

    fn put(&mut self, item: &CachePut) -> CacheResult<Option<RecordId>> {
        let Some(mode) = item.hint.cache_mode() else {
            debug!(hint = ?item.hint, "value not cacheable");
            return Ok(None);
        };
        if item.ciid.is_none() && item.key.is_none() {
            warn!("cache put without ciid or key");
            return Ok(None);
        }
        let data = item.value.to_envelope()?;

        // Storing an existing ciid or key replaces its record, but only once
        // the new one is written
        let by_ciid = item
            .ciid
            .as_ref()
            .and_then(|c| self.index.resolve(CacheLookup::Ciid(c)));
        let by_key = item
            .key
            .as_deref()
            .and_then(|k| self.index.resolve(CacheLookup::Key(k)));

        let id = self.store.add_record(NewRecord {
            ciid: item.ciid,
            key: item.key.clone(),
            entity_type: item.entity_type,
            mode,
            data,
        })?;

        for old in [by_ciid, by_key.filter(|k| Some(*k) != by_ciid)]
            .into_iter()
            .flatten()
        {
            self.index.unlink(old);
            if let Err(e) = self.store.remove_record(old) {
                warn!(record = %old, error = %e, "failed to remove replaced cache record");
            }
        }
        self.index.link(id, item.ciid, item.key.clone());
        Ok(Some(id))
    }
}

/// Persistent, dual-keyed object cache. Shareable through `Arc`.
pub struct ObjectCache {
    inner: Mutex<Inner>,
}

impl ObjectCache {
    /// Opens a cache over `store`, dropping session records left by a
    /// previous process and indexing the rest.
    pub fn open(mut store: Box<dyn BackingStore>) -> CacheResult<Self> {
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        for summary in store.enumerate_all()? {
            if summary.mode == CacheMode::Session {
                store.remove_record(summary.id)?;
                dropped += 1;
            } else {
                kept.push(summary);
            }
        }
        if dropped > 0 {
            store.flush()?;
        }
        info!(records = kept.len(), dropped_session = dropped, "object cache opened");

        let mut index = CacheIndex::default();
        index.rebuild(kept);
        Ok(Self {
            inner: Mutex::new(Inner { store, index }),
        })
    }

    /// Opens the store described by `config`.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        Self::open(config.open_store()?)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under `ciid` and/or `key`.
    ///
    /// Returns `false` without writing when the hint carries neither the
    /// session nor the persistent bit, when both identifiers are absent, or
    /// when the store fails. A record already stored under `ciid` or `key`
    /// is replaced only after the new one is written.
    pub fn put(
        &self,
        value: &CachedValue,
        ciid: Option<CacheItemId>,
        key: Option<&[u8]>,
        entity_type: u16,
        hint: CacheHint,
    ) -> bool {
        let item = CachePut {
            value: value.clone(),
            ciid,
            key: key.map(<[u8]>::to_vec),
            entity_type,
            hint,
        };
        let mut inner = self.lock();
        let result = inner.put(&item);
        inner.flush();
        match result {
            Ok(id) => id.is_some(),
            Err(e) => {
                warn!(ciid = ?item.ciid, error = %e, "cache put failed");
                false
            }
        }
    }

    /// Stores every item; a failing item yields `None` and does not abort
    /// the rest.
    pub fn put_batch(&self, items: &[CachePut]) -> Vec<Option<RecordId>> {
        let mut inner = self.lock();
        let out = items
            .iter()
            .map(|item| match inner.put(item) {
                Ok(id) => id,
                Err(e) => {
                    warn!(ciid = ?item.ciid, error = %e, "cache batch item failed");
                    None
                }
            })
            .collect();
        inner.flush();
        out
    }

    /// Returns the stored envelope bytes.
    pub fn get_raw(&self, lookup: CacheLookup<'_>) -> Option<Vec<u8>> {
        let inner = self.lock();
        let id = inner.index.resolve(lookup)?;
        match inner.store.load_record(id) {
            Ok(record) => Some(record.data),
            Err(e) => {
                warn!(%id, error = %e, "cache record load failed");
                None
            }
        }
    }

    /// Loads and restores a value. Unknown or corrupt payloads are a miss.
    pub fn get(&self, lookup: CacheLookup<'_>) -> Option<CachedValue> {
        CachedValue::from_envelope(&self.get_raw(lookup)?)
    }

    pub fn contains(&self, lookup: CacheLookup<'_>) -> bool {
        self.lock().index.resolve(lookup).is_some()
    }

    fn remove_lookup(&self, lookup: CacheLookup<'_>) -> bool {
        let mut inner = self.lock();
        let Some(id) = inner.index.resolve(lookup) else {
            return false;
        };
        let result = inner.remove_id(id);
        inner.flush();
        if let Err(e) = result {
            warn!(%id, error = %e, "cache remove failed");
        }
        true
    }

    /// Removes the record with `ciid` together with its key link and live
    /// object. No-op if absent.
    pub fn remove(&self, ciid: &CacheItemId) -> bool {
        self.remove_lookup(CacheLookup::Ciid(ciid))
    }

    /// Removes the record with `key`. No-op if absent.
    pub fn remove_key(&self, key: &[u8]) -> bool {
        self.remove_lookup(CacheLookup::Key(key))
    }

    pub fn live_object(&self, lookup: CacheLookup<'_>) -> Option<LiveObject> {
        let inner = self.lock();
        let id = inner.index.resolve(lookup)?;
        inner.index.live.get(&id).cloned()
    }

    /// Attaches a live object to an existing record.
    pub fn set_live_object(&self, lookup: CacheLookup<'_>, object: LiveObject) -> bool {
        let mut inner = self.lock();
        match inner.index.resolve(lookup) {
            Some(id) => {
                inner.index.live.insert(id, object);
                true
            }
            None => false,
        }
    }

    /// Removes every record whose key is an `EntityKey` of
    /// `application_id`, then rebuilds the indices.
    pub fn purge_by_application(&self, application_id: i32) -> usize {
        let mut inner = self.lock();
        let removed = match inner.store.purge_by_application(application_id) {
            Ok(n) => n,
            Err(e) => {
                warn!(application_id, error = %e, "cache purge failed");
                0
            }
        };
        inner.flush();
        match inner.store.enumerate_all() {
            Ok(summaries) => inner.index.rebuild(summaries),
            Err(e) => {
                warn!(error = %e, "index rebuild failed; dropping index");
                inner.index = CacheIndex::default();
            }
        }
        info!(application_id, removed, "purged application from cache");
        removed
    }

    /// SHA-256 over the sorted concatenation of every CIID string form.
    pub fn compute_hash(&self) -> Vec<u8> {
        let mut ids: Vec<String> = self
            .lock()
            .index
            .by_ciid
            .keys()
            .map(ToString::to_string)
            .collect();
        ids.sort_unstable();

        let mut hasher = Sha256::new();
        for id in &ids {
            hasher.update(id.as_bytes());
        }
        hasher.finalize().to_vec()
    }

    /// Drops every record and live object.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if let Err(e) = inner.store.clear() {
            warn!(error = %e, "cache clear failed");
        }
        inner.flush();
        inner.index = CacheIndex::default();
    }

    pub fn len(&self) -> usize {
        self.lock().index.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            records: inner.index.links.len(),
            with_ciid: inner.index.by_ciid.len(),
            with_key: inner.index.by_key.len(),
            live_objects: inner.index.live.len(),
        }
    }
}
