//! SQLite-backed store. Every payload lives in a BLOB column.

use crate::error::{CacheError, CacheResult};
use crate::store::{
    application_of, BackingStore, CacheMode, CacheRecord, NewRecord, RecordId, RecordSummary,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thinlink_types::CacheItemId;
use tracing::{debug, warn};

/// Relational `BackingStore` over a single `cache_records` table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ciid TEXT,
                entity_key BLOB,
                entity_type INTEGER NOT NULL,
                mode INTEGER NOT NULL,
                app_id INTEGER,
                data BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_records_app ON cache_records(app_id);
            ",
        )?;
        Ok(Self { conn })
    }
}

fn parse_ciid(id: i64, text: Option<String>) -> Option<CacheItemId> {
    let text = text?;
    match text.parse() {
        Ok(ciid) => Some(ciid),
        Err(e) => {
            warn!(id, ciid = %text, error = %e, "ignoring unparseable ciid column");
            None
        }
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<RecordSummary> {
    let id: i64 = row.get(0)?;
    let ciid: Option<String> = row.get(1)?;
    let key: Option<Vec<u8>> = row.get(2)?;
    let entity_type: i64 = row.get(3)?;
    let mode: i64 = row.get(4)?;
    Ok(RecordSummary {
        id: RecordId(id as u64),
        ciid: parse_ciid(id, ciid),
        key,
        entity_type: entity_type as u16,
        mode: CacheMode::from_i64(mode),
    })
}

impl BackingStore for SqliteStore {
    fn load_record(&self, id: RecordId) -> CacheResult<CacheRecord> {
        let row = self
            .conn
            .query_row(
                "SELECT id, ciid, entity_key, entity_type, mode, data FROM cache_records WHERE id = ?1",
                params![id.0 as i64],
                |row| {
                    let summary = summary_from_row(row)?;
                    let data: Vec<u8> = row.get(5)?;
                    Ok((summary, data))
                },
            )
            .optional()?;

        let (summary, data) = row.ok_or(CacheError::RecordNotFound(id))?;
        Ok(CacheRecord {
            id: summary.id,
            ciid: summary.ciid,
            key: summary.key,
            entity_type: summary.entity_type,
            mode: summary.mode,
            data,
        })
    }

    fn flush(&mut self) -> CacheResult<()> {
        // Each statement commits on its own
        Ok(())
    }

    fn add_record(&mut self, record: NewRecord) -> CacheResult<RecordId> {
        if record.ciid.is_none() && record.key.is_none() {
            return Err(CacheError::InvalidRecord(
                "record needs a ciid or a key".to_string(),
            ));
        }
        let app_id = record.key.as_deref().and_then(application_of);
        self.conn.execute(
            "INSERT INTO cache_records (ciid, entity_key, entity_type, mode, app_id, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.ciid.map(|c| c.to_string()),
                record.key,
                i64::from(record.entity_type),
                record.mode.as_i64(),
                app_id,
                record.data,
            ],
        )?;
        Ok(RecordId(self.conn.last_insert_rowid() as u64))
    }

    fn remove_record(&mut self, id: RecordId) -> CacheResult<()> {
        self.conn.execute(
            "DELETE FROM cache_records WHERE id = ?1",
            params![id.0 as i64],
        )?;
        Ok(())
    }

    fn enumerate_all(&self) -> CacheResult<Vec<RecordSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ciid, entity_key, entity_type, mode FROM cache_records ORDER BY id",
        )?;
        let rows = stmt.query_map([], summary_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn purge_by_application(&mut self, application_id: i32) -> CacheResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cache_records WHERE app_id = ?1",
            params![application_id],
        )?;
        debug!(application_id, removed, "purged cache records");
        Ok(removed)
    }

    fn clear(&mut self) -> CacheResult<()> {
        self.conn.execute("DELETE FROM cache_records", [])?;
        Ok(())
    }
}
