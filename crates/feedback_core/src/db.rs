use crate::error::StorageError;
use crate::schema::TrackingRecord;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

pub const TRACKING_IDS_KEY: &str = "anonymous_feedback_tracking_ids";
pub const MAX_TRACKED_IDS: usize = 10;

/// Key/value store holding client-side state between runs.
pub trait ClientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        init(&conn)?;
        Ok(Self { conn })
    }
}

fn init(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS local_storage (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
        "#,
    )?;
    Ok(())
}

impl ClientStorage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            r#"
            INSERT INTO local_storage (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
              value=excluded.value,
              updated_at=strftime('%Y-%m-%dT%H:%M:%fZ','now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// Most-recent-first list of tracking IDs issued to this client.
///
/// Holds at most [`MAX_TRACKED_IDS`] entries; the oldest is dropped first.
pub struct TrackingCache<S> {
    storage: S,
    records: Vec<TrackingRecord>,
}

impl<S: ClientStorage> TrackingCache<S> {
    pub fn load(storage: S) -> Self {
        let records = match storage.get_item(TRACKING_IDS_KEY) {
            Ok(Some(raw)) => {
                serde_json::from_str::<Vec<TrackingRecord>>(&raw).unwrap_or_else(|err| {
                    warn!("ignoring unreadable tracking ID cache: {err}");
                    Vec::new()
                })
            }
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("could not read tracking ID cache: {err}");
                Vec::new()
            }
        };
        let mut cache = Self { storage, records };
        cache.records.truncate(MAX_TRACKED_IDS);
        cache
    }

    pub fn records(&self) -> &[TrackingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entry by position, 1 being the most recent.
    pub fn recent(&self, position: usize) -> Option<&TrackingRecord> {
        position
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
    }

    pub fn record(&mut self, record: TrackingRecord) -> Result<(), StorageError> {
        debug!(tracking_id = %record.tracking_id, "caching tracking ID");
        self.records.insert(0, record);
        self.records.truncate(MAX_TRACKED_IDS);
        self.persist()
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.records.clear();
        self.storage.remove_item(TRACKING_IDS_KEY)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.records)?;
        self.storage.set_item(TRACKING_IDS_KEY, &raw)
    }
}
