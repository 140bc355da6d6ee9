//! SQLite-backed local snapshot store for opsdeck.
//!
//! Persists each collection's full snapshot as one JSON-serialized row,
//! overwritten on every mutation. The store is a durable *cache*, not the
//! source of truth: reads never fail (absent or corrupt data degrades to an
//! empty snapshot) and persistence failures are swallowed with a warning so
//! a full disk or locked file never breaks the calling view.
//!
//! Every mutation publishes a [`StoreChange`] on a broadcast feed. The feed
//! is the fallback consistency mechanism between independent consumers of
//! the same collection when no push channel is available — the moral
//! equivalent of a cross-tab storage event.

mod error;

pub use error::{StoreError, StoreResult};

use opsdeck_types::{matches_id, merge_fields, provisional_id, record_id, RecordId};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

/// Notification that a collection's persisted snapshot changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// The collection whose snapshot was rewritten.
    pub collection: String,
}

/// Durable per-collection snapshot store.
pub struct LocalStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl LocalStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                collection TEXT PRIMARY KEY,
                records TEXT NOT NULL
            );",
        )?;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Subscribes to snapshot-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Returns the stored snapshot for a collection.
    ///
    /// Absent or unreadable snapshots yield an empty vec; this never errors.
    pub fn get_all(&self, collection: &str) -> Vec<Value> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT records FROM snapshots WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .ok();
        let Some(raw) = raw else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                warn!(collection, "stored snapshot is not an array, ignoring");
                Vec::new()
            }
            Err(e) => {
                warn!(collection, error = %e, "stored snapshot is corrupt, ignoring");
                Vec::new()
            }
        }
    }

    /// Appends a record to a collection, assigning a provisional identity
    /// when the record carries none, and returns the stored record.
    pub fn create(&self, collection: &str, mut record: Value) -> Value {
        if record_id(&record).is_none() {
            if let Some(obj) = record.as_object_mut() {
                obj.insert("id".to_string(), provisional_id().to_value());
            }
        }
        let mut records = self.get_all(collection);
        records.push(record.clone());
        self.persist(collection, &records);
        record
    }

    /// Shallow-merges fields into the record matching `id`.
    ///
    /// Returns the merged record, or `None` when no record matches.
    pub fn update(&self, collection: &str, id: &RecordId, fields: &Value) -> Option<Value> {
        let mut records = self.get_all(collection);
        let target = records.iter_mut().find(|r| matches_id(r, id))?;
        merge_fields(target, fields);
        let merged = target.clone();
        self.persist(collection, &records);
        Some(merged)
    }

    /// Removes the record matching `id`. No-op when absent.
    pub fn delete(&self, collection: &str, id: &RecordId) {
        let mut records = self.get_all(collection);
        let before = records.len();
        records.retain(|r| !matches_id(r, id));
        if records.len() != before {
            self.persist(collection, &records);
        }
    }

    /// Replaces a collection's snapshot wholesale.
    pub fn put_all(&self, collection: &str, records: &[Value]) {
        self.persist(collection, records);
    }

    fn persist(&self, collection: &str, records: &[Value]) {
        let serialized = match serde_json::to_string(records) {
            Ok(s) => s,
            Err(e) => {
                warn!(collection, error = %e, "failed to serialize snapshot, skipping persist");
                return;
            }
        };
        let conn = self.conn.lock().unwrap();
        if let Err(e) = conn.execute(
            "INSERT OR REPLACE INTO snapshots (collection, records) VALUES (?1, ?2)",
            params![collection, serialized],
        ) {
            warn!(collection, error = %e, "failed to persist snapshot");
        }
        drop(conn);
        let _ = self.changes.send(StoreChange {
            collection: collection.to_string(),
        });
    }
}
