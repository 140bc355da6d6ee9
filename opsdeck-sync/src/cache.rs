//! Process-wide snapshot cache.
//!
//! One instance is shared (via `Arc` on the [`crate::SyncContext`]) by every
//! collection controller in the process, so switching views neither loses
//! already-fetched data nor triggers a redundant fetch. Entries live for the
//! lifetime of the process and are only replaced by explicit mutation or a
//! successful refetch.

use opsdeck_types::{matches_id, record_id, RecordId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory mirror of the latest known snapshot per collection.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<String, Vec<Value>>>,
}

impl SnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached snapshot for a collection, if any.
    pub fn get(&self, collection: &str) -> Option<Vec<Value>> {
        self.entries.read().unwrap().get(collection).cloned()
    }

    /// Replaces the cached snapshot for a collection.
    pub fn set(&self, collection: &str, snapshot: Vec<Value>) {
        self.entries
            .write()
            .unwrap()
            .insert(collection.to_string(), snapshot);
    }

    /// Prepends a record to the cached snapshot, creating the entry when
    /// absent. A record with the same identity is replaced in place instead,
    /// so repeated deliveries of the same create stay idempotent.
    pub fn apply_create(&self, collection: &str, record: Value) {
        let mut entries = self.entries.write().unwrap();
        let snapshot = entries.entry(collection.to_string()).or_default();
        if let Some(id) = record_id(&record) {
            if let Some(existing) = snapshot.iter_mut().find(|r| matches_id(r, &id)) {
                *existing = record;
                return;
            }
        }
        snapshot.insert(0, record);
    }

    /// Replaces the cached record with the same identity. No-op when the
    /// collection or record is absent.
    pub fn apply_update(&self, collection: &str, record: Value) {
        let Some(id) = record_id(&record) else {
            return;
        };
        let mut entries = self.entries.write().unwrap();
        if let Some(snapshot) = entries.get_mut(collection) {
            if let Some(existing) = snapshot.iter_mut().find(|r| matches_id(r, &id)) {
                *existing = record;
            }
        }
    }

    /// Removes the cached record with the given identity.
    pub fn apply_delete(&self, collection: &str, id: &RecordId) {
        let mut entries = self.entries.write().unwrap();
        if let Some(snapshot) = entries.get_mut(collection) {
            snapshot.retain(|r| !matches_id(r, id));
        }
    }
}
