use opsdeck_store::{LocalStore, StoreChange};
use opsdeck_types::{record_id, RecordId};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── basic round-trip ─────────────────────────────────────────────

#[test]
fn get_all_on_missing_collection_is_empty() {
    let store = LocalStore::open_in_memory().unwrap();
    assert!(store.get_all("assets").is_empty());
}

#[test]
fn create_update_delete_sequence() {
    let store = LocalStore::open_in_memory().unwrap();

    let created = store.create("assets", json!({"id": 1, "name": "A"}));
    assert_eq!(created, json!({"id": 1, "name": "A"}));
    assert_eq!(store.get_all("assets"), vec![json!({"id": 1, "name": "A"})]);

    let merged = store
        .update("assets", &RecordId::Int(1), &json!({"name": "A2", "stage": "qc"}))
        .unwrap();
    assert_eq!(merged, json!({"id": 1, "name": "A2", "stage": "qc"}));
    assert_eq!(store.get_all("assets"), vec![merged.clone()]);

    store.delete("assets", &RecordId::Int(1));
    assert!(store.get_all("assets").is_empty());
}

#[test]
fn sequence_leaves_no_phantom_records() {
    // create → update → delete must reflect exactly the operations applied,
    // with no duplicates surviving any step.
    let store = LocalStore::open_in_memory().unwrap();
    store.create("tasks", json!({"id": 1, "title": "one"}));
    store.create("tasks", json!({"id": 2, "title": "two"}));
    store.update("tasks", &RecordId::Int(1), &json!({"title": "one!"}));
    assert_eq!(store.get_all("tasks").len(), 2);

    store.delete("tasks", &RecordId::Int(2));
    let remaining = store.get_all("tasks");
    assert_eq!(remaining, vec![json!({"id": 1, "title": "one!"})]);
}

#[test]
fn create_assigns_provisional_id_when_missing() {
    let store = LocalStore::open_in_memory().unwrap();
    let created = store.create("assets", json!({"name": "C"}));
    let id = record_id(&created).unwrap();
    assert!(id.is_provisional());
    assert_eq!(store.get_all("assets").len(), 1);
}

#[test]
fn create_preserves_existing_id() {
    let store = LocalStore::open_in_memory().unwrap();
    let created = store.create("assets", json!({"id": "srv-9", "name": "D"}));
    assert_eq!(record_id(&created), Some("srv-9".into()));
}

#[test]
fn update_missing_record_returns_none() {
    let store = LocalStore::open_in_memory().unwrap();
    assert!(store
        .update("assets", &RecordId::Int(404), &json!({"name": "x"}))
        .is_none());
}

#[test]
fn delete_missing_record_is_noop() {
    let store = LocalStore::open_in_memory().unwrap();
    store.create("assets", json!({"id": 1}));
    store.delete("assets", &RecordId::Int(2));
    assert_eq!(store.get_all("assets").len(), 1);
}

#[test]
fn collections_are_isolated() {
    let store = LocalStore::open_in_memory().unwrap();
    store.create("assets", json!({"id": 1}));
    store.create("tasks", json!({"id": 1}));
    store.delete("assets", &RecordId::Int(1));
    assert!(store.get_all("assets").is_empty());
    assert_eq!(store.get_all("tasks").len(), 1);
}

#[test]
fn put_all_replaces_snapshot_wholesale() {
    let store = LocalStore::open_in_memory().unwrap();
    store.create("assets", json!({"id": 1}));
    store.put_all("assets", &[json!({"id": 7}), json!({"id": 8})]);
    assert_eq!(store.get_all("assets"), vec![json!({"id": 7}), json!({"id": 8})]);
}

// ── durability and corruption ────────────────────────────────────

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opsdeck.db");

    {
        let store = LocalStore::open(&path).unwrap();
        store.create("assets", json!({"id": 1, "name": "A"}));
        store.create("assets", json!({"id": 2, "name": "B"}));
    }

    let reopened = LocalStore::open(&path).unwrap();
    assert_eq!(reopened.get_all("assets").len(), 2);
}

#[test]
fn corrupt_snapshot_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opsdeck.db");

    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE snapshots (collection TEXT PRIMARY KEY, records TEXT NOT NULL);
             INSERT INTO snapshots VALUES ('assets', 'not json {{');
             INSERT INTO snapshots VALUES ('tasks', '{\"an\": \"object\"}');",
        )
        .unwrap();
    }

    let store = LocalStore::open(&path).unwrap();
    assert!(store.get_all("assets").is_empty());
    assert!(store.get_all("tasks").is_empty());

    // The corrupt row is recoverable by writing through it.
    store.create("assets", json!({"id": 1}));
    assert_eq!(store.get_all("assets").len(), 1);
}

// ── change feed ──────────────────────────────────────────────────

#[tokio::test]
async fn mutations_publish_store_changes() {
    let store = LocalStore::open_in_memory().unwrap();
    let mut rx = store.subscribe();

    store.create("assets", json!({"id": 1}));
    assert_eq!(
        rx.recv().await.unwrap(),
        StoreChange {
            collection: "assets".to_string()
        }
    );

    store.update("assets", &RecordId::Int(1), &json!({"name": "A"}));
    assert_eq!(rx.recv().await.unwrap().collection, "assets");

    store.delete("assets", &RecordId::Int(1));
    assert_eq!(rx.recv().await.unwrap().collection, "assets");
}

#[tokio::test]
async fn noop_delete_publishes_nothing() {
    let store = LocalStore::open_in_memory().unwrap();
    let mut rx = store.subscribe();
    store.delete("assets", &RecordId::Int(1));
    assert!(rx.try_recv().is_err());
}
