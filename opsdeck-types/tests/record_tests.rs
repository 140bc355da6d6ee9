use opsdeck_types::{
    canonicalize_identity, matches_id, merge_fields, provisional_id, record_id, CollectionSpec,
    RecordId,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── RecordId ─────────────────────────────────────────────────────

#[test]
fn record_id_from_number() {
    assert_eq!(RecordId::from_value(&json!(42)), Some(RecordId::Int(42)));
}

#[test]
fn record_id_from_string() {
    assert_eq!(
        RecordId::from_value(&json!("abc")),
        Some(RecordId::Text("abc".to_string()))
    );
}

#[test]
fn record_id_rejects_other_shapes() {
    assert_eq!(RecordId::from_value(&json!(null)), None);
    assert_eq!(RecordId::from_value(&json!("")), None);
    assert_eq!(RecordId::from_value(&json!({"id": 1})), None);
    assert_eq!(RecordId::from_value(&json!(1.5)), None);
}

#[test]
fn record_id_serializes_untagged() {
    assert_eq!(serde_json::to_value(RecordId::Int(7)).unwrap(), json!(7));
    assert_eq!(
        serde_json::to_value(RecordId::from("x")).unwrap(),
        json!("x")
    );
}

#[test]
fn record_id_displays_for_url_paths() {
    assert_eq!(RecordId::Int(12).to_string(), "12");
    assert_eq!(RecordId::from("local-x").to_string(), "local-x");
}

#[test]
fn provisional_ids_are_unique_and_marked() {
    let a = provisional_id();
    let b = provisional_id();
    assert_ne!(a, b);
    assert!(a.is_provisional());
    assert!(!RecordId::from("srv-1").is_provisional());
}

// ── record helpers ───────────────────────────────────────────────

#[test]
fn record_id_reads_canonical_field() {
    assert_eq!(record_id(&json!({"id": 5, "name": "A"})), Some(5.into()));
    assert_eq!(record_id(&json!({"name": "A"})), None);
}

#[test]
fn matches_id_compares_by_identity() {
    let record = json!({"id": "k1"});
    assert!(matches_id(&record, &"k1".into()));
    assert!(!matches_id(&record, &"k2".into()));
    assert!(!matches_id(&record, &RecordId::Int(1)));
}

#[test]
fn canonicalize_promotes_last_id() {
    let mut record = json!({"lastID": 31, "name": "A"});
    assert_eq!(canonicalize_identity(&mut record), Some(31.into()));
    assert_eq!(record, json!({"id": 31, "name": "A"}));
}

#[test]
fn canonicalize_promotes_last_insert_rowid() {
    let mut record = json!({"last_insert_rowid": 8});
    assert_eq!(canonicalize_identity(&mut record), Some(8.into()));
    assert_eq!(record, json!({"id": 8}));
}

#[test]
fn canonicalize_strips_alternates_when_id_present() {
    let mut record = json!({"id": 2, "lastID": 99, "last_insert_rowid": 98});
    assert_eq!(canonicalize_identity(&mut record), Some(2.into()));
    assert_eq!(record, json!({"id": 2}));
}

#[test]
fn canonicalize_fails_without_any_identity() {
    let mut record = json!({"name": "no id here"});
    assert_eq!(canonicalize_identity(&mut record), None);
}

#[test]
fn canonicalize_fails_on_non_object() {
    assert_eq!(canonicalize_identity(&mut json!([1, 2])), None);
}

#[test]
fn merge_fields_is_shallow_overwrite() {
    let mut target = json!({"id": 1, "name": "A", "stage": "draft"});
    merge_fields(&mut target, &json!({"stage": "review", "owner": "pat"}));
    assert_eq!(
        target,
        json!({"id": 1, "name": "A", "stage": "review", "owner": "pat"})
    );
}

#[test]
fn merge_fields_ignores_non_objects() {
    let mut target = json!({"id": 1});
    merge_fields(&mut target, &json!([1, 2, 3]));
    assert_eq!(target, json!({"id": 1}));
}

// ── CollectionSpec ───────────────────────────────────────────────

#[test]
fn collection_spec_defaults_to_local_only() {
    let spec = CollectionSpec::new("drafts");
    assert!(spec.is_local_only());
    assert_eq!(spec.channel_prefix, None);
}

#[test]
fn collection_spec_builder() {
    let spec = CollectionSpec::new("assets")
        .with_endpoint("assets")
        .with_channel_prefix("assetLibrary");
    assert!(!spec.is_local_only());
    assert_eq!(spec.endpoint.as_deref(), Some("assets"));
    assert_eq!(spec.channel_prefix.as_deref(), Some("assetLibrary"));
}
