//! Record identity and merge helpers.
//!
//! A record is a `serde_json::Value` object carrying an `id` field. Servers
//! are inconsistent about how they report the identity of a freshly created
//! row, so `canonicalize_identity` accepts the known alternates and rewrites
//! them into the canonical `id` field at the boundary — the alternate names
//! never travel further into the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Alternate identity fields some backends report for a freshly inserted row.
const IDENTITY_FALLBACKS: &[&str] = &["lastID", "last_insert_rowid"];

/// Identity of a record within its collection.
///
/// Server-assigned identities are usually integers; provisional identities
/// assigned before server confirmation are strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Extracts an identity from a JSON value, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) if !s.is_empty() => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    /// Returns the identity as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.clone()),
        }
    }

    /// Whether this is a locally assigned provisional identity.
    pub fn is_provisional(&self) -> bool {
        matches!(self, RecordId::Text(s) if s.starts_with("local-"))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// Generates a provisional identity for a record created before server
/// confirmation.
pub fn provisional_id() -> RecordId {
    RecordId::Text(format!("local-{}", Uuid::new_v4()))
}

/// Reads the canonical `id` field of a record.
pub fn record_id(record: &Value) -> Option<RecordId> {
    record.get("id").and_then(RecordId::from_value)
}

/// Whether a record's `id` field matches the given identity.
pub fn matches_id(record: &Value, id: &RecordId) -> bool {
    record_id(record).as_ref() == Some(id)
}

/// Normalizes a record received from the network so its identity lives in
/// the canonical `id` field.
///
/// Checks `id` first, then the known "last inserted row" alternates; the
/// winning value is written back as `id` and the alternates are removed.
/// Returns the identity, or `None` when the record carries none at all.
pub fn canonicalize_identity(record: &mut Value) -> Option<RecordId> {
    let obj = record.as_object_mut()?;

    let mut found = obj.get("id").and_then(RecordId::from_value);
    for field in IDENTITY_FALLBACKS {
        match obj.remove(*field) {
            Some(v) if found.is_none() => found = RecordId::from_value(&v),
            _ => {}
        }
    }

    let id = found?;
    obj.insert("id".to_string(), id.to_value());
    Some(id)
}

/// Shallow-merges `fields` into `target`, overwriting existing keys.
///
/// Both values must be objects for anything to happen; non-object inputs
/// leave `target` untouched.
pub fn merge_fields(target: &mut Value, fields: &Value) {
    let (Some(target), Some(fields)) = (target.as_object_mut(), fields.as_object()) else {
        return;
    };
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provisional_ids_are_marked() {
        let id = provisional_id();
        assert!(id.is_provisional());
        assert!(!RecordId::Int(7).is_provisional());
    }

    #[test]
    fn canonicalize_prefers_existing_id() {
        let mut record = json!({"id": 3, "lastID": 99});
        let id = canonicalize_identity(&mut record).unwrap();
        assert_eq!(id, RecordId::Int(3));
        assert!(record.get("lastID").is_none());
    }
}
