//! Response-envelope normalization.
//!
//! The REST collaborator is not uniform about response shapes: a collection
//! GET may answer with a bare array or `{data: [...]}`, and a mutation may
//! wrap the affected record as `{data: ...}`, `{asset: ...}`, a bare object,
//! or a one-element array. All tolerance lives here, behind one sum type and
//! one normalization path, so every call site unwraps identically and fails
//! explicitly when nothing matches.

use serde_json::Value;

/// The recognized response shapes.
#[derive(Debug)]
pub enum Envelope {
    /// A bare object or array.
    Bare(Value),
    /// `{data: ...}`.
    Data(Value),
    /// `{asset: ...}`.
    Asset(Value),
}

impl Envelope {
    /// Classifies a response body.
    pub fn parse(body: Value) -> Envelope {
        match body {
            Value::Object(mut obj) => {
                if let Some(data) = obj.remove("data") {
                    Envelope::Data(data)
                } else if let Some(asset) = obj.remove("asset") {
                    Envelope::Asset(asset)
                } else {
                    Envelope::Bare(Value::Object(obj))
                }
            }
            other => Envelope::Bare(other),
        }
    }

    /// Normalizes into a list of records.
    ///
    /// Only array-shaped payloads qualify; anything else is non-conformant
    /// for a collection fetch and yields `None`.
    pub fn into_records(self) -> Option<Vec<Value>> {
        match self.into_inner() {
            Value::Array(records) => Some(records),
            _ => None,
        }
    }

    /// Normalizes into a single record.
    ///
    /// Accepts a wrapped or bare object, or takes the first element of an
    /// array payload. `None` when no object can be extracted.
    pub fn into_item(self) -> Option<Value> {
        match self.into_inner() {
            Value::Object(obj) => Some(Value::Object(obj)),
            Value::Array(records) => records.into_iter().find(|r| r.is_object()),
            _ => None,
        }
    }

    fn into_inner(self) -> Value {
        match self {
            Envelope::Bare(v) | Envelope::Data(v) | Envelope::Asset(v) => v,
        }
    }
}
