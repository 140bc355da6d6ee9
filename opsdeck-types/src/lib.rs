//! Core type definitions for opsdeck.
//!
//! This crate defines the plugin-agnostic vocabulary shared by the store and
//! the sync engine:
//! - Record identities (integer or string, with provisional local ids)
//! - Record helpers for identity extraction, boundary canonicalization,
//!   and shallow field merging
//! - Collection descriptors mapping a collection name to its REST endpoint
//!   and push-channel event prefix
//!
//! Records themselves are opaque `serde_json::Value` objects; everything
//! domain-specific (asset schemas, workflow fields) lives in the consumers,
//! not here.

mod collection;
mod record;

pub use collection::CollectionSpec;
pub use record::{
    canonicalize_identity, matches_id, merge_fields, provisional_id, record_id, RecordId,
};
