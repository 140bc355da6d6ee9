//! Error types for the sync engine.

use serde_json::Value;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced to callers of the sync engine.
///
/// Connectivity failures are deliberately absent: they degrade the
/// collection to offline instead of failing the call (the local copy of the
/// data remains valid). Only failures the caller can act on are errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server rejected a mutation. `validation` carries the server's
    /// field-level `validationErrors` payload verbatim, when present.
    #[error("server rejected the request ({status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        validation: Option<Value>,
    },

    /// A created record came back without any recognizable identity.
    /// Fatal to the create: without an identity the record can never be
    /// addressed by a later update or delete.
    #[error("created record carries no identity in any recognized field")]
    MissingIdentity,

    /// The response body could not be read or did not parse as JSON.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local store error (only at construction; store I/O is best-effort).
    #[error("store error: {0}")]
    Store(#[from] opsdeck_store::StoreError),
}
