//! Collection descriptors.

use serde::{Deserialize, Serialize};

/// Describes a named collection and how it maps onto the backend.
///
/// A collection without an endpoint is local-only: it lives purely in the
/// local store and never touches the network. The channel prefix names the
/// push-channel events for this collection (`{prefix}_created` and friends)
/// and is distinct from the REST endpoint path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name, also the local store key.
    pub name: String,
    /// REST endpoint path relative to the API base, if any.
    pub endpoint: Option<String>,
    /// Push-channel event-name prefix, if any.
    pub channel_prefix: Option<String>,
}

impl CollectionSpec {
    /// Creates a local-only collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            channel_prefix: None,
        }
    }

    /// Maps the collection onto a REST endpoint path.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Maps the collection onto a push-channel event prefix.
    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = Some(prefix.into());
        self
    }

    /// Whether this collection has no remote endpoint.
    pub fn is_local_only(&self) -> bool {
        self.endpoint.is_none()
    }
}
