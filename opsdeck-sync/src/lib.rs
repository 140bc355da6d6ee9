//! Offline-tolerant collection sync engine for opsdeck.
//!
//! Any collection-backed view binds to a [`CollectionSync`], which composes
//! the process-wide services on a [`SyncContext`]:
//!
//! - **Cache**: in-memory snapshot mirror shared by all consumers
//! - **Probe**: one-shot, memoized backend health check
//! - **Channel**: at-most-one push connection (SSE), never reconnected
//! - **Rest**: envelope-tolerant REST client
//! - **Store**: durable local snapshots ([`opsdeck_store::LocalStore`])
//!
//! # Flow
//!
//! 1. **Seed**: a mounting consumer gets cached or stored data synchronously
//! 2. **Probe**: one bounded health check decides whether to try the network
//! 3. **Fetch**: a reachable backend's snapshot becomes authoritative
//! 4. **Subscribe**: pushed create/update/delete deltas apply in order
//! 5. **Mutate**: create/update/remove land locally first, then reconcile
//!
//! When anything on the network path fails, the collection degrades to its
//! local data and keeps working; "offline" is informational, never fatal.
//!
//! # Example
//!
//! ```no_run
//! use opsdeck_store::LocalStore;
//! use opsdeck_sync::{CollectionSync, SyncConfig, SyncContext};
//! use opsdeck_types::CollectionSpec;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(LocalStore::open("opsdeck.db")?);
//! let ctx = SyncContext::new(SyncConfig::from_env(), store);
//!
//! let assets = CollectionSync::mount(
//!     ctx,
//!     CollectionSpec::new("assets")
//!         .with_endpoint("assets")
//!         .with_channel_prefix("assetLibrary"),
//! );
//! assets.synchronize().await;
//! let visible = assets.snapshot();
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod channel;
mod config;
mod context;
mod engine;
mod envelope;
mod error;
mod probe;
mod rest;
mod sse;

pub use cache::SnapshotCache;
pub use channel::{ChannelError, ChannelEvent, ChannelEventKind, ChannelManager, PushTransport};
pub use config::{SyncConfig, ENV_API_BASE, ENV_CHANNEL_ORIGIN};
pub use context::SyncContext;
pub use engine::CollectionSync;
pub use envelope::Envelope;
pub use error::{SyncError, SyncResult};
pub use probe::BackendProbe;
pub use rest::{FetchOutcome, RestClient, RestError};
pub use sse::SseTransport;
