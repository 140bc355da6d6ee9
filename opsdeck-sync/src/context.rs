//! Shared service context.
//!
//! The cache, probe, and channel manager are process-wide singletons, but
//! explicit ones: constructed once here and handed by `Arc` to every
//! collection controller, so tests can build isolated contexts and swap the
//! push transport for a mock.

use crate::cache::SnapshotCache;
use crate::channel::{ChannelManager, PushTransport};
use crate::config::SyncConfig;
use crate::probe::BackendProbe;
use crate::rest::RestClient;
use crate::sse::SseTransport;
use opsdeck_store::LocalStore;
use std::sync::Arc;

/// The services every [`crate::CollectionSync`] composes.
pub struct SyncContext {
    pub cache: SnapshotCache,
    pub store: Arc<LocalStore>,
    pub probe: Arc<BackendProbe>,
    pub channel: ChannelManager,
    pub rest: RestClient,
}

impl SyncContext {
    /// Builds a context with the SSE push transport.
    pub fn new(config: SyncConfig, store: Arc<LocalStore>) -> Arc<Self> {
        let client = reqwest::Client::new();
        let probe = Arc::new(BackendProbe::new(
            client.clone(),
            config.health_url(),
            config.health_timeout,
        ));
        let transport = Arc::new(SseTransport::new(client.clone(), probe.clone()));
        Self::assemble(config, store, client, probe, transport)
    }

    /// Builds a context with a caller-supplied push transport (tests).
    pub fn with_transport(
        config: SyncConfig,
        store: Arc<LocalStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Arc<Self> {
        let client = reqwest::Client::new();
        let probe = Arc::new(BackendProbe::new(
            client.clone(),
            config.health_url(),
            config.health_timeout,
        ));
        Self::assemble(config, store, client, probe, transport)
    }

    fn assemble(
        config: SyncConfig,
        store: Arc<LocalStore>,
        client: reqwest::Client,
        probe: Arc<BackendProbe>,
        transport: Arc<dyn PushTransport>,
    ) -> Arc<Self> {
        let channel = ChannelManager::new(
            config.channel_origin.clone(),
            config.connect_timeout,
            probe.clone(),
            transport,
        );
        let rest = RestClient::new(client, config);
        Arc::new(Self {
            cache: SnapshotCache::new(),
            store,
            probe,
            channel,
            rest,
        })
    }
}
