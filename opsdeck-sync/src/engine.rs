//! Per-collection sync controller.
//!
//! A `CollectionSync` is what a view binds to: it seeds synchronously from
//! cache or local store (never blocking on network), reconciles with the
//! backend when one is reachable, applies pushed deltas, and exposes
//! optimistic mutations that always land locally whatever the network does.
//!
//! Every mutation computes its final record deterministically from the
//! server response, the store result, and the input *after* its awaits, and
//! is the sole writer of that record into snapshot and cache — no stale
//! snapshot captured before an await is ever written back. The one accepted
//! race is a background fetch resolving after an optimistic mutation, which
//! replaces the snapshot wholesale (last writer wins); the store change feed
//! re-converges consumers afterwards.

use crate::channel::{ChannelEvent, ChannelEventKind};
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::rest::FetchOutcome;
use opsdeck_types::{matches_id, record_id, CollectionSpec, RecordId};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Controller for one collection, bound to one consumer.
pub struct CollectionSync {
    spec: CollectionSpec,
    ctx: Arc<SyncContext>,
    snapshot: Arc<RwLock<Vec<Value>>>,
    offline: AtomicBool,
    loading: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CollectionSync {
    /// Mounts a consumer: seeds synchronously from the cache when it holds
    /// data for this collection, else from the local store.
    pub fn mount(ctx: Arc<SyncContext>, spec: CollectionSpec) -> Self {
        let seed = ctx
            .cache
            .get(&spec.name)
            .filter(|snapshot| !snapshot.is_empty())
            .unwrap_or_else(|| ctx.store.get_all(&spec.name));
        let loading = !spec.is_local_only();
        Self {
            spec,
            ctx,
            snapshot: Arc::new(RwLock::new(seed)),
            offline: AtomicBool::new(false),
            loading: AtomicBool::new(loading),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The records currently known to this consumer, newest first for
    /// records created this session.
    pub fn snapshot(&self) -> Vec<Value> {
        self.snapshot.read().unwrap().clone()
    }

    /// Whether the last network attempt for this collection failed.
    /// Informational: the engine keeps working against local data.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Whether an initial fetch is still outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Runs the full background path: probe, fetch, live-subscribe, and
    /// watch the store change feed. Safe to call once after `mount`.
    pub async fn synchronize(&self) {
        self.fetch_from_backend(false).await;
        self.subscribe_channel().await;
        self.watch_store();
    }

    /// Re-runs the fetch without flipping the loading indicator, so the
    /// existing snapshot stays visible while the refresh is in flight.
    pub async fn refresh(&self) {
        self.fetch_from_backend(true).await;
    }

    async fn fetch_from_backend(&self, quiet: bool) {
        let Some(endpoint) = self.spec.endpoint.clone() else {
            // Local-only collection: the seeded state is the state.
            self.loading.store(false, Ordering::SeqCst);
            return;
        };
        if !quiet {
            self.loading.store(true, Ordering::SeqCst);
        }

        if !self.ctx.probe.check().await {
            self.offline.store(true, Ordering::SeqCst);
            self.loading.store(false, Ordering::SeqCst);
            return;
        }

        match self.ctx.rest.fetch_collection(&endpoint).await {
            Ok(FetchOutcome::Records(records)) => {
                let holding_data = !self.snapshot.read().unwrap().is_empty();
                if records.is_empty() && holding_data {
                    // A transient empty response is not evidence of deletion.
                    debug!(
                        collection = %self.spec.name,
                        "empty fetch against non-empty snapshot, keeping local data"
                    );
                } else {
                    *self.snapshot.write().unwrap() = records.clone();
                    self.ctx.cache.set(&self.spec.name, records.clone());
                    self.ctx.store.put_all(&self.spec.name, &records);
                }
                self.offline.store(false, Ordering::SeqCst);
            }
            Ok(FetchOutcome::NotProvisioned) => {
                // Endpoint optional; the collection just isn't served here.
                self.offline.store(false, Ordering::SeqCst);
            }
            Ok(FetchOutcome::Unrecognized) => {
                warn!(
                    collection = %self.spec.name,
                    "unrecognized fetch response shape, falling back to local data"
                );
            }
            Err(e) if e.is_timeout() => {
                debug!(collection = %self.spec.name, "fetch aborted by timeout");
            }
            Err(e) => {
                warn!(collection = %self.spec.name, error = %e, "fetch failed, going offline");
                self.offline.store(true, Ordering::SeqCst);
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Creates a record: optimistic local write, then reconciliation with
    /// the server-assigned identity when the backend is reachable.
    ///
    /// Connectivity failures are absorbed (the provisional record stands and
    /// the collection goes offline). Server rejections and identity-less
    /// responses are errors; they roll the provisional write back so the
    /// store does not drift from the visible state.
    pub async fn create(&self, record: Value) -> SyncResult<Value> {
        let local = self.ctx.store.create(&self.spec.name, record.clone());
        let local_id = record_id(&local);
        let mut item = local.clone();

        if let Some(endpoint) = self.spec.endpoint.as_deref() {
            if self.network_allowed() {
                match self.ctx.rest.create_record(endpoint, &record).await {
                    Ok(server_item) => item = server_item,
                    Err(e) if e.is_timeout() => {
                        debug!(collection = %self.spec.name, "create aborted by timeout, keeping provisional");
                    }
                    Err(e) if e.is_connectivity() => {
                        warn!(collection = %self.spec.name, error = %e, "create did not reach the server");
                        self.offline.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        // Full rollback: the provisional write may already
                        // have echoed into the snapshot via the store watch.
                        if let Some(id) = &local_id {
                            self.ctx.store.delete(&self.spec.name, id);
                            self.snapshot.write().unwrap().retain(|r| !matches_id(r, id));
                            self.ctx.cache.apply_delete(&self.spec.name, id);
                        }
                        return Err(e.into_sync());
                    }
                }
            }
        }

        let records = {
            let mut snapshot = self.snapshot.write().unwrap();
            // Drop both the provisional echo and any duplicate of the final
            // identity before prepending.
            for id in [record_id(&item), local_id].into_iter().flatten() {
                snapshot.retain(|r| !matches_id(r, &id));
            }
            snapshot.insert(0, item.clone());
            snapshot.clone()
        };
        self.ctx.cache.apply_create(&self.spec.name, item.clone());
        self.ctx.store.put_all(&self.spec.name, &records);
        Ok(item)
    }

    /// Updates a record: write-through to the store, lenient server
    /// round-trip, then a deterministic merge applied everywhere.
    ///
    /// Never fails: a local copy of the change already exists and will
    /// reconcile on the next successful sync.
    pub async fn update(&self, id: &RecordId, fields: Value) -> Value {
        let merged_local = self.ctx.store.update(&self.spec.name, id, &fields);
        let mut server_item = None;

        if let Some(endpoint) = self.spec.endpoint.as_deref() {
            if self.network_allowed() {
                match self.ctx.rest.update_record(endpoint, id, &fields).await {
                    Ok(item) => server_item = item,
                    Err(e) if e.is_timeout() => {
                        debug!(collection = %self.spec.name, "update aborted by timeout");
                    }
                    Err(e) if e.is_connectivity() => {
                        self.offline.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        warn!(collection = %self.spec.name, error = %e, "update rejected, keeping local merge");
                    }
                }
            }
        }

        let item = server_item
            .or(merged_local)
            .unwrap_or_else(|| fallback_merge(id, &fields));

        let records = {
            let mut snapshot = self.snapshot.write().unwrap();
            if let Some(existing) = snapshot.iter_mut().find(|r| matches_id(r, id)) {
                *existing = item.clone();
            }
            snapshot.clone()
        };
        self.ctx.cache.apply_update(&self.spec.name, item.clone());
        self.ctx.store.put_all(&self.spec.name, &records);
        item
    }

    /// Removes a record. The local removal applies regardless of network
    /// outcome; connectivity failures are swallowed, but a server rejection
    /// is surfaced after the local state has been cleaned up.
    pub async fn remove(&self, id: &RecordId) -> SyncResult<()> {
        self.ctx.store.delete(&self.spec.name, id);

        let mut rejection: Option<SyncError> = None;
        if let Some(endpoint) = self.spec.endpoint.as_deref() {
            if self.network_allowed() {
                match self.ctx.rest.delete_record(endpoint, id).await {
                    Ok(()) => {}
                    Err(e) if e.is_timeout() => {
                        debug!(collection = %self.spec.name, "delete aborted by timeout");
                    }
                    Err(e) if e.is_connectivity() => {
                        warn!(collection = %self.spec.name, error = %e, "delete did not reach the server");
                        self.offline.store(true, Ordering::SeqCst);
                    }
                    Err(e) => rejection = Some(e.into_sync()),
                }
            }
        }

        self.snapshot.write().unwrap().retain(|r| !matches_id(r, id));
        self.ctx.cache.apply_delete(&self.spec.name, id);

        match rejection {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn network_allowed(&self) -> bool {
        !self.is_offline() && self.ctx.probe.is_available()
    }

    // ── Background listeners ─────────────────────────────────────

    async fn subscribe_channel(&self) {
        let Some(prefix) = self.spec.channel_prefix.clone() else {
            return;
        };
        if self.spec.is_local_only() || !self.ctx.probe.is_available() {
            return;
        }
        if !self.ctx.channel.connect().await {
            return;
        }

        let mut rx = self.ctx.channel.subscribe();
        let snapshot = self.snapshot.clone();
        let ctx = self.ctx.clone();
        let collection = self.spec.name.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.prefix == prefix => {
                        apply_channel_event(&snapshot, &ctx, &collection, event);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(collection, skipped, "channel listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.tasks.lock().unwrap().push(task);
    }

    /// Re-seeds from the local store whenever another handle rewrites this
    /// collection's snapshot. This is the consistency fallback for
    /// local-only collections and for consumers without a live channel.
    fn watch_store(&self) {
        let mut rx = self.ctx.store.subscribe();
        let snapshot = self.snapshot.clone();
        let store = self.ctx.store.clone();
        let collection = self.spec.name.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) if change.collection == collection => {
                        let fresh = store.get_all(&collection);
                        let mut snapshot = snapshot.write().unwrap();
                        if *snapshot != fresh {
                            *snapshot = fresh;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {
                        // Next event re-reads the full snapshot anyway.
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.tasks.lock().unwrap().push(task);
    }
}

impl Drop for CollectionSync {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

fn fallback_merge(id: &RecordId, fields: &Value) -> Value {
    let mut item = fields.clone();
    if let Some(obj) = item.as_object_mut() {
        obj.insert("id".to_string(), id.to_value());
    }
    item
}

fn apply_channel_event(
    snapshot: &RwLock<Vec<Value>>,
    ctx: &SyncContext,
    collection: &str,
    event: ChannelEvent,
) {
    match event.kind {
        ChannelEventKind::Created => {
            let mut snapshot = snapshot.write().unwrap();
            match record_id(&event.payload) {
                Some(id) => {
                    if let Some(existing) = snapshot.iter_mut().find(|r| matches_id(r, &id)) {
                        *existing = event.payload.clone();
                    } else {
                        snapshot.insert(0, event.payload.clone());
                    }
                }
                None => snapshot.insert(0, event.payload.clone()),
            }
            drop(snapshot);
            ctx.cache.apply_create(collection, event.payload);
        }
        ChannelEventKind::Updated => {
            let Some(id) = record_id(&event.payload) else {
                return;
            };
            let mut snapshot = snapshot.write().unwrap();
            if let Some(existing) = snapshot.iter_mut().find(|r| matches_id(r, &id)) {
                *existing = event.payload.clone();
            }
            drop(snapshot);
            ctx.cache.apply_update(collection, event.payload);
        }
        ChannelEventKind::Deleted => {
            let Some(id) = record_id(&event.payload).or_else(|| RecordId::from_value(&event.payload))
            else {
                return;
            };
            snapshot.write().unwrap().retain(|r| !matches_id(r, &id));
            ctx.cache.apply_delete(collection, &id);
        }
    }
}
