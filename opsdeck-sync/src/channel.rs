//! Real-time push channel.
//!
//! At most one live connection per process, shared by every collection
//! controller. The channel is strictly best-effort: it is connected lazily,
//! never reconnected, and any failure silently degrades the process to
//! fetch-and-store operation while marking the backend unavailable so no
//! other component wastes a timeout on it.

use crate::probe::BackendProbe;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Host suffixes of static hosting targets that cannot terminate an event
/// stream. Origins matching these never get a connection attempt.
const UNSUPPORTED_HOST_SUFFIXES: &[&str] = &["github.io", "pages.dev"];

/// A create/update/delete notification pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// Collection event prefix the event belongs to.
    pub prefix: String,
    pub kind: ChannelEventKind,
    /// A record for create/update, an `{id}` object for delete.
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEventKind {
    Created,
    Updated,
    Deleted,
}

impl ChannelEvent {
    /// Parses a wire event. Names follow `{prefix}_{kind}`; the prefix may
    /// itself contain underscores, so the split is on the last one.
    pub fn parse(event_name: &str, data: &str) -> Option<Self> {
        let (prefix, kind) = event_name.rsplit_once('_')?;
        let kind = match kind {
            "created" => ChannelEventKind::Created,
            "updated" => ChannelEventKind::Updated,
            "deleted" => ChannelEventKind::Deleted,
            _ => return None,
        };
        let payload = serde_json::from_str(data).ok()?;
        Some(Self {
            prefix: prefix.to_string(),
            kind,
            payload,
        })
    }
}

/// Failure to establish the push connection.
#[derive(Debug, Error)]
#[error("channel connection failed: {0}")]
pub struct ChannelError(pub String);

/// A transport able to open one push connection and forward its events.
///
/// Implementations must not retry on their own: a failed or dropped
/// connection ends the transport for the rest of the process run.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Opens the connection to `origin` within `connect_timeout` and starts
    /// forwarding parsed events into `events` in receipt order. Returns once
    /// the connection is established (or has failed).
    async fn connect(
        &self,
        origin: &str,
        events: broadcast::Sender<ChannelEvent>,
        connect_timeout: Duration,
    ) -> Result<(), ChannelError>;
}

enum ChannelState {
    /// Not yet connected; a connect may still be attempted.
    Idle,
    Connected,
    /// A connect failed; never retried.
    Failed,
    /// The configured origin cannot carry the channel protocol.
    Unsupported,
}

/// Process-wide singleton owner of the push connection.
pub struct ChannelManager {
    origin: Option<String>,
    connect_timeout: Duration,
    probe: Arc<BackendProbe>,
    transport: Arc<dyn PushTransport>,
    events: broadcast::Sender<ChannelEvent>,
    state: Mutex<ChannelState>,
}

impl ChannelManager {
    /// Creates a manager. No connection is made until [`connect`].
    ///
    /// [`connect`]: ChannelManager::connect
    pub fn new(
        origin: Option<String>,
        connect_timeout: Duration,
        probe: Arc<BackendProbe>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let supported = origin.as_deref().is_some_and(origin_supported);
        let (events, _) = broadcast::channel(256);
        Self {
            origin,
            connect_timeout,
            probe,
            transport,
            events,
            state: Mutex::new(if supported {
                ChannelState::Idle
            } else {
                ChannelState::Unsupported
            }),
        }
    }

    /// Subscribes to pushed events. Valid whether or not a connection ever
    /// comes up; an unconnected channel simply never delivers.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Ensures the connection is up. Idempotent; returns whether events can
    /// be expected. A failed attempt marks the backend unavailable
    /// process-wide and is never retried.
    pub async fn connect(&self) -> bool {
        let mut state = self.state.lock().await;
        match *state {
            ChannelState::Connected => true,
            ChannelState::Failed | ChannelState::Unsupported => false,
            ChannelState::Idle => {
                if self.probe.is_unavailable() {
                    debug!("backend already marked unavailable, skipping channel connect");
                    return false;
                }
                // Unsupported state covers a missing origin.
                let origin = self.origin.as_deref().unwrap_or_default();
                match self
                    .transport
                    .connect(origin, self.events.clone(), self.connect_timeout)
                    .await
                {
                    Ok(()) => {
                        debug!(origin, "push channel connected");
                        *state = ChannelState::Connected;
                        true
                    }
                    Err(e) => {
                        warn!(origin, error = %e, "push channel failed, degrading to fetch-only");
                        self.probe.mark_unavailable();
                        *state = ChannelState::Failed;
                        false
                    }
                }
            }
        }
    }

    /// Whether a live connection is currently held.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ChannelState::Connected)
    }
}

fn origin_supported(origin: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(origin) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    !UNSUPPORTED_HOST_SUFFIXES
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")))
}

/// A mock transport for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// In-memory transport: connects instantly (or fails on demand) and
    /// lets tests inject events as if the server had pushed them.
    #[derive(Default)]
    pub struct MockTransport {
        fail: AtomicBool,
        connects: AtomicUsize,
        events: StdMutex<Option<broadcast::Sender<ChannelEvent>>>,
    }

    impl MockTransport {
        /// Creates a transport that connects successfully.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a transport whose connect attempts fail.
        pub fn failing() -> Self {
            let transport = Self::default();
            transport.fail.store(true, Ordering::SeqCst);
            transport
        }

        /// Number of connect attempts observed.
        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        /// Pushes an event to all subscribers, as the server would.
        /// Returns false when no connection was established.
        pub fn emit(&self, event: ChannelEvent) -> bool {
            match &*self.events.lock().unwrap() {
                Some(sender) => sender.send(event).is_ok(),
                None => false,
            }
        }
    }

    #[async_trait]
    impl PushTransport for MockTransport {
        async fn connect(
            &self,
            _origin: &str,
            events: broadcast::Sender<ChannelEvent>,
            _connect_timeout: Duration,
        ) -> Result<(), ChannelError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChannelError("mock connect refused".to_string()));
            }
            *self.events.lock().unwrap() = Some(events);
            Ok(())
        }
    }
}
