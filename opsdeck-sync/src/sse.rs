//! Server-sent-events push transport.
//!
//! One long-lived GET of `{origin}/events`, retry policy `Never` so a
//! dropped stream ends the channel for the process run instead of
//! reconnecting behind the engine's back.

use crate::channel::{ChannelError, ChannelEvent, PushTransport};
use crate::probe::BackendProbe;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{retry, Event, EventSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// SSE-backed [`PushTransport`].
pub struct SseTransport {
    client: reqwest::Client,
    probe: Arc<BackendProbe>,
}

impl SseTransport {
    pub fn new(client: reqwest::Client, probe: Arc<BackendProbe>) -> Self {
        Self { client, probe }
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn connect(
        &self,
        origin: &str,
        events: broadcast::Sender<ChannelEvent>,
        connect_timeout: Duration,
    ) -> Result<(), ChannelError> {
        let url = format!("{}/events", origin.trim_end_matches('/'));
        let mut stream = EventSource::new(self.client.get(&url))
            .map_err(|e| ChannelError(e.to_string()))?;
        stream.set_retry_policy(Box::new(retry::Never));

        // The stream opens lazily; require the handshake within the bound.
        match tokio::time::timeout(connect_timeout, stream.next()).await {
            Ok(Some(Ok(Event::Open))) => {}
            Ok(Some(Ok(Event::Message(message)))) => {
                // Already live; don't drop the first event.
                if let Some(event) = ChannelEvent::parse(&message.event, &message.data) {
                    let _ = events.send(event);
                }
            }
            Ok(Some(Err(e))) => return Err(ChannelError(e.to_string())),
            Ok(None) => return Err(ChannelError("stream closed during handshake".to_string())),
            Err(_) => return Err(ChannelError("connect timed out".to_string())),
        }

        let probe = self.probe.clone();
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => {
                        match ChannelEvent::parse(&message.event, &message.data) {
                            Some(event) => {
                                let _ = events.send(event);
                            }
                            None => {
                                debug!(event = %message.event, "ignoring unrecognized channel event");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "push stream failed, not reconnecting");
                        probe.mark_unavailable();
                        break;
                    }
                }
            }
        });
        Ok(())
    }
}
