//! Backend availability prober.
//!
//! Decides once per process run whether the remote API should be attempted
//! at all, so one slow backend does not cost every view a timeout. The first
//! caller launches a single time-boxed health request; concurrent callers
//! await the same in-flight future, and the outcome is memoized until the
//! process (or a test, via [`BackendProbe::reset`]) starts over.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

type ProbeFuture = Shared<BoxFuture<'static, bool>>;

enum ProbeState {
    /// No probe attempted yet.
    Unknown,
    /// A probe is in flight; all callers share this future.
    Checking(ProbeFuture),
    /// The verdict for the rest of the process run.
    Settled(bool),
}

/// One-shot, memoized backend health check.
pub struct BackendProbe {
    client: reqwest::Client,
    health_url: String,
    timeout: Duration,
    state: Mutex<ProbeState>,
}

impl BackendProbe {
    /// Creates a prober against the given health URL.
    pub fn new(client: reqwest::Client, health_url: String, timeout: Duration) -> Self {
        Self {
            client,
            health_url,
            timeout,
            state: Mutex::new(ProbeState::Unknown),
        }
    }

    /// Returns whether the backend is reachable, probing at most once.
    pub async fn check(&self) -> bool {
        let probe = {
            let mut state = self.state.lock().unwrap();
            match &*state {
                ProbeState::Settled(available) => return *available,
                ProbeState::Checking(probe) => probe.clone(),
                ProbeState::Unknown => {
                    let probe = probe_once(
                        self.client.clone(),
                        self.health_url.clone(),
                        self.timeout,
                    )
                    .boxed()
                    .shared();
                    *state = ProbeState::Checking(probe.clone());
                    probe
                }
            }
        };

        let available = probe.await;

        let mut state = self.state.lock().unwrap();
        // mark_unavailable may have settled the state while we awaited.
        if matches!(&*state, ProbeState::Checking(_)) {
            *state = ProbeState::Settled(available);
        }
        match &*state {
            ProbeState::Settled(available) => *available,
            _ => available,
        }
    }

    /// Non-blocking peek: true only when a probe has settled as available.
    pub fn is_available(&self) -> bool {
        matches!(*self.state.lock().unwrap(), ProbeState::Settled(true))
    }

    /// Non-blocking peek: true only when a probe has settled as unavailable.
    pub fn is_unavailable(&self) -> bool {
        matches!(*self.state.lock().unwrap(), ProbeState::Settled(false))
    }

    /// Settles the verdict to unavailable for the rest of the process run.
    /// Used by the channel manager when the push connection fails.
    pub fn mark_unavailable(&self) {
        *self.state.lock().unwrap() = ProbeState::Settled(false);
    }

    /// Forgets the memoized verdict, as a fresh process run would.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = ProbeState::Unknown;
    }
}

async fn probe_once(client: reqwest::Client, url: String, timeout: Duration) -> bool {
    match client.get(&url).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(%url, "backend health probe succeeded");
            true
        }
        Ok(response) => {
            warn!(%url, status = %response.status(), "backend health probe rejected");
            false
        }
        Err(e) => {
            warn!(%url, error = %e, "backend health probe failed");
            false
        }
    }
}
