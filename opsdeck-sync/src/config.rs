//! Configuration for the sync engine.

use std::time::Duration;

/// Environment variable naming the API base URL.
pub const ENV_API_BASE: &str = "OPSDECK_API_BASE";
/// Environment variable naming the push-channel origin.
pub const ENV_CHANNEL_ORIGIN: &str = "OPSDECK_CHANNEL_ORIGIN";

/// Configuration for a [`crate::SyncContext`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST API, including the version prefix.
    pub api_base: String,
    /// Origin of the push channel. `None` disables the channel entirely.
    pub channel_origin: Option<String>,
    /// Bound on the one-shot health probe.
    pub health_timeout: Duration,
    /// Bound on collection fetches.
    pub fetch_timeout: Duration,
    /// Bound on establishing the push-channel connection.
    pub connect_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:4000/api/v1".to_string(),
            channel_origin: None,
            health_timeout: Duration::from_millis(3_000),
            fetch_timeout: Duration::from_millis(8_000),
            connect_timeout: Duration::from_millis(4_000),
        }
    }
}

impl SyncConfig {
    /// Builds a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base) = std::env::var(ENV_API_BASE) {
            if !base.is_empty() {
                config.api_base = base;
            }
        }
        if let Ok(origin) = std::env::var(ENV_CHANNEL_ORIGIN) {
            if !origin.is_empty() {
                config.channel_origin = Some(origin);
            }
        }
        config
    }

    /// Returns the health endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.api_base.trim_end_matches('/'))
    }

    /// Returns the URL for a collection endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}
