//! REST client for collection endpoints.
//!
//! Thin wrapper over a shared `reqwest::Client`: bounded per-request
//! timeouts, envelope normalization on every body, identity
//! canonicalization on every record that crosses the boundary. The client
//! reports *what happened*; connectivity policy (offline flags, fallbacks)
//! belongs to the engine.

use crate::config::SyncConfig;
use crate::envelope::Envelope;
use crate::error::SyncError;
use opsdeck_types::{canonicalize_identity, RecordId};
use serde_json::Value;
use thiserror::Error;

/// Outcome of a collection fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// An array-shaped snapshot.
    Records(Vec<Value>),
    /// 404 — the endpoint is optional and not provisioned. Not an error.
    NotProvisioned,
    /// 2xx but the body was not recognizable as an array. Ignored upstream.
    Unrecognized,
}

/// Errors from REST calls, split so the engine can tell local aborts from
/// genuine connectivity loss from server-side rejection.
#[derive(Debug, Error)]
pub enum RestError {
    /// Our own request timeout fired. A local abort, not a connectivity
    /// signal — must not flip the offline flag.
    #[error("request timed out")]
    TimedOut,

    /// Transport-level failure (DNS, refused connection, reset).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Non-2xx on a fetch. Treated as connectivity by the engine.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Non-2xx on a mutation, with whatever the server said about it.
    #[error("server rejected the request ({status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        validation: Option<Value>,
    },

    /// A created record carried no identity in any recognized field.
    #[error("created record carries no identity")]
    MissingIdentity,

    /// 2xx body that could not be used at all.
    #[error("invalid response: {0}")]
    Invalid(String),
}

impl RestError {
    /// Transport failures that should degrade the collection to offline.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RestError::Network(_) | RestError::Status(_))
    }

    /// Local aborts: absorbed without touching the offline flag.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RestError::TimedOut)
    }

    /// Converts a non-connectivity failure into the caller-facing error.
    pub fn into_sync(self) -> SyncError {
        match self {
            RestError::Rejected {
                status,
                message,
                validation,
            } => SyncError::Rejected {
                status,
                message,
                validation,
            },
            RestError::MissingIdentity => SyncError::MissingIdentity,
            other => SyncError::InvalidResponse(other.to_string()),
        }
    }
}

fn classify(e: reqwest::Error) -> RestError {
    if e.is_timeout() {
        RestError::TimedOut
    } else {
        RestError::Network(e)
    }
}

/// REST client bound to one API base.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    config: SyncConfig,
}

impl RestClient {
    /// Creates a client over a shared connection pool.
    pub fn new(client: reqwest::Client, config: SyncConfig) -> Self {
        Self { client, config }
    }

    /// Fetches a collection snapshot.
    pub async fn fetch_collection(&self, endpoint: &str) -> Result<FetchOutcome, RestError> {
        let url = self.config.endpoint_url(endpoint);
        let response = self
            .client
            .get(&url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(FetchOutcome::NotProvisioned);
        }
        if !status.is_success() {
            return Err(RestError::Status(status.as_u16()));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(RestError::TimedOut),
            Err(_) => return Ok(FetchOutcome::Unrecognized),
        };
        Ok(match Envelope::parse(body).into_records() {
            Some(records) => FetchOutcome::Records(records),
            None => FetchOutcome::Unrecognized,
        })
    }

    /// Creates a record; returns the server's record with a canonical `id`.
    pub async fn create_record(&self, endpoint: &str, record: &Value) -> Result<Value, RestError> {
        let url = self.config.endpoint_url(endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(self.config.fetch_timeout)
            .json(record)
            .send()
            .await
            .map_err(classify)?;

        let response = Self::check_rejection(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| RestError::Invalid(e.to_string()))?;
        let mut item = Envelope::parse(body)
            .into_item()
            .ok_or_else(|| RestError::Invalid("no record in create response".to_string()))?;
        canonicalize_identity(&mut item).ok_or(RestError::MissingIdentity)?;
        Ok(item)
    }

    /// Updates a record; returns the server's merged record when the
    /// response carried one in a recognizable shape.
    pub async fn update_record(
        &self,
        endpoint: &str,
        id: &RecordId,
        fields: &Value,
    ) -> Result<Option<Value>, RestError> {
        let url = format!("{}/{id}", self.config.endpoint_url(endpoint));
        let response = self
            .client
            .put(&url)
            .timeout(self.config.fetch_timeout)
            .json(fields)
            .send()
            .await
            .map_err(classify)?;

        let response = Self::check_rejection(response).await?;
        let Ok(body) = response.json::<Value>().await else {
            return Ok(None);
        };
        let item = Envelope::parse(body).into_item().and_then(|mut item| {
            canonicalize_identity(&mut item)?;
            Some(item)
        });
        Ok(item)
    }

    /// Deletes a record. 200 and 204 both count as success.
    pub async fn delete_record(&self, endpoint: &str, id: &RecordId) -> Result<(), RestError> {
        let url = format!("{}/{id}", self.config.endpoint_url(endpoint));
        let response = self
            .client
            .delete(&url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .map_err(classify)?;

        Self::check_rejection(response).await.map(|_| ())
    }

    async fn check_rejection(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        let validation = body.get("validationErrors").cloned();
        Err(RestError::Rejected {
            status: status.as_u16(),
            message,
            validation,
        })
    }
}
