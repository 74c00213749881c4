//! HTTP delivery of a single push request.
//!
//! [`PushTransport`] keeps the dispatcher independent of the HTTP client so
//! batches can be driven against scripted responses in tests.
//! [`HttpTransport`] is the production implementation on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use thiserror::Error;

use crate::constants::{user_agent, HTTP_REQUEST_TIMEOUT};
use crate::vendor::PushHeaders;

/// One POST to a push service.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Full subscription endpoint.
    pub endpoint: Url,
    /// Vendor-shaped headers, including `TTL`.
    pub headers: PushHeaders,
    /// Serialized notification payload.
    pub body: Bytes,
}

/// What the push service answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text (may be empty).
    pub body: String,
}

/// Failure to get any HTTP response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the request timeout.
    #[error("push request timed out after {0:?}")]
    Timeout(Duration),
    /// Connection, TLS or protocol failure.
    #[error("push request failed: {0}")]
    Http(String),
}

/// Sends push requests.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// POST `request` and return the status and body.
    async fn post(&self, request: PushRequest) -> Result<PushResponse, TransportError>;
}

#[async_trait]
impl<T: PushTransport + ?Sized> PushTransport for std::sync::Arc<T> {
    async fn post(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        (**self).post(request).await
    }
}

/// `reqwest`-backed transport.
///
/// Reuse one instance across batches for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with the default request timeout.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(HTTP_REQUEST_TIMEOUT)
    }

    /// Build a transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PushTransport for HttpTransport {
    async fn post(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        let mut builder = self.client.post(request.endpoint);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = body_text(status, response.text().await);
        Ok(PushResponse { status, body })
    }
}

/// Response body, or a note that it could not be read.
fn body_text<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        log::debug!("[WebPush] Failed to read {status} response body: {e}");
        format!("HTTP {status} (body unreadable: {e})")
    })
}
