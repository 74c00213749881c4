//! Batch push dispatch.
//!
//! For each subscription: derive the endpoint origin and vendor, get a
//! VAPID token for that origin, shape the headers, POST the payload, and
//! classify the answer. Sends run concurrently up to a cap; results come
//! back in input order.
//!
//! # Classification
//!
//! | Response | Outcome | Flagged for removal |
//! |---|---|---|
//! | 2xx | `success` | no |
//! | 404, 410 | `failed` | yes |
//! | other status | `failed` (body kept as detail) | no |
//! | timeout, transport, URL or signing error | `error` | no |
//!
//! Flagged endpoints are deleted from the store in one call after the whole
//! batch has been sent, so a cleanup failure never blocks delivery.

// Rust guideline compliant 2026-02

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use futures_util::{future, stream, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::constants::{DEFAULT_MAX_CONCURRENCY, HTTP_REQUEST_TIMEOUT, MAX_ERROR_DETAIL_LEN};
use crate::error::PushError;
use crate::store::{PushSubscription, SubscriptionFilter, SubscriptionStore};
use crate::transport::{PushRequest, PushResponse, PushTransport, TransportError};
use crate::vapid::VapidSigner;
use crate::vendor::{build_headers, PushVendor};

/// Outcome of one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Push service accepted the message.
    Success,
    /// Push service answered with a non-2xx status.
    Failed,
    /// No usable answer: bad endpoint, signing failure, timeout or transport error.
    Error,
}

/// Result row for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Subscription endpoint.
    pub endpoint: String,
    /// Host part of the endpoint (empty if it did not parse).
    pub endpoint_host: String,
    /// Vendor derived from the host.
    pub endpoint_type: PushVendor,
    /// What happened.
    pub outcome: Outcome,
    /// HTTP status, when a response arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Response body or error message for non-successful sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Whether the endpoint was flagged for deletion.
    pub removed: bool,
}

/// Aggregate report for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Rows with outcome `success`.
    pub sent: usize,
    /// Rows with outcome `failed` or `error`.
    pub failed: usize,
    /// Endpoints flagged as gone.
    pub removed: usize,
    /// Rows produced.
    pub total_processed: usize,
    /// Subscriptions never attempted because the batch was cancelled.
    pub skipped: usize,
    /// Whether the batch was cancelled before every send started.
    pub cancelled: bool,
    /// One row per processed subscription, in input order.
    pub results: Vec<DispatchResult>,
    /// Endpoints flagged as gone (404/410).
    pub removed_endpoints: Vec<String>,
    /// Set when deleting flagged endpoints from the store failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

impl DispatchReport {
    fn from_results(results: Vec<DispatchResult>, total: usize, cancelled: bool) -> Self {
        let sent = results.iter().filter(|r| r.outcome == Outcome::Success).count();
        let removed_endpoints: Vec<String> = results
            .iter()
            .filter(|r| r.removed)
            .map(|r| r.endpoint.clone())
            .collect();
        let total_processed = results.len();

        Self {
            sent,
            failed: total_processed - sent,
            removed: removed_endpoints.len(),
            total_processed,
            skipped: total - total_processed,
            cancelled,
            results,
            removed_endpoints,
            cleanup_error: None,
        }
    }
}

/// How a status code is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx.
    Delivered,
    /// 404/410: the subscription will never work again.
    Gone,
    /// Anything else; possibly transient.
    Rejected,
}

/// Classify a push service status code.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Delivered,
        404 | 410 => StatusClass::Gone,
        _ => StatusClass::Rejected,
    }
}

/// Parsed endpoint: the URL, its origin (the JWT audience) and vendor.
#[derive(Debug, Clone)]
pub struct PushTarget {
    /// Full endpoint URL.
    pub url: Url,
    /// Endpoint host.
    pub host: String,
    /// `scheme://host[:port]`.
    pub audience: String,
    /// Vendor derived from the host.
    pub vendor: PushVendor,
}

impl PushTarget {
    /// Parse an endpoint string.
    pub fn parse(endpoint: &str) -> Result<Self, PushError> {
        let invalid = |reason: String| PushError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_string();
        let audience = url.origin().ascii_serialization();
        let vendor = PushVendor::classify(&host);

        Ok(Self {
            url,
            host,
            audience,
            vendor,
        })
    }
}

/// Sends notification batches to push services.
pub struct Dispatcher<T> {
    signer: VapidSigner,
    transport: T,
    max_concurrency: usize,
    request_timeout: Duration,
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("signer", &self.signer)
            .field("max_concurrency", &self.max_concurrency)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl<T: PushTransport> Dispatcher<T> {
    /// Create a dispatcher. The signer already holds validated keys, so a
    /// bad key pair can never reach this point.
    pub fn new(signer: VapidSigner, transport: T) -> Self {
        Self {
            signer,
            transport,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: HTTP_REQUEST_TIMEOUT,
        }
    }

    /// Cap on simultaneous in-flight requests (minimum 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Give up on a single request after `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The signer used for every request.
    pub fn signer(&self) -> &VapidSigner {
        &self.signer
    }

    /// Send `payload` to every subscription and report per-endpoint outcomes.
    ///
    /// Only payload serialization can fail the call; everything that goes
    /// wrong with one subscription ends up on its result row. When `cancel`
    /// fires, no new sends start, in-flight sends finish, and the partial
    /// report is returned.
    pub async fn dispatch<P: Serialize + ?Sized>(
        &self,
        subscriptions: Vec<PushSubscription>,
        payload: &P,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, PushError> {
        let body = Bytes::from(serde_json::to_vec(payload)?);
        let total = subscriptions.len();

        let mut indexed: Vec<(usize, DispatchResult)> = stream::iter(subscriptions.into_iter().enumerate())
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|(index, subscription)| {
                let body = body.clone();
                async move { (index, self.send_one(&subscription, body).await) }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let results: Vec<DispatchResult> = indexed.into_iter().map(|(_, r)| r).collect();
        let cancelled = results.len() < total;
        if cancelled {
            log::warn!(
                "[Dispatch] Batch cancelled after {} of {} subscription(s)",
                results.len(),
                total
            );
        }

        let report = DispatchReport::from_results(results, total, cancelled);
        log::info!(
            "[Dispatch] sent={} failed={} removed={} total_processed={}",
            report.sent,
            report.failed,
            report.removed,
            report.total_processed
        );
        Ok(report)
    }

    /// List targets from `store`, dispatch, then delete endpoints reported gone.
    pub async fn dispatch_to_store<P: Serialize + ?Sized>(
        &self,
        store: &dyn SubscriptionStore,
        filter: &SubscriptionFilter,
        payload: &P,
        cancel: &CancellationToken,
    ) -> anyhow::Result<DispatchReport> {
        let subscriptions = store
            .list_subscriptions(filter)
            .await
            .context("Failed to list push subscriptions")?;
        if subscriptions.is_empty() {
            log::info!("[Dispatch] No subscriptions match {:?}", filter);
        }

        let mut report = self.dispatch(subscriptions, payload, cancel).await?;

        if !report.removed_endpoints.is_empty() {
            match store.delete_subscriptions(&report.removed_endpoints).await {
                Ok(count) => log::info!("[Dispatch] Removed {count} stale subscription(s)"),
                Err(e) => {
                    log::warn!("[Dispatch] Failed to remove stale subscriptions: {e:#}");
                    report.cleanup_error = Some(format!("{e:#}"));
                }
            }
        }

        Ok(report)
    }

    async fn send_one(&self, subscription: &PushSubscription, body: Bytes) -> DispatchResult {
        let target = match PushTarget::parse(&subscription.endpoint) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("[Dispatch] {e}");
                return DispatchResult {
                    endpoint: subscription.endpoint.clone(),
                    endpoint_host: String::new(),
                    endpoint_type: PushVendor::Generic,
                    outcome: Outcome::Error,
                    http_status: None,
                    error_detail: Some(e.to_string()),
                    removed: false,
                };
            }
        };

        let mut result = DispatchResult {
            endpoint: subscription.endpoint.clone(),
            endpoint_host: target.host.clone(),
            endpoint_type: target.vendor,
            outcome: Outcome::Error,
            http_status: None,
            error_detail: None,
            removed: false,
        };

        let jwt = match self.signer.token_for(&target.audience) {
            Ok(jwt) => jwt,
            Err(e) => {
                log::error!("[Dispatch] Signing for {} failed: {e}", target.host);
                result.error_detail = Some(e.to_string());
                return result;
            }
        };

        let request = PushRequest {
            headers: build_headers(target.vendor, &jwt, self.signer.public_key()),
            endpoint: target.url,
            body,
        };

        let response = tokio::time::timeout(self.request_timeout, self.transport.post(request))
            .await
            .unwrap_or(Err(TransportError::Timeout(self.request_timeout)));

        match response {
            Ok(PushResponse { status, body }) => {
                result.http_status = Some(status);
                match classify_status(status) {
                    StatusClass::Delivered => {
                        result.outcome = Outcome::Success;
                        log::debug!("[Dispatch] {} ({}) accepted: {status}", target.host, target.vendor);
                    }
                    StatusClass::Gone => {
                        result.outcome = Outcome::Failed;
                        result.removed = true;
                        result.error_detail = non_empty(body);
                        log::info!("[Dispatch] {} ({}) subscription gone: {status}", target.host, target.vendor);
                    }
                    StatusClass::Rejected => {
                        result.outcome = Outcome::Failed;
                        result.error_detail =
                            Some(non_empty(body).unwrap_or_else(|| format!("HTTP {status}")));
                        log::warn!("[Dispatch] {} ({}) rejected: {status}", target.host, target.vendor);
                    }
                }
            }
            Err(e) => {
                log::warn!("[Dispatch] {} ({}): {e}", target.host, target.vendor);
                result.error_detail = Some(e.to_string());
            }
        }

        result
    }
}

fn non_empty(body: String) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_ERROR_DETAIL_LEN).collect())
    }
}
