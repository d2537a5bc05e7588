//! Relay sinks: deliver formatted messages to the webhook endpoint.
//!
//! Delivery is best-effort. A failed send is reported to the caller and
//! never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::RelayConfig;
use crate::display;

use super::message::OutboundMessage;

/// Connection timeout for webhook requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default overall timeout for webhook requests.
///
/// Each request also carries the session's own deadline from
/// [`RelayConfig::request_timeout`], which takes precedence.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of response body bytes kept in a delivery error.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Errors from a single delivery attempt.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Webhook request timed out")]
    Timeout,
    #[error("Webhook request failed: {0}")]
    Network(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// JSON body of a Discord webhook execution.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookPayload {
    pub username: String,
    pub avatar_url: String,
    pub content: String,
}

impl WebhookPayload {
    #[must_use]
    pub fn new(message: &OutboundMessage, config: &RelayConfig) -> Self {
        Self {
            username: config.display_name.clone(),
            avatar_url: config.avatar_url.clone(),
            content: message.content(),
        }
    }
}

/// Destination for relayed messages.
#[async_trait]
pub trait RelaySink: Send + Sync {
    /// Deliver one message using the session's config snapshot.
    async fn send(&self, message: &OutboundMessage, config: &RelayConfig)
        -> Result<(), DeliveryError>;
}

/// Build an HTTP client with proper timeout configuration.
fn build_http_client(timeout: Duration) -> Result<Client, DeliveryError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .map_err(|e| DeliveryError::Client(e.to_string()))
}

/// Posts messages to a Discord-compatible webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    timeout: Duration,
}

impl WebhookSink {
    /// Create a webhook sink whose client times out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Client` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            timeout,
        })
    }

    /// Get the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RelaySink for WebhookSink {
    async fn send(
        &self,
        message: &OutboundMessage,
        config: &RelayConfig,
    ) -> Result<(), DeliveryError> {
        let payload = WebhookPayload::new(message, config);

        let response = self
            .client
            .post(config.webhook_endpoint.trim())
            .timeout(config.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::trace!(status = status.as_u16(), "Webhook delivered");
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY_LEN {
            let cut = (0..=MAX_ERROR_BODY_LEN)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Prints messages to the terminal instead of posting them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

#[async_trait]
impl RelaySink for ConsoleSink {
    async fn send(
        &self,
        message: &OutboundMessage,
        config: &RelayConfig,
    ) -> Result<(), DeliveryError> {
        display::print_relayed(&config.display_name, &message.content());
        Ok(())
    }
}
