use async_trait::async_trait;
use std::time::Duration;

use crate::error::DeliveryError;

/// Timeout applied to every webhook request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound side of the pipeline: performs one form POST to a webhook.
///
/// Implementations are responsible for the actual HTTP exchange. A
/// response of any status is a success; only failures to complete the
/// request (connection refused, timeout, TLS, ...) are errors.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `text` as the form field `text` to `url`.
    ///
    /// **Returns**
    /// - `Ok(())` once the server answered, whatever the status.
    /// - `Err(DeliveryError::Transport)` if no response was obtained.
    async fn post_form(&self, url: &str, text: &str) -> Result<(), DeliveryError>;
}

/// [`WebhookTransport`] backed by `reqwest`.
///
/// Certificate verification is disabled and each request is bounded by
/// [`REQUEST_TIMEOUT`].
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Client(Box::new(e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post_form(&self, url: &str, text: &str) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(url)
            .form(&[("text", text)])
            .send()
            .await
            .map_err(|e| DeliveryError::transport(url, e.without_url()))?;

        // Status codes are not inspected; the chat service answering at all
        // counts as delivery.
        if !resp.status().is_success() {
            tracing::debug!(
                target: "rocketchat_log_sink",
                status = %resp.status(),
                "webhook answered with non-success status"
            );
        }
        Ok(())
    }
}

/// A transport that accepts every message without sending anything.
///
/// Useful for measuring the overhead of formatting and dispatch without
/// any network I/O.
#[derive(Clone, Default)]
pub struct NoopTransport;

#[async_trait]
impl WebhookTransport for NoopTransport {
    async fn post_form(&self, _url: &str, _text: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}
