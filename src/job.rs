use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DeliveryError;
use crate::transport::WebhookTransport;

/// Attempts a queue may make for one [`SendJob`], first run included.
pub const MAX_ATTEMPTS: u32 = 2;

/// Delay a queue should wait before running a failed job again.
pub const RETRY_DELAY: Duration = Duration::from_secs(120);

/// Retry hints handed to whatever executes a [`SendJob`].
///
/// The job itself never retries; the queue reads this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: MAX_ATTEMPTS, delay: RETRY_DELAY }
    }
}

/// A fully composed webhook message, consumed by exactly one [`SendJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// `{api_url}/hooks/{chat_id}/{token}`
    pub url: String,
    /// Already truncated message text.
    #[serde(rename = "message")]
    pub text: String,
}

/// Outcome of one [`SendJob::execute`] run.
#[derive(Debug)]
#[must_use]
pub enum JobStatus {
    Completed,
    /// The POST did not complete; the owner decides whether to retry.
    Failed(DeliveryError),
}

impl JobStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, JobStatus::Failed(_))
    }
}

/// Delivery task owning a single webhook POST.
///
/// Serializes as `{"url": .., "message": ..}` so queues can persist it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendJob {
    message: OutboundMessage,
}

impl SendJob {
    pub fn new(message: OutboundMessage) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &OutboundMessage {
        &self.message
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Perform the POST once.
    ///
    /// Transport failures are reported through [`JobStatus::Failed`] and
    /// never propagate further.
    pub async fn execute(&self, transport: &dyn WebhookTransport) -> JobStatus {
        match transport.post_form(&self.message.url, &self.message.text).await {
            Ok(()) => JobStatus::Completed,
            Err(e) => {
                tracing::warn!(target: "rocketchat_log_sink", error = %e, "webhook delivery failed");
                JobStatus::Failed(e)
            }
        }
    }
}
