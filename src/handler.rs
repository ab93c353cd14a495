use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::formatter::ChatFormatter;
use crate::job::{JobStatus, OutboundMessage, SendJob};
use crate::level::Level;
use crate::queue::{JobQueue, QueueTarget};
use crate::record::LogRecord;
use crate::transport::WebhookTransport;

/// Longest message Rocket.Chat accepts, in Unicode code points.
pub const MESSAGE_SIZE_LIMIT: usize = 4096;

/// Webhook the handler posts to unless a record overrides the credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Base URL of the chat server, e.g. `https://chat.example.com`.
    pub api_url: String,
    pub token: String,
    pub chat_id: String,
}

impl DeliveryTarget {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, chat_id: impl fmt::Display) -> Self {
        DeliveryTarget { api_url: api_url.into(), token: token.into(), chat_id: chat_id.to_string() }
    }

    /// `{api_url}/hooks/{chat_id}/{token}`
    pub fn hook_url(&self, chat_id: &str, token: &str) -> String {
        format!("{}/hooks/{}/{}", self.api_url, chat_id, token)
    }
}

/// How a [`RocketChatHandler`] runs its [`SendJob`]s.
#[derive(Clone)]
pub enum DeliveryMode {
    /// POST on the caller's task and wait for it. The caller is held up
    /// for as long as the request takes (at most the transport timeout)
    /// and sees delivery errors.
    Inline,
    /// Hand the job to a queue and return immediately.
    Queued {
        target: QueueTarget,
        queue: Arc<dyn JobQueue>,
    },
}

impl fmt::Debug for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Inline => f.write_str("Inline"),
            DeliveryMode::Queued { target, .. } => f.debug_tuple("Queued").field(target).finish(),
        }
    }
}

/// Cut `text` to at most [`MESSAGE_SIZE_LIMIT`] code points.
pub fn truncate_to_limit(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(MESSAGE_SIZE_LIMIT) {
        Some((end, _)) => Cow::Owned(text[..end].to_string()),
        None => Cow::Borrowed(text),
    }
}

/// Sends log records to a Rocket.Chat incoming webhook.
///
/// Each record is formatted (unless it carries pre-rendered text), cut to
/// [`MESSAGE_SIZE_LIMIT`] and wrapped in a [`SendJob`], which runs inline
/// or on a queue depending on the [`DeliveryMode`].
pub struct RocketChatHandler {
    level: Level,
    target: DeliveryTarget,
    mode: DeliveryMode,
    formatter: ChatFormatter,
    transport: Arc<dyn WebhookTransport>,
}

impl RocketChatHandler {
    pub fn new(level: Level, target: DeliveryTarget, transport: Arc<dyn WebhookTransport>) -> Self {
        RocketChatHandler {
            level,
            target,
            mode: DeliveryMode::Inline,
            formatter: ChatFormatter::default(),
            transport,
        }
    }

    pub fn with_formatter(mut self, formatter: ChatFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_handling(&self, record: &LogRecord) -> bool {
        record.level >= self.level
    }

    /// Build the message a record would be delivered as.
    ///
    /// `token` / `chat_id` context entries replace the configured ones.
    pub fn outbound_message(&self, record: &LogRecord) -> OutboundMessage {
        let token = record.context_str("token").unwrap_or_else(|| self.target.token.clone());
        let chat_id = record.context_str("chat_id").unwrap_or_else(|| self.target.chat_id.clone());

        let text = match &record.formatted {
            Some(formatted) => truncate_to_limit(formatted).into_owned(),
            None => truncate_to_limit(&self.formatter.format(record)).into_owned(),
        };

        OutboundMessage { url: self.target.hook_url(&chat_id, &token), text }
    }

    /// Deliver a record.
    ///
    /// Records below the handler level are ignored. In inline mode a
    /// failed POST is returned as [`HandlerError::Delivery`]; in queued mode
    /// only submission errors are returned.
    pub async fn handle(&self, record: &LogRecord) -> Result<(), HandlerError> {
        if !self.is_handling(record) {
            return Ok(());
        }

        let job = SendJob::new(self.outbound_message(record));

        match &self.mode {
            DeliveryMode::Inline => match job.execute(&*self.transport).await {
                JobStatus::Completed => Ok(()),
                JobStatus::Failed(e) => Err(e.into()),
            },
            DeliveryMode::Queued { target, queue } => {
                let policy = job.retry_policy();
                queue.push(target, job, policy)?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(String::new(), 0)]
    #[case("short".to_string(), 5)]
    #[case("a".repeat(4096), 4096)]
    #[case("a".repeat(5000), 4096)]
    #[case("ж".repeat(4097), 4096)]
    #[case("🚀".repeat(9000), 4096)]
    fn truncates_by_code_point(#[case] text: String, #[case] expected: usize) {
        let out = truncate_to_limit(&text);
        assert_eq!(out.chars().count(), expected);
        assert!(text.starts_with(out.as_ref()));
    }

    #[test]
    fn short_text_is_borrowed() {
        assert!(matches!(truncate_to_limit("fits"), Cow::Borrowed("fits")));
    }

    #[test]
    fn hook_url_layout() {
        let target = DeliveryTarget::new("https://chat.example.com", "tok", 17);
        assert_eq!(target.hook_url(&target.chat_id, &target.token), "https://chat.example.com/hooks/17/tok");
    }
}
