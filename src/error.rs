use std::error::Error;

/// Error returned when a webhook POST could not be performed.
///
/// Only transport-level failures end up here. A response with a non-2xx
/// status still counts as delivered.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("failed to build http client: {0}")]
    Client(#[source] Box<dyn Error + Send + Sync>),

    /// `url` keeps the full hook URL; the message hides its token.
    #[error("webhook request to {} failed: {source}", redact_hook_url(.url))]
    Transport {
        url: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl DeliveryError {
    pub fn transport(url: impl Into<String>, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        DeliveryError::Transport { url: url.into(), source: source.into() }
    }
}

/// Replace the token segment of `{api_url}/hooks/{chat_id}/{token}` with `***`.
pub fn redact_hook_url(url: &str) -> String {
    let Some(hooks) = url.find("/hooks/") else {
        return url.to_string();
    };
    let chat_start = hooks + "/hooks/".len();
    match url[chat_start..].find('/') {
        Some(slash) => format!("{}/***", &url[..chat_start + slash]),
        None => url.to_string(),
    }
}

/// Error returned when a job could not be handed to a queue.
#[derive(thiserror::Error, Debug)]
pub enum QueueError {
    #[error("queue `{queue}` is full")]
    Full { queue: String },

    #[error("queue `{queue}` is closed")]
    Closed { queue: String },
}

/// Failure while rendering the exception section of a report.
///
/// The formatter never lets this escape; it logs it and keeps whatever
/// part of the message was already built.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to encode request inputs: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error returned by [`RocketChatHandler::handle`](crate::handler::RocketChatHandler::handle).
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Error type returned when parsing a level name.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level `{0}`")]
pub struct LevelParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_hides_token() {
        let err = DeliveryError::transport("https://chat.example.com/hooks/C1/s3cret", "connection refused");

        let message = err.to_string();
        assert_eq!(message, "webhook request to https://chat.example.com/hooks/C1/*** failed: connection refused");
        assert!(!message.contains("s3cret"));
    }

    #[test]
    fn redaction_leaves_other_urls_alone() {
        assert_eq!(redact_hook_url("https://chat.example.com/hooks/C1"), "https://chat.example.com/hooks/C1");
        assert_eq!(redact_hook_url("not a hook"), "not a hook");
    }
}
