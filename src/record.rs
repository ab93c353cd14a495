use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::exception::{ExceptionInfo, RequestContext};
use crate::level::Level;

/// What a record reports: a plain log line or a captured failure.
#[derive(Debug, Clone, Serialize)]
pub enum LogPayload {
    Plain,
    Exception {
        exception: ExceptionInfo,
        request: Option<RequestContext>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: Level,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Structured context. `token` and `chat_id` entries override the
    /// handler's webhook credentials for this record only.
    pub context: BTreeMap<String, Value>,
    pub extra: BTreeMap<String, Value>,
    pub payload: LogPayload,
    /// Text rendered ahead of time; the handler sends it instead of
    /// formatting the record itself.
    pub formatted: Option<String>,
}

impl LogRecord {
    pub fn new(level: Level, channel: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            level,
            channel: channel.into(),
            timestamp: Utc::now(),
            message: message.into(),
            context: BTreeMap::new(),
            extra: BTreeMap::new(),
            payload: LogPayload::Plain,
            formatted: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo, request: Option<RequestContext>) -> Self {
        self.payload = LogPayload::Exception { exception, request };
        self
    }

    pub fn with_formatted(mut self, formatted: impl Into<String>) -> Self {
        self.formatted = Some(formatted.into());
        self
    }

    /// Context value as a string, accepting both strings and numbers.
    pub fn context_str(&self, key: &str) -> Option<String> {
        match self.context.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
