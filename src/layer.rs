use crate::handler::RocketChatHandler;
use crate::level::Level;
use crate::record::LogRecord;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from this crate are never forwarded, so delivery diagnostics
/// cannot feed back into the webhook.
const OWN_TARGET: &str = "rocketchat_log_sink";

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// forwards them to a [`RocketChatHandler`] via a bounded channel and
/// background task.
///
/// Only events at or above `min_level` are captured. The application
/// thread never waits on the handler; whether the handler then posts
/// inline or queues is up to its [`DeliveryMode`](crate::handler::DeliveryMode).
pub struct RocketChatLayer {
    sender: mpsc::Sender<LogRecord>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl RocketChatLayer {
    /// Create a new layer and spawn a background task that pulls
    /// [`LogRecord`]s from a bounded channel and hands them to `handler`.
    ///
    /// `buffer` is raised to at least 16.
    pub fn new(handler: Arc<RocketChatHandler>, buffer: usize, min_level: Level) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = handler.handle(&record).await {
                    eprintln!("error delivering log record to rocket.chat: {}", e);
                }
            }
        });

        (Self {
            sender: tx,
            min_level,
            total_events,
            enqueued_events,
            dropped_events,
        }, handle)
    }
}

impl<S> Layer<S> for RocketChatLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if meta.target().starts_with(OWN_TARGET) {
            return;
        }
        let level = Level::from_tracing(meta.level());
        if level < self.min_level {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let mut record = LogRecord::new(level, meta.target(), message.unwrap_or_default());
        record.context = fields;
        if let Some(module_path) = meta.module_path() {
            record.extra.insert("module_path".to_string(), Value::from(module_path));
        }
        if let Some(file) = meta.file() {
            record.extra.insert("file".to_string(), Value::from(file));
        }
        if let Some(line) = meta.line() {
            record.extra.insert("line".to_string(), Value::from(line));
        }

        match self.sender.try_send(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("rocket.chat log channel full, dropping log record");
            }
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
