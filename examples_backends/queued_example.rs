use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::error;

use rocketchat_log_sink::env::{delivery_target_from_env, queue_target_from_env};
use rocketchat_log_sink::init::init_tracing;
use rocketchat_log_sink::queue::{LocalQueue, QueueTarget};
use rocketchat_log_sink::transport::{HttpTransport, WebhookTransport};
use rocketchat_log_sink::{DeliveryMode, Level, RocketChatHandler};

/// Delivery through the in-process queue: log calls return right away and
/// failed posts are retried by the queue worker.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transport: Arc<dyn WebhookTransport> = Arc::new(HttpTransport::new()?);
    let (queue, _worker) = LocalQueue::spawn(Arc::clone(&transport), 256);

    let target = queue_target_from_env().unwrap_or_else(|| QueueTarget::new("rocketchat"));
    let handler = RocketChatHandler::new(Level::Error, delivery_target_from_env(), transport)
        .with_mode(DeliveryMode::Queued { target, queue: Arc::new(queue) });

    init_tracing(Arc::new(handler))?;

    error!(db = "orders", "replica lag above threshold");

    sleep(Duration::from_secs(5)).await;
    Ok(())
}
