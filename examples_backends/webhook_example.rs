use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{error, info};

use rocketchat_log_sink::env::{delivery_target_from_env, formatter_config_from_env, level_from_env};
use rocketchat_log_sink::init::init_tracing;
use rocketchat_log_sink::transport::HttpTransport;
use rocketchat_log_sink::{ChatFormatter, ExceptionInfo, Level, LogRecord, RequestContext, RocketChatHandler};

#[derive(Debug, thiserror::Error)]
#[error("payment provider rejected the charge")]
struct ChargeError;

/// Posts inline to the webhook configured through `ROCKETCHAT_API_URL`,
/// `ROCKETCHAT_TOKEN` and `ROCKETCHAT_CHAT_ID`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransport::new()?);
    let handler = Arc::new(
        RocketChatHandler::new(level_from_env(), delivery_target_from_env(), transport)
            .with_formatter(ChatFormatter::new(formatter_config_from_env())),
    );

    // Report an error explicitly, with request data from the web layer.
    let mut request = RequestContext {
        url: "https://shop.example.com/checkout".to_string(),
        client_ip: "203.0.113.9".to_string(),
        method: Some("POST".to_string()),
        ..RequestContext::default()
    };
    request.params.insert("password".to_string(), "not-for-chat".into());
    request.params.insert("cart".to_string(), 1234.into());

    let record = LogRecord::new(Level::Critical, "checkout", "charge failed")
        .with_exception(ExceptionInfo::from_error(&ChargeError).with_status_code(502), Some(request));
    handler.handle(&record).await?;

    // Route everything else through tracing.
    init_tracing(Arc::clone(&handler))?;

    info!("service started");
    error!(order_id = 123, "order failed");

    sleep(Duration::from_secs(2)).await;
    Ok(())
}
