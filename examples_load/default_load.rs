use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use rocketchat_log_sink::handler::{DeliveryTarget, RocketChatHandler};
use rocketchat_log_sink::init::{init_tracing_with_config, LayerConfig};
use rocketchat_log_sink::level::Level;
use rocketchat_log_sink::transport::NoopTransport;

#[tokio::main]
async fn main() {
    let handler = RocketChatHandler::new(
        Level::Error,
        DeliveryTarget::new("http://127.0.0.1:3000", "token", "chat"),
        Arc::new(NoopTransport),
    );

    let layer_config = LayerConfig {
        channel_buffer: 50_000,
        min_level: Level::Error,
        enable_stdout: false,
    };

    if let Err(e) = init_tracing_with_config(Arc::new(handler), layer_config) {
        eprintln!("failed to install subscriber: {}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("noop transport: logged {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
}
