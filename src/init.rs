use crate::handler::RocketChatHandler;
use crate::layer::RocketChatLayer;
use crate::level::Level;
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the Rocket.Chat logging layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of [`LogRecord`](crate::record::LogRecord)s
///   waiting for the handler before new ones are dropped.
/// - `min_level`: lowest level forwarded to the chat.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top so events are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            min_level: Level::Error,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that reports events to
/// Rocket.Chat through `handler`.
///
/// **Parameters**
/// - `handler`: the [`RocketChatHandler`] receiving every captured record.
/// - `config`: [`LayerConfig`] controlling buffering and the level
///   threshold of the layer.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already installed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    handler: Arc<RocketChatHandler>,
    config: LayerConfig,
) -> Result<(), SetGlobalDefaultError> {
    let (layer, _handle) = RocketChatLayer::new(handler, config.channel_buffer, config.min_level);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Initialize tracing with [`LayerConfig::default`], forwarding the
/// handler's own level and above.
pub fn init_tracing(handler: Arc<RocketChatHandler>) -> Result<(), SetGlobalDefaultError> {
    let config = LayerConfig { min_level: handler.level(), ..LayerConfig::default() };
    init_tracing_with_config(handler, config)
}
