//! Environment variable names used by this crate for convenient
//! configuration of the handler from services.
//!
//! These are purely helpers; the handler and formatter types remain
//! decoupled from environment access.

use crate::formatter::{parse_tags, FormatterConfig};
use crate::handler::DeliveryTarget;
use crate::level::Level;
use crate::queue::QueueTarget;

/// Base URL of the chat server, e.g. `https://chat.example.com`.
pub const ROCKETCHAT_API_URL_ENV: &str = "ROCKETCHAT_API_URL";

/// Webhook token.
pub const ROCKETCHAT_TOKEN_ENV: &str = "ROCKETCHAT_TOKEN";

/// Webhook chat / channel id.
pub const ROCKETCHAT_CHAT_ID_ENV: &str = "ROCKETCHAT_CHAT_ID";

/// Optional queue name; when set, delivery is queued.
pub const ROCKETCHAT_QUEUE_ENV: &str = "ROCKETCHAT_QUEUE";

/// Optional queue connection name.
pub const ROCKETCHAT_QUEUE_CONNECTION_ENV: &str = "ROCKETCHAT_QUEUE_CONNECTION";

/// Minimum level, e.g. `error`.
pub const ROCKETCHAT_LEVEL_ENV: &str = "ROCKETCHAT_LEVEL";

/// Comma separated tag list.
pub const ROCKETCHAT_TAGS_ENV: &str = "ROCKETCHAT_TAGS";

/// `false` / `0` disables rich text markers.
pub const ROCKETCHAT_RICH_TEXT_ENV: &str = "ROCKETCHAT_RICH_TEXT";

/// Environment name shown in exception reports.
pub const ROCKETCHAT_ENVIRONMENT_ENV: &str = "ROCKETCHAT_ENVIRONMENT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Webhook target from `ROCKETCHAT_API_URL`, `ROCKETCHAT_TOKEN` and
/// `ROCKETCHAT_CHAT_ID`. Missing values are left empty and surface as
/// failed deliveries.
pub fn delivery_target_from_env() -> DeliveryTarget {
    DeliveryTarget::new(
        env_or(ROCKETCHAT_API_URL_ENV, ""),
        env_or(ROCKETCHAT_TOKEN_ENV, ""),
        env_or(ROCKETCHAT_CHAT_ID_ENV, ""),
    )
}

/// Queue target if `ROCKETCHAT_QUEUE` is set.
pub fn queue_target_from_env() -> Option<QueueTarget> {
    let mut target = QueueTarget::new(env_non_empty(ROCKETCHAT_QUEUE_ENV)?);
    target.connection = env_non_empty(ROCKETCHAT_QUEUE_CONNECTION_ENV);
    Some(target)
}

/// Level from `ROCKETCHAT_LEVEL`, `Error` when unset or unknown.
pub fn level_from_env() -> Level {
    env_non_empty(ROCKETCHAT_LEVEL_ENV)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(Level::Error)
}

/// Formatter settings on top of the defaults.
pub fn formatter_config_from_env() -> FormatterConfig {
    let mut config = FormatterConfig::default();
    if let Some(tags) = env_non_empty(ROCKETCHAT_TAGS_ENV) {
        config.tags = parse_tags(&tags);
    }
    if let Some(rich) = env_non_empty(ROCKETCHAT_RICH_TEXT_ENV) {
        config.use_rich_text = !matches!(rich.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
    }
    if let Some(environment) = env_non_empty(ROCKETCHAT_ENVIRONMENT_ENV) {
        config.environment = environment;
    }
    config
}
