pub mod error;
pub mod level;
pub mod exception;
pub mod record;
pub mod formatter;
pub mod transport;
pub mod job;
pub mod queue;
pub mod handler;
pub mod layer;

pub mod init;
pub mod env;

pub use error::{DeliveryError, HandlerError, QueueError};
pub use exception::{ExceptionInfo, RequestContext, Severity, UserInfo};
pub use formatter::{ChatFormatter, FormatterConfig};
pub use handler::{DeliveryMode, DeliveryTarget, RocketChatHandler};
pub use level::Level;
pub use record::{LogPayload, LogRecord};
