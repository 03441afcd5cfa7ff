use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

#[derive(Error, Debug)]
pub enum GovernorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("No tokio runtime available to drive the sampling timer")]
    NoRuntime,

    #[error("Adaptive quality is disabled by configuration")]
    Disabled,

    #[error("System error: {message}")]
    System { message: String },
}

impl GovernorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Failure reported by a quality listener. Never propagated out of a tick.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Listener '{listener}' failed: {message}")]
pub struct ListenerError {
    pub listener: String,
    pub message: String,
}

impl ListenerError {
    pub fn new<L: Into<String>, M: Into<String>>(listener: L, message: M) -> Self {
        Self {
            listener: listener.into(),
            message: message.into(),
        }
    }
}

/// Errors from the governor event bus
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

impl From<RecvError> for EventBusError {
    fn from(error: RecvError) -> Self {
        match error {
            RecvError::Lagged(skipped) => Self::Lagged { skipped },
            RecvError::Closed => Self::ChannelClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, GovernorError>;
