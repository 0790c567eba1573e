//! Error types for the bridge framework.

use thiserror::Error;

use mechination_common::Error as CommonError;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised while starting a bridge or talking to the broker.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Logging could not be set up.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The client request queue is closed.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    #[error("Failed to subscribe to {topic}: {message}")]
    Subscribe { topic: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<CommonError> for BridgeError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Parse(msg) => Self::ConfigParse(msg),
            CommonError::Config(msg) | CommonError::Topic(msg) => Self::ConfigValidation(msg),
        }
    }
}
