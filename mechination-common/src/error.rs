use thiserror::Error;

/// Errors shared by every Mechination crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A setting is missing or out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration document is not valid JSON5.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A client id or topic cannot be used in an MQTT topic.
    #[error("Invalid topic: {0}")]
    Topic(String),
}

/// Result type alias using Mechination's Error.
pub type Result<T> = std::result::Result<T, Error>;
