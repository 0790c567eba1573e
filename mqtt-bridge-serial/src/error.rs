//! Error types for the serial bridge.

use mechination_bridge_framework::BridgeError;
use thiserror::Error;

use crate::tokenizer::TokenizeError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a connection attempt.
#[derive(Error, Debug)]
pub enum Error {
    /// A malformed protocol line.
    #[error("Malformed line: {0}")]
    Tokenize(#[from] TokenizeError),

    /// A structurally unexpected payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failed to open the serial port.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial read or write failure.
    #[error("Serial I/O error: {0}")]
    SerialIo(#[from] std::io::Error),

    /// The broker connection failed.
    #[error("Broker connection error: {0}")]
    Broker(#[from] rumqttc::ConnectionError),

    /// Publishing, subscribing or configuration failure from the framework.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Tokenize,
    Protocol,
    Transport,
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Tokenize(_) => ErrorKind::Tokenize,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Serial(_)
            | Error::SerialIo(_)
            | Error::Broker(_)
            | Error::Bridge(_)
            | Error::Transport(_) => ErrorKind::Transport,
        }
    }
}
