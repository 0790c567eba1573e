//! Mechination Common Library
//!
//! This crate provides shared types and utilities for Mechination MQTT bridges:
//!
//! - [`config`] - Configuration loading (JSON5 format) and the MQTT/logging sections
//! - [`mqtt`] - MQTT client option construction
//! - [`topics`] - Topic builders and parsers
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod mqtt;
pub mod topics;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig, parse_config};
pub use error::{Error, Result};
pub use mqtt::mqtt_options;
pub use topics::{
    DISCOVERY_PREFIX, HA_STATUS_TOPIC, SET_SUFFIX, TOPIC_PREFIX, TopicBuilder,
    validate_client_id,
};

/// Install the global tracing subscriber.
///
/// The filter comes from `level_override` when given, otherwise from
/// `RUST_LOG`, otherwise from `config.level`. `LogFormat::Json` emits one
/// flattened JSON object per event for log shippers.
///
/// # Example
///
/// ```ignore
/// use mechination_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config, Some("debug"))?;
/// ```
pub fn init_tracing(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match level_override {
        Some(level) => parse_filter(level)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => parse_filter(&config.level)?,
        },
    };

    let output = match config.format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("tracing is already initialized: {}", e)))
}

fn parse_filter(level: &str) -> Result<tracing_subscriber::EnvFilter> {
    tracing_subscriber::EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", level, e)))
}
