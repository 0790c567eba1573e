//! Mechination Bridge Framework
//!
//! Common abstractions for building bridges that translate a device transport
//! to MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (logging, reconnect supervision, Ctrl+C)
//! - [`Connector`] and [`Session`] traits describing one connection attempt
//! - [`Publisher`] for publishing to the broker with backpressure
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`Availability`] for the retained online/offline liveness flag
//!
//! # Example
//!
//! ```ignore
//! use mechination_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
//!     let connector = MyConnector::new(runner.config().clone());
//!
//!     // Run connection attempts until Ctrl+C
//!     runner.run(connector).await
//! }
//! ```

mod args;
mod config;
mod connector;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use connector::{Connector, Session};
pub use error::{BridgeError, Result};
pub use publisher::Publisher;
pub use runner::{BridgeRunner, run_bridge, supervise};
pub use status::Availability;

// Re-export commonly used types from mechination-common
pub use mechination_common::{LoggingConfig, MqttConfig, TopicBuilder};
