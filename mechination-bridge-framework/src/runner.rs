//! Bridge runner for lifecycle management.

use std::time::Duration;

use tokio::signal;

use mechination_common::init_tracing;

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::connector::{Connector, Session};
use crate::error::{BridgeError, Result};

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - Reconnect supervision of connection attempts
/// - Graceful shutdown on Ctrl+C
///
/// # Example
///
/// ```ignore
/// use mechination_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
///     let connector = MyConnector::new(runner.config());
///
///     runner.run(connector).await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// The loaded configuration.
    config: C,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a bridge runner, initializing logging from the configuration.
    ///
    /// A `--log-level` in `args` wins over `RUST_LOG` and the config file.
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();

        let level_override = args.and_then(|a| a.log_level.as_deref());
        init_tracing(config.logging(), level_override)
            .map_err(|e| BridgeError::Logging(e.to_string()))?;

        tracing::info!(bridge = %name, version = env!("CARGO_PKG_VERSION"), "Starting bridge");

        Ok(Self { name, config })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Run connection attempts until Ctrl+C is received.
    ///
    /// Dropping the active attempt on shutdown closes its transports without
    /// a clean disconnect, which lets the broker publish the last will.
    pub async fn run<K: Connector>(self, mut connector: K) -> Result<()> {
        let interval = self.config.reconnect_interval();

        tracing::info!(
            bridge = %self.name,
            reconnect_interval = ?interval,
            "Bridge running. Press Ctrl+C to stop."
        );

        tokio::select! {
            _ = supervise(&self.name, &mut connector, interval) => {}
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    return Err(BridgeError::Io(e));
                }
                tracing::info!(bridge = %self.name, "Received shutdown signal");
            }
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Run connection attempts forever.
///
/// Each attempt connects, runs the session until it fails, and closes it.
/// After every attempt, failed or not, the supervisor waits exactly
/// `reconnect_interval` before connecting again.
pub async fn supervise<K: Connector>(name: &str, connector: &mut K, reconnect_interval: Duration) {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        tracing::info!(bridge = %name, attempt, "Opening transports");

        match run_attempt(connector).await {
            Ok(()) => tracing::warn!(
                bridge = %name,
                attempt,
                retry_in = ?reconnect_interval,
                "Session ended, reconnecting"
            ),
            Err(e) => tracing::error!(
                bridge = %name,
                attempt,
                error = %e,
                retry_in = ?reconnect_interval,
                "Connection attempt failed, will try again"
            ),
        }

        tokio::time::sleep(reconnect_interval).await;
    }
}

async fn run_attempt<K: Connector>(connector: &mut K) -> std::result::Result<(), K::Error> {
    let mut session = connector.connect().await?;
    let result = session.run().await;
    session.close().await;
    result
}

/// Convenience function to run a bridge with minimal boilerplate.
///
/// # Example
///
/// ```ignore
/// use mechination_bridge_framework::run_bridge;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     run_bridge::<MyBridgeConfig, _, _>("mybridge", "mybridge.json5", MyConnector::new).await
/// }
/// ```
pub async fn run_bridge<C, K, F>(
    name: &str,
    default_config: &'static str,
    make_connector: F,
) -> anyhow::Result<()>
where
    C: BridgeConfig,
    K: Connector,
    F: FnOnce(&C) -> K,
{
    let args = BridgeArgs::parse_with_default(default_config);
    let config = C::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let runner = BridgeRunner::new_with_args(name, config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let connector = make_connector(runner.config());

    runner
        .run(connector)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
