//! MQTT bridge for line-protocol serial device buses.

use mechination_bridge_framework::run_bridge;
use mqtt_bridge_serial::{SerialBridgeConfig, SerialConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_bridge::<SerialBridgeConfig, _, _>("serial", "serial-bridge.json5", SerialConnector::new).await
}
