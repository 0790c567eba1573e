//! Configuration for the serial bridge.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use mechination_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialBridgeConfig {
    /// MQTT broker settings
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Serial port settings
    pub serial: SerialConfig,

    /// Seconds to wait after a failed attempt before reconnecting
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_reconnect_interval_secs() -> u64 {
    2
}

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0`
    pub port: String,

    /// Baud rate (default: 115200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    115_200
}

impl BridgeConfig for SerialBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    fn validate(&self) -> mechination_bridge_framework::Result<()> {
        self.mqtt.validate()?;

        if self.serial.port.is_empty() {
            return Err(BridgeError::validation("serial.port cannot be empty"));
        }

        if self.serial.baud_rate == 0 {
            return Err(BridgeError::validation("serial.baud_rate must be positive"));
        }

        if self.reconnect_interval_secs < 1 {
            return Err(BridgeError::validation(
                "reconnect_interval_secs must be at least 1",
            ));
        }

        Ok(())
    }
}
