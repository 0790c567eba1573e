use std::time::Duration;

use rumqttc::{LastWill, MqttOptions};

use crate::config::MqttConfig;
use crate::error::Result;

/// Build MQTT client options from the provided configuration.
///
/// The last will, when given, is registered with the broker on connect and
/// published by it if the connection drops without a clean disconnect.
pub fn mqtt_options(config: &MqttConfig, last_will: Option<LastWill>) -> Result<MqttOptions> {
    config.validate()?;

    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = %config.client_id,
        authenticated = config.username.is_some(),
        "Connecting to MQTT broker"
    );

    Ok(options)
}
