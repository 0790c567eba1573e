//! Broker command translation.
//!
//! Commands arrive on `mechination/<client_id>/<entity_path>/set` and are
//! forwarded to the serial bus as `<entity_id> <args>\r\n`. A JSON object
//! payload is flattened into `key=value` pairs first. Home Assistant coming
//! back online on `homeassistant/status` asks the devices to enumerate again.

use serde_json::Value as Json;

use mechination_common::{HA_STATUS_TOPIC, TopicBuilder};

use crate::error::{Error, Result};

/// Serial request that makes every device declare its entities again.
pub const ENUMERATE: &str = "enumerate";

/// A line to write to the serial bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialCommand {
    /// Forward a command to one entity.
    Entity { entity_id: String, args: String },
    /// Ask all devices to enumerate.
    Enumerate,
}

impl SerialCommand {
    /// The CRLF-terminated wire form.
    pub fn to_line(&self) -> String {
        match self {
            Self::Entity { entity_id, args } => format!("{} {}\r\n", entity_id, args),
            Self::Enumerate => format!("{}\r\n", ENUMERATE),
        }
    }
}

/// Translate a broker message into a serial command.
///
/// Returns `Ok(None)` for messages that need no serial write: anything other
/// than `online` on the status topic, and topics that are not command topics
/// of this bridge.
pub fn translate(topics: &TopicBuilder, topic: &str, payload: &[u8]) -> Result<Option<SerialCommand>> {
    if topic == HA_STATUS_TOPIC {
        return Ok((payload == b"online").then_some(SerialCommand::Enumerate));
    }

    let Some(entity_id) = topics.parse_command(topic) else {
        return Ok(None);
    };

    let payload = std::str::from_utf8(payload)
        .map_err(|e| Error::protocol(format!("command for {} is not UTF-8: {}", entity_id, e)))?;

    Ok(Some(SerialCommand::Entity {
        args: render_args(payload)?,
        entity_id,
    }))
}

/// Render a command payload as serial arguments.
///
/// A payload starting with `{` must be a JSON object and becomes
/// space-separated `key=value` pairs in document order. String values are
/// written without quotes, so a value containing a space cannot round-trip.
/// Any other payload is passed through untouched.
///
/// ```
/// use mqtt_bridge_serial::commands::render_args;
///
/// assert_eq!(render_args(r#"{"state":"ON","brightness":40}"#).unwrap(), "state=ON brightness=40");
/// assert_eq!(render_args("ON").unwrap(), "ON");
/// ```
pub fn render_args(payload: &str) -> Result<String> {
    if !payload.starts_with('{') {
        return Ok(payload.to_string());
    }

    let parsed: Json = serde_json::from_str(payload)
        .map_err(|e| Error::protocol(format!("invalid JSON command: {}", e)))?;

    let Json::Object(fields) = parsed else {
        return Err(Error::protocol("JSON command is not an object"));
    };

    Ok(fields
        .iter()
        .map(|(key, value)| match value {
            Json::String(s) => format!("{}={}", key, s),
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(" "))
}
