//! MQTT bridge for line-protocol serial device buses.
//!
//! This bridge reads status lines from a serial port, announces the entities
//! they declare through Home Assistant discovery, publishes their state, and
//! forwards MQTT commands back to the devices.
//!
//! # Topics
//!
//! ```text
//! homeassistant/<type>/<client_id>/<entity_id>/config   discovery
//! mechination/<client_id>/<entity_path>                 state
//! mechination/<client_id>/<entity_path>/set             commands
//! mechination/<client_id>/available                     online / offline
//! ```
//!
//! Where:
//! - `<type>` - `switch`, `light`, `text`, or `button`
//! - `<entity_path>` - the entity id with every `.` replaced by `/`
//!
//! # Serial protocol
//!
//! ```text
//! booting...                         diagnostic, logged only
//! \tswitch relay_1 state=OFF         declaration
//! \trelay_1 ON                       state update
//! relay_1 state=ON\r\n               command written to the bus
//! enumerate\r\n                      ask devices to declare again
//! ```

pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod line;
pub mod serial;
pub mod tokenizer;

pub use bridge::{BridgeSession, SerialConnector};
pub use config::{SerialBridgeConfig, SerialConfig};
pub use error::{Error, ErrorKind, Result};
