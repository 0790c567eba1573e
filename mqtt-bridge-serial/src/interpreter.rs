//! Status line interpretation.
//!
//! Every protocol line the devices send is either an entity declaration,
//! which becomes a Home Assistant discovery message, or a state update for
//! an entity that was declared earlier.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as Json, json};

use mechination_common::TopicBuilder;

use crate::error::{Error, Result};
use crate::tokenizer::{Fields, Lexer, LineValues};

/// Home Assistant component of a declared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Switch,
    Light,
    Text,
    Button,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [Self::Switch, Self::Light, Self::Text, Self::Button];

    /// Parse the keyword that opens a declaration line.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "switch" => Some(Self::Switch),
            "light" => Some(Self::Light),
            "text" => Some(Self::Text),
            "button" => Some(Self::Button),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Light => "light",
            Self::Text => "text",
            Self::Button => "button",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logical device an entity belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

impl DeviceIdentity {
    /// Derive the device from an entity id by dropping everything from the
    /// last underscore on.
    pub fn from_entity_id(entity_id: &str) -> Self {
        let id = match entity_id.rfind('_') {
            Some(idx) => &entity_id[..idx],
            None => entity_id,
        };

        Self {
            id: id.to_string(),
            name: infer_device_name(id),
        }
    }
}

static NUMBERED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z_]*?)_*(\d+)$").unwrap());

/// Turn a device id into a display name.
///
/// ```
/// use mqtt_bridge_serial::interpreter::infer_device_name;
///
/// assert_eq!(infer_device_name("relay_1"), "Relay 1");
/// assert_eq!(infer_device_name("kitchen_light"), "Kitchen Light");
/// assert_eq!(infer_device_name("relay"), "relay");
/// ```
pub fn infer_device_name(device_id: &str) -> String {
    if let Some(caps) = NUMBERED_NAME.captures(device_id) {
        return format!("{} {}", title_case(&caps[1]), &caps[2]);
    }

    if device_id.contains('_') {
        return title_case(device_id);
    }

    device_id.to_string()
}

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// A parsed `{type} {entity_id} {key=value}*` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDeclaration {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub fields: Fields,
}

impl EntityDeclaration {
    pub fn device(&self) -> DeviceIdentity {
        DeviceIdentity::from_entity_id(&self.entity_id)
    }
}

/// One classified status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Declaration(EntityDeclaration),
    Update { entity_id: String, values: LineValues },
}

/// Tokenize and classify a status line.
pub fn parse_status(line: &str) -> Result<StatusLine> {
    let mut lexer = Lexer::new(line);
    let leading = lexer.read_identifier()?;

    let Some(entity_type) = EntityType::from_keyword(leading) else {
        return Ok(StatusLine::Update {
            entity_id: leading.to_string(),
            values: lexer.read_values()?,
        });
    };

    let entity_id = lexer.read_identifier()?.to_string();
    match lexer.read_values()? {
        LineValues::Fields(fields) => Ok(StatusLine::Declaration(EntityDeclaration {
            entity_type,
            entity_id,
            fields,
        })),
        LineValues::Scalar(scalar) => Err(Error::protocol(format!(
            "{} {} expects key=value fields, got '{}'",
            entity_type, entity_id, scalar
        ))),
        LineValues::Empty => Err(Error::protocol(format!(
            "{} {} has no fields",
            entity_type, entity_id
        ))),
    }
}

/// What a publish carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishKind {
    Discovery,
    State,
}

/// A message ready to hand to the broker. Never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishIntent {
    pub kind: PublishKind,
    pub topic: String,
    pub payload: String,
}

/// Turns status lines into discovery and state publishes.
#[derive(Debug, Clone)]
pub struct StatusInterpreter {
    topics: TopicBuilder,
}

impl StatusInterpreter {
    pub fn new(topics: TopicBuilder) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    pub fn interpret(&self, line: &str) -> Result<PublishIntent> {
        Ok(match parse_status(line)? {
            StatusLine::Declaration(declaration) => self.discovery(&declaration),
            StatusLine::Update { entity_id, values } => self.state(&entity_id, &values),
        })
    }

    /// Build the discovery message for a declared entity.
    ///
    /// The declared fields are laid over the generated ones and win on a
    /// key collision.
    pub fn discovery(&self, declaration: &EntityDeclaration) -> PublishIntent {
        let entity_id = declaration.entity_id.as_str();
        let device = declaration.device();

        let mut message = Map::new();
        message.insert(
            "unique_id".to_string(),
            json!(format!("{}_{}", self.topics.client_id(), entity_id)),
        );
        message.insert("object_id".to_string(), json!(entity_id));
        message.insert("state_topic".to_string(), json!(self.topics.state(entity_id)));
        message.insert(
            "command_topic".to_string(),
            json!(self.topics.command(entity_id)),
        );
        message.insert(
            "availability".to_string(),
            json!([{ "topic": self.topics.availability() }]),
        );
        message.insert("optimistic".to_string(), json!(false));
        message.insert("qos".to_string(), json!(0));
        message.insert(
            "device".to_string(),
            json!({
                "identifiers": [format!("{}-{}", self.topics.client_id(), device.id)],
                "name": device.name,
            }),
        );

        if declaration.entity_type == EntityType::Light {
            message.insert("schema".to_string(), json!("json"));
        }

        for (key, value) in declaration.fields.iter() {
            message.insert(key.to_string(), value.to_json());
        }

        PublishIntent {
            kind: PublishKind::Discovery,
            topic: self
                .topics
                .discovery(declaration.entity_type.as_str(), entity_id),
            payload: Json::Object(message).to_string(),
        }
    }

    /// Build the state publish for an entity.
    pub fn state(&self, entity_id: &str, values: &LineValues) -> PublishIntent {
        let payload = match values {
            LineValues::Scalar(scalar) => scalar.clone(),
            LineValues::Fields(fields) => Json::Object(fields.to_json()).to_string(),
            LineValues::Empty => Json::Null.to_string(),
        };

        PublishIntent {
            kind: PublishKind::State,
            topic: self.topics.state(entity_id),
            payload,
        }
    }
}
