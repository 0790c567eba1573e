use crate::error::{Error, Result};

/// Topic prefix for all bridge-owned state, command and availability topics.
pub const TOPIC_PREFIX: &str = "mechination";

/// Home Assistant discovery prefix.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Topic on which Home Assistant announces its own `online`/`offline` status.
pub const HA_STATUS_TOPIC: &str = "homeassistant/status";

/// Final segment of every command topic.
pub const SET_SUFFIX: &str = "set";

/// Builder for the topics owned by one bridge instance.
///
/// Topics follow the pattern:
/// `mechination/<client_id>/<entity_path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    client_id: String,
    base: String,
}

impl TopicBuilder {
    /// Create a topic builder for a client id.
    pub fn new(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            base: format!("{}/{}", TOPIC_PREFIX, client_id),
            client_id,
        }
    }

    /// The client id this builder namespaces topics with.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The `<prefix>/<client_id>` base shared by all bridge topics.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Build the topic of an entity exactly as named.
    ///
    /// # Example
    /// ```
    /// use mechination_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("btnbridge");
    /// assert_eq!(topics.entity("relay_1"), "mechination/btnbridge/relay_1");
    /// ```
    pub fn entity(&self, entity_id: &str) -> String {
        format!("{}/{}", self.base, entity_id)
    }

    /// Build the state topic of an entity, mapping every `.` to a topic level.
    ///
    /// # Example
    /// ```
    /// use mechination_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("btnbridge");
    /// assert_eq!(topics.state("zone.2"), "mechination/btnbridge/zone/2");
    /// ```
    pub fn state(&self, entity_id: &str) -> String {
        self.entity(&entity_id.replace('.', "/"))
    }

    /// Build the command topic of an entity, with the same `.` mapping as
    /// [`state`](Self::state).
    ///
    /// # Example
    /// ```
    /// use mechination_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("btnbridge");
    /// assert_eq!(topics.command("relay_1"), "mechination/btnbridge/relay_1/set");
    /// assert_eq!(topics.command("zone.2"), "mechination/btnbridge/zone/2/set");
    /// ```
    pub fn command(&self, entity_id: &str) -> String {
        format!("{}/{}", self.state(entity_id), SET_SUFFIX)
    }

    /// Build the bridge availability topic.
    ///
    /// # Example
    /// ```
    /// use mechination_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("btnbridge");
    /// assert_eq!(topics.availability(), "mechination/btnbridge/available");
    /// ```
    pub fn availability(&self) -> String {
        format!("{}/available", self.base)
    }

    /// Build the Home Assistant discovery topic for an entity.
    ///
    /// # Example
    /// ```
    /// use mechination_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("btnbridge");
    /// assert_eq!(
    ///     topics.discovery("switch", "relay_1"),
    ///     "homeassistant/switch/btnbridge/relay_1/config"
    /// );
    /// ```
    pub fn discovery(&self, component: &str, entity_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            DISCOVERY_PREFIX, component, self.client_id, entity_id
        )
    }

    /// Wildcard subscriptions covering one- and two-level command topics.
    pub fn command_wildcards(&self) -> [String; 2] {
        [
            format!("{}/+/{}", self.base, SET_SUFFIX),
            format!("{}/+/+/{}", self.base, SET_SUFFIX),
        ]
    }

    /// Every topic the bridge subscribes to.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = self.command_wildcards().to_vec();
        topics.push(HA_STATUS_TOPIC.to_string());
        topics
    }

    /// Extract the entity id from a command topic.
    ///
    /// Matches `<base>/<word>/set` and `<base>/<word>/<word>/set`, the two
    /// shapes covered by [`command_wildcards`](Self::command_wildcards). A word
    /// is made of letters, digits and underscores. Two levels join back into a
    /// dotted id, so `zone/2` names `zone.2`. Returns `None` for anything else.
    pub fn parse_command(&self, topic: &str) -> Option<String> {
        let rest = topic.strip_prefix(self.base.as_str())?.strip_prefix('/')?;
        let path = rest.strip_suffix(SET_SUFFIX)?.strip_suffix('/')?;

        let levels: Vec<&str> = path.split('/').collect();
        if levels.len() > 2 || levels.iter().any(|level| !is_word(level)) {
            return None;
        }

        Some(levels.join("."))
    }
}

fn is_word(level: &str) -> bool {
    !level.is_empty() && level.chars().all(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Check that a client id can be embedded in topic names.
pub fn validate_client_id(client_id: &str) -> Result<()> {
    if client_id.is_empty() {
        return Err(Error::Topic("client id cannot be empty".to_string()));
    }

    if let Some(c) = client_id.chars().find(|c| matches!(c, '/' | '+' | '#')) {
        return Err(Error::Topic(format!(
            "client id '{}' contains reserved character '{}'",
            client_id, c
        )));
    }

    Ok(())
}
