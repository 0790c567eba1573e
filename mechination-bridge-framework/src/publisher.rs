//! Publisher for MQTT.

use rumqttc::{AsyncClient, QoS};

use mechination_common::TopicBuilder;

use crate::error::{BridgeError, Result};

/// Publisher for sending messages to the broker.
///
/// Wraps an MQTT client and the topic layout of one bridge instance. Requests
/// wait for room in the client's request queue, so the event loop that owns
/// the connection must be polled on another task.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: AsyncClient,
    topics: TopicBuilder,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: AsyncClient, topics: TopicBuilder) -> Self {
        Self { client, topics }
    }

    /// Get the topic layout.
    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Publish a payload at QoS 0, not retained.
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.send(topic, false, payload.into()).await
    }

    /// Publish a payload at QoS 0 with the retain flag set.
    pub async fn publish_retained(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.send(topic, true, payload.into()).await
    }

    /// Subscribe to a topic filter at QoS 0.
    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BridgeError::Subscribe {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(topic = %topic, "Subscribed");
        Ok(())
    }

    async fn send(&self, topic: &str, retain: bool, payload: Vec<u8>) -> Result<()> {
        let len = payload.len();

        self.client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(topic = %topic, bytes = len, retain, "Published");
        Ok(())
    }
}
