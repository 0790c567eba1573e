//! Bridge availability reporting.

use rumqttc::{LastWill, QoS};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Bridge-wide liveness, published retained on the availability topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// The bridge is connected to both transports.
    Online,
    /// The bridge is gone (published by the broker as the last will).
    Offline,
}

impl Availability {
    /// Payload string for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    /// Publish this state, retained, to the bridge availability topic.
    pub async fn publish(&self, publisher: &Publisher) -> Result<()> {
        let topic = publisher.topics().availability();
        publisher.publish_retained(&topic, self.as_str()).await?;
        tracing::info!(topic = %topic, availability = self.as_str(), "Availability published");
        Ok(())
    }

    /// Build a retained last will carrying this state.
    pub fn last_will(&self, topic: impl Into<String>) -> LastWill {
        LastWill::new(topic, self.as_str(), QoS::AtMostOnce, true)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
