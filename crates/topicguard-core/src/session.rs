//! Broker-side client and packet types seen by the authorizer

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// MQTT quality of service level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Per-connection context shared between the broker and the authorizer
///
/// `authenticate` records the resolved username here so that later publish
/// and subscribe checks can find the matching credential record.
#[derive(Debug)]
pub struct ClientSession {
    id: String,
    username: RwLock<Option<String>>,
}

impl ClientSession {
    /// Create a session for a newly connected client
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: RwLock::new(None),
        }
    }

    /// Client identifier from the CONNECT packet
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Username resolved during authentication, if any
    pub fn username(&self) -> Option<String> {
        self.username.read().clone()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        *self.username.write() = Some(username.into());
    }
}

/// A PUBLISH awaiting authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl PublishPacket {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::default(),
            retain: false,
        }
    }
}

/// A single topic filter from a SUBSCRIBE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}
