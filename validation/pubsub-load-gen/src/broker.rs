//! Backend seams used by the runner.
//!
//! `Connector` opens a project-scoped connection, `Broker` manages topics and
//! subscriptions on it, and `TopicPublisher` is the topic handle reused for
//! every publish.

use crate::error::{AdminError, LoadGenResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single message: a freshly generated id and the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub id: String,
    pub data: Vec<u8>,
}

impl OutboundMessage {
    /// Build a message with a new random (v4) id.
    pub fn new(data: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            data: data.to_vec(),
        }
    }
}

/// Opens a connection to the messaging backend.
#[async_trait]
pub trait Connector: Send + Sync {
    type Broker: Broker;

    async fn connect(&self, project: &str) -> LoadGenResult<Self::Broker>;
}

/// Admin operations on a connected backend.
#[async_trait]
pub trait Broker: Send + Sync {
    type Publisher: TopicPublisher;

    async fn create_topic(&self, topic: &str) -> Result<(), AdminError>;

    async fn create_subscription(&self, subscription: &str, topic: &str)
        -> Result<(), AdminError>;

    /// Handle for publishing to an existing topic.
    fn publisher(&self, topic: &str) -> Self::Publisher;
}

/// Topic handle.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Submit a message without waiting for the server acknowledgement.
    async fn publish(&self, message: OutboundMessage);

    /// Flush pending messages and release the handle.
    async fn shutdown(&mut self);
}

/// A message pulled from a subscription, already acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub data: Vec<u8>,
    /// Server publish time, used as the event timestamp.
    pub publish_time: DateTime<Utc>,
}

/// Pull side of a subscription.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Pull up to `max_messages` and acknowledge them.
    async fn pull(&self, max_messages: i32) -> LoadGenResult<Vec<InboundMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = OutboundMessage::new(b"payload");
        let b = OutboundMessage::new(b"payload");
        assert_ne!(a.id, b.id);
        assert_eq!(a.data, b.data);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }
}
