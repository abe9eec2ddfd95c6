//! Google Cloud Pub/Sub backend.
//!
//! Transport, retries and batching are left to the `google-cloud-pubsub` client.

use crate::broker::{
    Broker, Connector, InboundMessage, MessageSource, OutboundMessage, TopicPublisher,
};
use crate::error::{AdminError, LoadGenError, LoadGenResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_cloud_gax::conn::Environment;
use google_cloud_gax::grpc::{Code, Status};
use google_cloud_googleapis::pubsub::v1::PubsubMessage;
use google_cloud_pubsub::client::{Client, ClientConfig};
use google_cloud_pubsub::publisher::Publisher;
use google_cloud_pubsub::subscription::{Subscription, SubscriptionConfig};
use google_cloud_pubsub::topic::TopicConfig;
use tracing::{debug, warn};

/// Project id the emulator accepts when none is given.
pub const EMULATOR_PROJECT: &str = "local-project";

/// Connects to Pub/Sub, either the real service or an emulator.
#[derive(Debug, Clone, Default)]
pub struct GcpConnector {
    emulator_host: Option<String>,
}

#[async_trait]
impl Connector for GcpConnector {
    type Broker = GcpBroker;

    async fn connect(&self, project: &str) -> LoadGenResult<GcpBroker> {
        let client = self.client(project).await?;
        Ok(GcpBroker { client })
    }
}

impl GcpConnector {
    pub fn new(emulator_host: Option<String>) -> Self {
        Self { emulator_host }
    }

    /// Client settings for `project`, before credentials are resolved.
    pub fn client_config(&self, project: &str) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(host) = &self.emulator_host {
            debug!(emulator_host = %host, "using pubsub emulator");
            config.environment = Environment::Emulator(host.clone());
            if project.is_empty() {
                config.project_id = Some(EMULATOR_PROJECT.to_string());
            }
        }
        if !project.is_empty() {
            config.project_id = Some(project.to_string());
        }
        config
    }

    async fn client(&self, project: &str) -> LoadGenResult<Client> {
        let config = self.client_config(project);
        // No-op against the emulator; otherwise resolves application default credentials.
        let config = config
            .with_auth()
            .await
            .map_err(|e| LoadGenError::Connect(e.to_string()))?;

        Client::new(config)
            .await
            .map_err(|e| LoadGenError::Connect(e.to_string()))
    }

    /// Connect and bind to an existing subscription for pulling.
    pub async fn subscriber(&self, project: &str, subscription: &str) -> LoadGenResult<GcpSource> {
        let client = self.client(project).await?;
        Ok(GcpSource {
            name: subscription.to_string(),
            inner: client.subscription(subscription),
        })
    }
}

/// A connected Pub/Sub client.
pub struct GcpBroker {
    client: Client,
}

#[async_trait]
impl Broker for GcpBroker {
    type Publisher = GcpPublisher;

    async fn create_topic(&self, topic: &str) -> Result<(), AdminError> {
        self.client
            .topic(topic)
            .create(Some(TopicConfig::default()), None)
            .await
            .map_err(classify)
    }

    async fn create_subscription(
        &self,
        subscription: &str,
        topic: &str,
    ) -> Result<(), AdminError> {
        self.client
            .create_subscription(subscription, topic, SubscriptionConfig::default(), None)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    fn publisher(&self, topic: &str) -> GcpPublisher {
        GcpPublisher {
            inner: self.client.topic(topic).new_publisher(None),
        }
    }
}

/// Publisher bound to one topic.
pub struct GcpPublisher {
    inner: Publisher,
}

#[async_trait]
impl TopicPublisher for GcpPublisher {
    async fn publish(&self, message: OutboundMessage) {
        let msg = PubsubMessage {
            message_id: message.id,
            data: message.data,
            ..Default::default()
        };
        // The awaiter is dropped: the publish result is never checked.
        let _ = self.inner.publish(msg).await;
    }

    async fn shutdown(&mut self) {
        self.inner.shutdown().await;
    }
}

/// Pulls from one subscription, acknowledging every received message.
pub struct GcpSource {
    name: String,
    inner: Subscription,
}

#[async_trait]
impl MessageSource for GcpSource {
    async fn pull(&self, max_messages: i32) -> LoadGenResult<Vec<InboundMessage>> {
        let received = self
            .inner
            .pull(max_messages, None)
            .await
            .map_err(|status| LoadGenError::Pull {
                subscription: self.name.clone(),
                message: format!("{:?}: {}", status.code(), status.message()),
            })?;

        let mut messages = Vec::with_capacity(received.len());
        for msg in received {
            if let Err(status) = msg.ack().await {
                warn!(error = %status.message(), "failed to ack message, it will be redelivered");
                continue;
            }
            let publish_time = msg
                .message
                .publish_time
                .as_ref()
                .and_then(|t| DateTime::from_timestamp(t.seconds, t.nanos.max(0) as u32))
                .unwrap_or_else(Utc::now);
            messages.push(InboundMessage {
                data: msg.message.data.clone(),
                publish_time,
            });
        }
        Ok(messages)
    }
}

fn classify(status: Status) -> AdminError {
    classify_code(status.code(), status.message())
}

fn classify_code(code: Code, message: &str) -> AdminError {
    match code {
        Code::AlreadyExists => AdminError::AlreadyExists,
        other => AdminError::Rejected(format!("{other:?}: {message}")),
    }
}
