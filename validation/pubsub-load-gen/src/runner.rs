//! Load generation run: connect, provision, publish.

use crate::broker::{Broker, Connector, OutboundMessage, TopicPublisher};
use crate::config::LoadGenConfig;
use crate::error::{AdminError, LoadGenError, LoadGenResult};
use crate::metrics::{MetricsCollector, RunSummary};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Executes one load generation run. Strictly sequential.
pub struct LoadRunner {
    config: LoadGenConfig,
}

impl LoadRunner {
    pub fn new(config: LoadGenConfig) -> Self {
        Self { config }
    }

    /// Run to completion.
    ///
    /// Returns the first fatal error; "already exists" on the topic or the
    /// subscription is logged as a warning and the run continues.
    pub async fn run<C>(&self, connector: &C) -> LoadGenResult<RunSummary>
    where
        C: Connector,
    {
        // Nothing is sent to the backend with an invalid configuration
        self.config.validate()?;

        info!(project = %self.config.project, "creating pubsub client");
        let broker = connector.connect(&self.config.project).await?;
        info!("pubsub client created");

        self.ensure_topic(&broker).await?;

        if let Some(subscription) = self.config.subscription() {
            self.ensure_subscription(&broker, subscription).await?;
        }

        let mut publisher = broker.publisher(&self.config.topic);
        let metrics = self.publish_all(&publisher).await;

        publisher.shutdown().await;
        drop(broker);
        debug!("publisher and client released");

        Ok(metrics.summary(&self.config.topic, self.config.subscription()))
    }

    async fn ensure_topic<B: Broker>(&self, broker: &B) -> LoadGenResult<()> {
        let topic = &self.config.topic;
        info!(topic = %topic, "creating topic");

        match broker.create_topic(topic).await {
            Ok(()) => {
                info!(topic = %topic, "topic created");
                Ok(())
            }
            Err(AdminError::AlreadyExists) => {
                warn!(topic = %topic, "attempted to create topic but it already existed");
                Ok(())
            }
            Err(AdminError::Rejected(message)) => Err(LoadGenError::CreateTopic {
                topic: topic.clone(),
                message,
            }),
        }
    }

    async fn ensure_subscription<B: Broker>(
        &self,
        broker: &B,
        subscription: &str,
    ) -> LoadGenResult<()> {
        let topic = &self.config.topic;
        info!(subscription = %subscription, topic = %topic, "creating subscription");

        match broker.create_subscription(subscription, topic).await {
            Ok(()) => {
                info!(subscription = %subscription, topic = %topic, "subscription created");
                Ok(())
            }
            Err(AdminError::AlreadyExists) => {
                warn!(
                    subscription = %subscription,
                    topic = %topic,
                    "attempted to create subscription but it already existed"
                );
                Ok(())
            }
            Err(AdminError::Rejected(message)) => Err(LoadGenError::CreateSubscription {
                subscription: subscription.to_string(),
                message,
            }),
        }
    }

    async fn publish_all<P: TopicPublisher>(&self, publisher: &P) -> MetricsCollector {
        let payload = &self.config.payload;
        let mut metrics = MetricsCollector::new();

        info!(
            payload = %String::from_utf8_lossy(payload),
            count = self.config.count,
            delay = ?self.config.delay,
            "begin sending messages"
        );

        for i in 0..self.config.count {
            if i > 0 {
                sleep(self.config.delay).await;
            }

            let message = OutboundMessage::new(payload);
            debug!(seq = i, id = %message.id, "publishing message");
            publisher.publish(message).await;
            metrics.record_submit(payload.len());

            // Reported optimistically, the publish result is never awaited
            info!("success sending message!");
        }

        info!(sent = metrics.messages_submitted(), "finished sending messages");
        metrics
    }
}
