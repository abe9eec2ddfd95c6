//! Aggregation runner tests against an in-memory subscription.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pubsub_load_gen::aggregator::PaneTiming;
use pubsub_load_gen::{
    AggregationRunner, AggregatorConfig, InboundMessage, LoadGenError, LoadGenResult,
    MessageSource, WindowPane,
};

// ============================================================================
// Fake subscription
// ============================================================================

#[derive(Default)]
struct QueuedSource {
    batches: Mutex<VecDeque<LoadGenResult<Vec<InboundMessage>>>>,
}

impl QueuedSource {
    fn new(batches: Vec<LoadGenResult<Vec<InboundMessage>>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches.into()),
        })
    }
}

#[async_trait]
impl MessageSource for QueuedSource {
    async fn pull(&self, _max_messages: i32) -> LoadGenResult<Vec<InboundMessage>> {
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            // Behaves like a long pull on an idle subscription
            None => std::future::pending().await,
        }
    }
}

fn event(body: &str) -> InboundMessage {
    InboundMessage {
        data: body.as_bytes().to_vec(),
        publish_time: Utc::now(),
    }
}

fn config(keys: &[&str]) -> AggregatorConfig {
    AggregatorConfig {
        grouping_keys: keys.iter().map(|k| k.to_string()).collect(),
        window: Duration::from_millis(100),
        allowed_lateness: Duration::from_secs(10),
        late_firing_delay: Duration::ZERO,
        tick: Duration::from_millis(20),
    }
}

// ============================================================================
// Runner
// ============================================================================

#[tokio::test]
async fn test_counts_events_per_key() {
    let source = QueuedSource::new(vec![Ok(vec![
        event(r#"{"event":"impression","campaign_id":1}"#),
        event(r#"{"event":"impression","campaign_id":1}"#),
        event(r#"{"event":"impression","campaign_id":2}"#),
        event("{broken"),
    ])]);

    let mut panes: Vec<WindowPane> = Vec::new();
    let stats = AggregationRunner::new(config(&["event", "campaign_id"]), 100)
        .run(
            source,
            |pane| panes.push(pane),
            tokio::time::sleep(Duration::from_millis(500)),
        )
        .await
        .unwrap();

    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.parse_errors, 1);

    assert!(panes.iter().all(|p| p.timing == PaneTiming::OnTime));
    let total = |key: &str| -> u64 {
        panes.iter().filter(|p| p.key == key).map(|p| p.count).sum()
    };
    assert_eq!(total("impression.1"), 2);
    assert_eq!(total("impression.2"), 1);
}

#[tokio::test]
async fn test_pull_error_stops_runner() {
    let source = QueuedSource::new(vec![Err(LoadGenError::Pull {
        subscription: "impression_event_testing".to_string(),
        message: "NotFound: Resource not found".to_string(),
    })]);

    let err = AggregationRunner::new(config(&["event"]), 100)
        .run(source, |_| {}, tokio::time::sleep(Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, LoadGenError::Pull { .. }));
}

#[tokio::test]
async fn test_invalid_config_fails_before_pulling() {
    let source = QueuedSource::new(Vec::new());
    let err = AggregationRunner::new(config(&[]), 100)
        .run(source, |_| {}, std::future::pending::<()>())
        .await
        .unwrap_err();

    assert!(matches!(err, LoadGenError::InvalidConfig { .. }));
}
