//! Run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Counts messages handed to the publisher during a run.
///
/// Publishing is fire-and-forget, so "submitted" is all we can know.
pub struct MetricsCollector {
    started_at: DateTime<Utc>,
    start_time: Instant,
    messages_submitted: u64,
    bytes_submitted: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            start_time: Instant::now(),
            messages_submitted: 0,
            bytes_submitted: 0,
        }
    }

    /// Record one message handed to the publisher.
    pub fn record_submit(&mut self, bytes: usize) {
        self.messages_submitted += 1;
        self.bytes_submitted += bytes as u64;
    }

    pub fn messages_submitted(&self) -> u64 {
        self.messages_submitted
    }

    /// Generate the final summary.
    pub fn summary(&self, topic: &str, subscription: Option<&str>) -> RunSummary {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        let messages_per_second = if elapsed_secs > 0.0 {
            self.messages_submitted as f64 / elapsed_secs
        } else {
            0.0
        };

        RunSummary {
            topic: topic.to_string(),
            subscription: subscription.map(str::to_string),
            started_at: self.started_at.to_rfc3339(),
            messages_submitted: self.messages_submitted,
            bytes_submitted: self.bytes_submitted,
            elapsed_secs,
            messages_per_second,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub topic: String,
    pub subscription: Option<String>,
    /// RFC 3339 timestamp.
    pub started_at: String,
    pub messages_submitted: u64,
    pub bytes_submitted: u64,
    pub elapsed_secs: f64,
    pub messages_per_second: f64,
}
