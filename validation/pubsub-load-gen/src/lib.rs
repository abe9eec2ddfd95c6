//! Load generator for Google Cloud Pub/Sub.
//!
//! This crate provides tools to:
//! - Ensure a topic (and optionally a subscription) exists
//! - Publish a fixed payload N times with a fixed delay between sends
//! - Summarize the run on the console or as JSON
//! - Count the published events per key over fixed windows (`impression-aggregator`)

pub mod aggregator;
pub mod broker;
pub mod config;
pub mod error;
pub mod gcp;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod runner;

pub use aggregator::{AggregationRunner, AggregatorConfig, AggregatorStats, WindowPane, WindowedCounter};
pub use broker::{Broker, Connector, InboundMessage, MessageSource, OutboundMessage, TopicPublisher};
pub use config::{ConfigOverrides, LoadGenConfig, ScenarioFile};
pub use error::{AdminError, LoadGenError, LoadGenResult};
pub use gcp::{GcpConnector, GcpSource};
pub use metrics::{MetricsCollector, RunSummary};
pub use report::{OutputFormat, SummaryReport};
pub use runner::LoadRunner;
