//! Fixed-window event counting for the impression aggregator.
//!
//! Events are JSON objects. Each one is keyed by joining the values of the
//! configured grouping keys with `.` and counted per key inside fixed windows
//! of event time (the Pub/Sub publish time). The wall clock acts as the
//! watermark:
//!
//! - when the watermark passes a window's end, its counts fire once (on time)
//!   and are discarded;
//! - events for a fired window that arrive within the allowed lateness are
//!   counted again and fire as a late pane after `late_firing_delay`;
//! - events older than window end plus allowed lateness are dropped.

use crate::broker::MessageSource;
use crate::error::{LoadGenError, LoadGenResult};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);
pub const DEFAULT_ALLOWED_LATENESS: Duration = Duration::from_secs(120);
pub const DEFAULT_LATE_FIRING_DELAY: Duration = Duration::from_secs(20);
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Aggregation settings.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub grouping_keys: Vec<String>,
    pub window: Duration,
    pub allowed_lateness: Duration,
    pub late_firing_delay: Duration,
    /// How often the watermark is advanced and due panes are fired.
    pub tick: Duration,
}

impl AggregatorConfig {
    pub fn new(grouping_keys: Vec<String>) -> Self {
        Self {
            grouping_keys,
            window: DEFAULT_WINDOW,
            allowed_lateness: DEFAULT_ALLOWED_LATENESS,
            late_firing_delay: DEFAULT_LATE_FIRING_DELAY,
            tick: DEFAULT_TICK,
        }
    }

    pub fn validate(&self) -> LoadGenResult<()> {
        if self.grouping_keys.is_empty() {
            return Err(LoadGenError::invalid_config(
                "grouping_keys",
                "at least one grouping key must be specified",
            ));
        }
        if self.window.as_millis() == 0 {
            return Err(LoadGenError::invalid_config(
                "window_duration",
                "must be at least 1ms",
            ));
        }
        if self.tick.is_zero() {
            return Err(LoadGenError::invalid_config("tick", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneTiming {
    OnTime,
    Late,
}

/// Count for one key in one window firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowPane {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub key: String,
    pub count: u64,
    pub timing: PaneTiming,
}

/// What happened to a single ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Accepted,
    ParseError,
    MissingKey,
    DroppedLate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    pub accepted: u64,
    pub parse_errors: u64,
    pub missing_keys: u64,
    pub dropped_late: u64,
}

struct WindowState {
    end: DateTime<Utc>,
    counts: BTreeMap<String, u64>,
    fired: bool,
    late_deadline: Option<DateTime<Utc>>,
}

/// Per-key counts over fixed event-time windows.
pub struct WindowedCounter {
    grouping_keys: Vec<String>,
    window: TimeDelta,
    allowed_lateness: TimeDelta,
    late_firing_delay: TimeDelta,
    windows: BTreeMap<DateTime<Utc>, WindowState>,
    stats: AggregatorStats,
}

impl WindowedCounter {
    pub fn new(config: &AggregatorConfig) -> LoadGenResult<Self> {
        config.validate()?;
        Ok(Self {
            grouping_keys: config.grouping_keys.clone(),
            window: to_delta("window_duration", config.window)?,
            allowed_lateness: to_delta("allowed_lateness", config.allowed_lateness)?,
            late_firing_delay: to_delta("late_firing_delay", config.late_firing_delay)?,
            windows: BTreeMap::new(),
            stats: AggregatorStats::default(),
        })
    }

    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    /// Count one raw event. `now` is the current watermark.
    pub fn ingest(&mut self, data: &[u8], event_time: DateTime<Utc>, now: DateTime<Utc>) -> Ingest {
        let event: Value = match serde_json::from_slice(data) {
            Ok(v) => v,
            Err(e) => {
                self.stats.parse_errors += 1;
                error!(event = %String::from_utf8_lossy(data), error = %e, "parse error");
                return Ingest::ParseError;
            }
        };

        let Some(key) = grouping_key(&event, &self.grouping_keys) else {
            self.stats.missing_keys += 1;
            warn!(event = %event, keys = ?self.grouping_keys, "event is missing a grouping key");
            return Ingest::MissingKey;
        };

        let start = self.window_start(event_time);
        let end = start + self.window;
        if now >= end + self.allowed_lateness {
            self.stats.dropped_late += 1;
            debug!(%event_time, window_end = %end, "dropping event past allowed lateness");
            return Ingest::DroppedLate;
        }

        let late_firing_delay = self.late_firing_delay;
        let state = self.windows.entry(start).or_insert_with(|| WindowState {
            end,
            counts: BTreeMap::new(),
            fired: false,
            late_deadline: None,
        });
        *state.counts.entry(key).or_insert(0) += 1;
        if state.fired && state.late_deadline.is_none() {
            state.late_deadline = Some(now + late_firing_delay);
        }

        self.stats.accepted += 1;
        Ingest::Accepted
    }

    /// Advance the watermark to `now` and return every pane that is due.
    pub fn fire(&mut self, now: DateTime<Utc>) -> Vec<WindowPane> {
        let mut panes = Vec::new();
        let allowed_lateness = self.allowed_lateness;

        self.windows.retain(|start, state| {
            let expired = now >= state.end + allowed_lateness;

            if !state.fired && now >= state.end {
                panes.extend(drain(*start, state, PaneTiming::OnTime));
                state.fired = true;
                state.late_deadline = None;
            } else if state.fired
                && (expired || state.late_deadline.is_some_and(|d| now >= d))
                && !state.counts.is_empty()
            {
                panes.extend(drain(*start, state, PaneTiming::Late));
                state.late_deadline = None;
            }

            !(expired && state.fired && state.counts.is_empty())
        });

        panes
    }

    fn window_start(&self, event_time: DateTime<Utc>) -> DateTime<Utc> {
        let size = self.window.num_milliseconds();
        let start_ms = event_time.timestamp_millis().div_euclid(size) * size;
        DateTime::from_timestamp_millis(start_ms).unwrap_or(event_time)
    }
}

fn drain(start: DateTime<Utc>, state: &mut WindowState, timing: PaneTiming) -> Vec<WindowPane> {
    std::mem::take(&mut state.counts)
        .into_iter()
        .map(|(key, count)| WindowPane {
            window_start: start,
            window_end: state.end,
            key,
            count,
            timing,
        })
        .collect()
}

fn to_delta(field: &str, d: Duration) -> LoadGenResult<TimeDelta> {
    TimeDelta::from_std(d).map_err(|e| LoadGenError::invalid_config(field, e.to_string()))
}

/// Join the values of `keys` with `.`; `None` if any key is absent.
///
/// String values are used verbatim, anything else in its JSON form.
pub fn grouping_key(event: &Value, keys: &[String]) -> Option<String> {
    let parts = keys
        .iter()
        .map(|k| {
            event.get(k).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("."))
}

/// Pulls from a subscription and feeds a [`WindowedCounter`] until `shutdown` resolves.
pub struct AggregationRunner {
    config: AggregatorConfig,
    max_messages: i32,
}

impl AggregationRunner {
    pub fn new(config: AggregatorConfig, max_messages: i32) -> Self {
        Self {
            config,
            max_messages,
        }
    }

    /// Run until `shutdown` completes or pulling fails.
    ///
    /// Pulls happen on a separate task so firing is never held up by a long pull.
    pub async fn run<S, F, Fut>(
        &self,
        source: Arc<S>,
        mut emit: F,
        shutdown: Fut,
    ) -> LoadGenResult<AggregatorStats>
    where
        S: MessageSource + 'static,
        F: FnMut(WindowPane),
        Fut: Future<Output = ()>,
    {
        let mut counter = WindowedCounter::new(&self.config)?;

        let (tx, mut rx) = mpsc::channel(16);
        let max_messages = self.max_messages;
        let puller = tokio::spawn(async move {
            loop {
                let batch = source.pull(max_messages).await;
                let failed = batch.is_err();
                if tx.send(batch).await.is_err() || failed {
                    break;
                }
            }
        });

        info!(
            keys = ?self.config.grouping_keys,
            window = ?self.config.window,
            allowed_lateness = ?self.config.allowed_lateness,
            "aggregating events"
        );

        let mut ticker = tokio::time::interval(self.config.tick);
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                _ = ticker.tick() => {
                    for pane in counter.fire(Utc::now()) {
                        emit(pane);
                    }
                }
                batch = rx.recv() => match batch {
                    Some(Ok(messages)) => {
                        debug!(count = messages.len(), "pulled messages");
                        for msg in messages {
                            counter.ingest(&msg.data, msg.publish_time, Utc::now());
                        }
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                },
            }
        };

        puller.abort();
        result?;

        let stats = counter.stats().clone();
        info!(
            accepted = stats.accepted,
            parse_errors = stats.parse_errors,
            missing_keys = stats.missing_keys,
            dropped_late = stats.dropped_late,
            "aggregation stopped"
        );
        Ok(stats)
    }
}
