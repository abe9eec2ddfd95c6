//! Configuration loading and management.
//!
//! Values come from three layers, highest precedence first:
//! command line / environment, an optional YAML scenario file, built-in defaults.

use crate::error::{LoadGenError, LoadGenResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_COUNT: u64 = 300;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_TOPIC: &str = "impression_event";
pub const DEFAULT_SUBSCRIPTION: &str = "impression_event_testing";

/// Resolved configuration for a single load generation run.
#[derive(Debug, Clone)]
pub struct LoadGenConfig {
    /// Message body published on every iteration.
    pub payload: Vec<u8>,
    /// Number of messages to send.
    pub count: u64,
    /// Pause between two sends.
    pub delay: Duration,
    pub topic: String,
    /// Subscription to create on the topic. Empty skips creation.
    pub subscription: String,
    /// GCP project id. Empty lets the client discover it from credentials.
    pub project: String,
    /// Pub/Sub emulator address (`host:port`).
    pub emulator_host: Option<String>,
}

impl Default for LoadGenConfig {
    fn default() -> Self {
        Self {
            payload: Vec::new(),
            count: DEFAULT_COUNT,
            delay: DEFAULT_DELAY,
            topic: DEFAULT_TOPIC.to_string(),
            subscription: DEFAULT_SUBSCRIPTION.to_string(),
            project: String::new(),
            emulator_host: None,
        }
    }
}

/// Scenario file loaded from YAML. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub payload_file: Option<PathBuf>,
    #[serde(default)]
    pub count: Option<u64>,
    /// Human readable duration, e.g. `1s` or `250ms`.
    #[serde(default)]
    pub delay: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub emulator_host: Option<String>,
}

impl ScenarioFile {
    /// Load a scenario from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadGenResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LoadGenError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            LoadGenError::ConfigFile { message, .. } => LoadGenError::ConfigFile {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> LoadGenResult<Self> {
        serde_yaml::from_str(content).map_err(|e| LoadGenError::ConfigFile {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub payload: Option<String>,
    pub payload_file: Option<PathBuf>,
    pub count: Option<u64>,
    pub delay: Option<Duration>,
    pub topic: Option<String>,
    pub subscription: Option<String>,
    pub project: Option<String>,
    pub emulator_host: Option<String>,
}

impl LoadGenConfig {
    /// Merge overrides on top of an optional scenario file on top of the defaults.
    ///
    /// Payload files are read here; the payload itself is not checked until
    /// [`LoadGenConfig::validate`].
    pub fn resolve(
        scenario: Option<ScenarioFile>,
        overrides: ConfigOverrides,
    ) -> LoadGenResult<Self> {
        let scenario = scenario.unwrap_or_default();
        let defaults = LoadGenConfig::default();

        let payload = match (overrides.payload, overrides.payload_file) {
            (Some(inline), _) => inline.into_bytes(),
            (None, Some(path)) => read_payload_file(&path)?,
            (None, None) => match (scenario.payload, scenario.payload_file) {
                (Some(inline), _) => inline.into_bytes(),
                (None, Some(path)) => read_payload_file(&path)?,
                (None, None) => defaults.payload,
            },
        };

        let delay = match (overrides.delay, scenario.delay) {
            (Some(d), _) => d,
            (None, Some(raw)) => humantime::parse_duration(raw.trim())
                .map_err(|e| LoadGenError::invalid_config("delay", format!("{raw:?}: {e}")))?,
            (None, None) => defaults.delay,
        };

        Ok(Self {
            payload,
            count: overrides.count.or(scenario.count).unwrap_or(defaults.count),
            delay,
            topic: overrides.topic.or(scenario.topic).unwrap_or(defaults.topic),
            subscription: overrides
                .subscription
                .or(scenario.subscription)
                .unwrap_or(defaults.subscription),
            project: overrides
                .project
                .or(scenario.project)
                .unwrap_or(defaults.project),
            emulator_host: overrides
                .emulator_host
                .or(scenario.emulator_host)
                .filter(|h| !h.is_empty()),
        })
    }

    /// Validate configuration.
    pub fn validate(&self) -> LoadGenResult<()> {
        if self.payload.is_empty() {
            return Err(LoadGenError::MissingPayload);
        }
        if self.topic.trim().is_empty() {
            return Err(LoadGenError::invalid_config("topic", "must not be empty"));
        }
        Ok(())
    }

    /// Subscription to create, if any.
    pub fn subscription(&self) -> Option<&str> {
        if self.subscription.is_empty() {
            None
        } else {
            Some(&self.subscription)
        }
    }
}

fn read_payload_file(path: &Path) -> LoadGenResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| LoadGenError::ConfigFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
