//! Error types for the Pub/Sub load generator.

use thiserror::Error;

/// Result type alias using LoadGenError.
pub type LoadGenResult<T> = Result<T, LoadGenError>;

/// Fatal errors. Any of these stops the run and the process exits with status 1.
#[derive(Debug, Error)]
pub enum LoadGenError {
    // === Configuration Errors ===
    #[error("payload not specified, use --payload or --payload-file to specify payload")]
    MissingPayload,

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Failed to load scenario file {path}: {message}")]
    ConfigFile { path: String, message: String },

    // === Backend Errors ===
    #[error("unable to create pubsub client: {0}")]
    Connect(String),

    #[error("unable to create topic {topic}: {message}")]
    CreateTopic { topic: String, message: String },

    #[error("unable to create subscription {subscription}: {message}")]
    CreateSubscription {
        subscription: String,
        message: String,
    },

    #[error("unable to pull from subscription {subscription}: {message}")]
    Pull {
        subscription: String,
        message: String,
    },

    // === Output Errors ===
    #[error("Failed to render run summary: {0}")]
    Report(String),
}

impl LoadGenError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a failed admin call (topic or subscription creation).
///
/// `AlreadyExists` is the only non-fatal case; the runner downgrades it to a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("resource already exists")]
    AlreadyExists,

    #[error("{0}")]
    Rejected(String),
}

impl From<serde_json::Error> for LoadGenError {
    fn from(err: serde_json::Error) -> Self {
        LoadGenError::Report(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_payload_message_mentions_flag() {
        let msg = LoadGenError::MissingPayload.to_string();
        assert!(msg.contains("--payload"));
    }

    #[test]
    fn test_create_topic_message() {
        let err = LoadGenError::CreateTopic {
            topic: "impression_event".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unable to create topic impression_event: permission denied"
        );
    }

    #[test]
    fn test_invalid_config_helper() {
        let err = LoadGenError::invalid_config("delay", "bad duration");
        assert!(matches!(
            err,
            LoadGenError::InvalidConfig { ref field, .. } if field == "delay"
        ));
    }
}
