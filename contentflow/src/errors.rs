//! Error types for the contentflow pipeline.
//!
//! Errors fall into two families. Precondition errors (missing run store,
//! unknown resolver names, resuming a terminal run) are surfaced to the
//! caller immediately. Everything else is an external failure raised inside
//! a stage; the orchestrator catches those and applies the halt policy.

use crate::core::RunStatus;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = ContentFlowError> = std::result::Result<T, E>;

/// The main error type for contentflow operations.
#[derive(Debug, Error)]
pub enum ContentFlowError {
    /// Run tracking is enabled but no run store was provided.
    #[error("Pipeline run tracking is enabled but no run store is configured")]
    TrackingNotProvisioned,

    /// No run exists with the given id.
    #[error("Pipeline run not found: {0}")]
    RunNotFound(String),

    /// The run is not in a resumable state.
    #[error("Pipeline run {run_id} is not resumable (status: {status})")]
    NotResumable {
        /// The run id.
        run_id: String,
        /// The run's current status.
        status: RunStatus,
    },

    /// A run status transition is not allowed by the state machine.
    #[error("Invalid run status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },

    /// An AI provider name is not registered.
    #[error("Unsupported AI provider [{0}]. Register it with AiProviderManager::extend()")]
    UnknownProvider(String),

    /// A content source driver name is not registered.
    #[error("Unsupported content source driver [{0}]. Register it with ContentSourceManager::extend()")]
    UnknownSourceDriver(String),

    /// A publish channel name is not registered.
    #[error("Unsupported publisher driver [{0}]. Register it with PublisherManager::extend()")]
    UnknownChannel(String),

    /// A stage identifier is not registered.
    #[error("Unknown pipeline stage: {0}")]
    UnknownStage(String),

    /// Another run for the same input is in flight.
    #[error("A pipeline run is already in progress for {key}")]
    AlreadyRunning {
        /// The mutual-exclusion key.
        key: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An AI provider call failed.
    #[error("AI provider [{provider}] error: {message}")]
    Provider {
        /// Provider name.
        provider: String,
        /// Error detail.
        message: String,
    },

    /// A content source fetch failed.
    #[error("Content source [{driver}] error: {message}")]
    Source {
        /// Driver name.
        driver: String,
        /// Error detail.
        message: String,
    },

    /// A publish call failed.
    #[error("Publish to [{channel}] failed: {message}")]
    Publish {
        /// Channel name.
        channel: String,
        /// Error detail.
        message: String,
    },

    /// Image generation or optimisation failed.
    #[error("Image error: {0}")]
    Image(String),

    /// A storage backend failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The run exceeded its wall-clock budget.
    #[error("Pipeline run timed out after {seconds}s")]
    Timeout {
        /// Budget in seconds.
        seconds: u64,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec error.
    #[error("Image codec error: {0}")]
    ImageCodec(#[from] image::ImageError),

    /// Error raised by a user-supplied extension.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ContentFlowError {
    /// Creates a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a content source error.
    pub fn source(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            driver: driver.into(),
            message: message.into(),
        }
    }

    /// Creates a publish error.
    pub fn publish(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Returns true for configuration/precondition errors.
    ///
    /// These are never retried and never converted into a rejection.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::TrackingNotProvisioned
                | Self::RunNotFound(_)
                | Self::NotResumable { .. }
                | Self::InvalidTransition { .. }
                | Self::UnknownProvider(_)
                | Self::UnknownSourceDriver(_)
                | Self::UnknownChannel(_)
                | Self::UnknownStage(_)
                | Self::AlreadyRunning { .. }
                | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_resumable_message() {
        let err = ContentFlowError::NotResumable {
            run_id: "abc".to_string(),
            status: RunStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Pipeline run abc is not resumable (status: completed)"
        );
        assert!(err.is_precondition());
    }

    #[test]
    fn test_external_errors_are_not_preconditions() {
        let err = ContentFlowError::provider("openai", "quota exceeded");
        assert!(!err.is_precondition());
        assert!(err.to_string().contains("quota exceeded"));

        let err = ContentFlowError::Image("bad size".to_string());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_unknown_driver_mentions_extend() {
        let err = ContentFlowError::UnknownSourceDriver("ftp".to_string());
        assert!(err.to_string().contains("[ftp]"));
        assert!(err.to_string().contains("extend"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: ContentFlowError = anyhow::anyhow!("custom failure").into();
        assert_eq!(err.to_string(), "custom failure");
        assert!(!err.is_precondition());
    }
}
