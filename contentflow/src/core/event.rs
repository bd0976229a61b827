//! Lifecycle events emitted by the orchestrator and stages.

use crate::payload::PayloadSnapshot;
use crate::publishing::PublishResult;
use serde::Serialize;
use uuid::Uuid;

/// A lifecycle or business event.
///
/// Every variant carries the payload snapshot at the time of emission so
/// consumers never need access to live payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PipelineEvent {
    /// A run began (fresh or resumed).
    Started {
        /// Run id, if tracked.
        run_id: Option<Uuid>,
        /// Payload at start.
        payload: PayloadSnapshot,
    },
    /// A run finished without rejection.
    Completed {
        /// Run id, if tracked.
        run_id: Option<Uuid>,
        /// Produced article id.
        article_id: Option<i64>,
        /// Final payload.
        payload: PayloadSnapshot,
    },
    /// A run failed or was rejected.
    Failed {
        /// Run id, if tracked.
        run_id: Option<Uuid>,
        /// Human-readable reason.
        reason: String,
        /// Stage that failed, if any.
        stage: Option<String>,
        /// Payload at failure.
        payload: PayloadSnapshot,
    },
    /// Raw content was fetched.
    ContentFetched {
        /// Driver that fetched the content.
        driver: String,
        /// Fetched length in characters.
        length: usize,
        /// Payload after fetch.
        payload: PayloadSnapshot,
    },
    /// Content was rewritten by the AI.
    ContentRewritten {
        /// New title.
        title: Option<String>,
        /// Payload after rewrite.
        payload: PayloadSnapshot,
    },
    /// An image was generated and stored.
    ImageGenerated {
        /// Stored image path.
        path: String,
        /// Payload after generation.
        payload: PayloadSnapshot,
    },
    /// An image was optimised.
    ImageOptimized {
        /// Path before optimisation.
        original_path: String,
        /// Path after optimisation.
        optimized_path: String,
        /// Payload after optimisation.
        payload: PayloadSnapshot,
    },
    /// The article record was created.
    ArticleCreated {
        /// New article id.
        article_id: i64,
        /// Payload after persistence.
        payload: PayloadSnapshot,
    },
    /// An article was published to one channel.
    ArticlePublished {
        /// Channel name.
        channel: String,
        /// Channel outcome.
        result: PublishResult,
        /// Payload after publishing.
        payload: PayloadSnapshot,
    },
}

impl PipelineEvent {
    /// Returns the dotted event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "pipeline.started",
            Self::Completed { .. } => "pipeline.completed",
            Self::Failed { .. } => "pipeline.failed",
            Self::ContentFetched { .. } => "content.fetched",
            Self::ContentRewritten { .. } => "content.rewritten",
            Self::ImageGenerated { .. } => "image.generated",
            Self::ImageOptimized { .. } => "image.optimized",
            Self::ArticleCreated { .. } => "article.created",
            Self::ArticlePublished { .. } => "article.published",
        }
    }

    /// Returns true for the failure-class event.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Serializes the event fields to JSON, adding a timestamp.
    #[must_use]
    pub fn to_data(&self) -> serde_json::Value {
        let mut data = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut data {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(crate::utils::iso_timestamp()),
            );
        }
        data
    }
}
