//! Queue entry point for processing one staged input or URL.

use super::ContentPipeline;
use crate::errors::Result;
use crate::payload::ContentPayload;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A unit of queued work.
///
/// Serializable so a job queue can persist it; the staged content is
/// loaded when the job runs, not when it is queued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessContentJob {
    /// Staged input to process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_content_id: Option<i64>,
    /// URL to process when no staged input is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProcessContentJob {
    /// A job for a staged input.
    #[must_use]
    pub const fn staged(id: i64) -> Self {
        Self {
            staged_content_id: Some(id),
            url: None,
        }
    }

    /// A job for a URL.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            staged_content_id: None,
            url: Some(url.into()),
        }
    }

    /// Builds the payload, or `None` if there is nothing to do.
    async fn build_payload(&self, pipeline: &ContentPipeline) -> Result<Option<ContentPayload>> {
        if let Some(id) = self.staged_content_id {
            let Some(staged) = pipeline.store().find_staged_content(id).await? else {
                warn!(staged_content_id = id, "Staged content not found");
                return Ok(None);
            };
            if staged.published {
                info!(staged_content_id = id, "Staged content already published");
                return Ok(None);
            }
            return Ok(Some(ContentPayload::from_staged_content(&staged)));
        }

        if let Some(url) = &self.url {
            return Ok(Some(ContentPayload::from_url(url.clone())));
        }

        warn!("Job has neither a staged content id nor a URL");
        Ok(None)
    }

    /// Runs the job.
    ///
    /// Returns `None` when the staged input is missing or already
    /// published, otherwise the final payload (which may be rejected).
    ///
    /// # Errors
    ///
    /// Whatever [`ContentPipeline::process`] returns.
    pub async fn handle(&self, pipeline: &mut ContentPipeline) -> Result<Option<ContentPayload>> {
        let Some(payload) = self.build_payload(pipeline).await? else {
            return Ok(None);
        };

        let result = pipeline.process(payload).await?;
        if result.is_rejected() {
            info!(
                staged_content_id = ?self.staged_content_id,
                url = ?self.url,
                reason = result.rejection_reason().unwrap_or("-"),
                "Job content was rejected"
            );
        } else {
            info!(
                staged_content_id = ?self.staged_content_id,
                article_id = ?result.article_id(),
                "Job completed"
            );
        }
        Ok(Some(result))
    }
}
