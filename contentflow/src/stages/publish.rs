//! Fans the article out to the active channels.

use super::{Next, Pipe, StageContext, StageFlow};
use crate::core::PipelineEvent;
use crate::errors::Result;
use crate::payload::{ContentPayload, PayloadPatch};
use crate::publishing::PublisherManager;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Publishes the persisted article and records each channel's outcome.
///
/// Channel failures are outcomes, not errors, so the stage succeeds even
/// when every channel fails.
#[derive(Debug, Clone)]
pub struct PublishStage {
    publishers: Arc<PublisherManager>,
}

impl PublishStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(publishers: Arc<PublisherManager>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl Pipe for PublishStage {
    fn name(&self) -> &str {
        "publish"
    }

    fn label(&self) -> &str {
        "Publish"
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        let Some(article) = payload.article() else {
            ctx.skipped("no article to publish");
            return Ok(next.call(payload.clone()));
        };

        let results = self.publishers.publish_to_channels(article, None).await;
        if results.is_empty() {
            ctx.skipped("already published to every channel");
            return Ok(next.call(payload.clone()));
        }
        let succeeded = results.values().filter(|r| r.success).count();
        info!(
            article_id = article.id,
            channels = ?results.keys().collect::<Vec<_>>(),
            succeeded,
            "Publishing complete"
        );

        let patch = results
            .iter()
            .fold(PayloadPatch::new(), |patch, (channel, result)| {
                patch.publish_result(channel.clone(), result.clone())
            });
        let total = results.len();
        let payload = payload.with(patch);

        for (channel, result) in results {
            ctx.emit(PipelineEvent::ArticlePublished {
                channel,
                result,
                payload: payload.to_snapshot(),
            })
            .await;
        }
        ctx.completed(Some(&format!("{succeeded}/{total} channels succeeded")));
        Ok(next.call(payload))
    }
}
