//! Resizes and converts the generated image.

use super::{Next, Pipe, StageContext, StageFlow};
use crate::core::PipelineEvent;
use crate::errors::Result;
use crate::media::ImageOptimization;
use crate::payload::{ContentPayload, PayloadPatch};
use async_trait::async_trait;
use std::sync::Arc;

/// Replaces `image_path` with the optimised file.
#[derive(Debug, Clone)]
pub struct OptimizeImageStage {
    optimizer: Arc<dyn ImageOptimization>,
}

impl OptimizeImageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(optimizer: Arc<dyn ImageOptimization>) -> Self {
        Self { optimizer }
    }
}

#[async_trait]
impl Pipe for OptimizeImageStage {
    fn name(&self) -> &str {
        "optimize_image"
    }

    fn label(&self) -> &str {
        "Optimise Image"
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        let Some(original) = payload.image_path() else {
            ctx.skipped("no image to optimise");
            return Ok(next.call(payload.clone()));
        };
        if !ctx.config().images.optimize {
            ctx.skipped("disabled in config");
            return Ok(next.call(payload.clone()));
        }

        let optimized = self.optimizer.optimize(original).await?;
        let original = original.to_string();
        let payload = payload.with(PayloadPatch::new().image_path(optimized.clone()));

        ctx.emit(PipelineEvent::ImageOptimized {
            original_path: original,
            optimized_path: optimized,
            payload: payload.to_snapshot(),
        })
        .await;
        ctx.completed(None);
        Ok(next.call(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run_stage, Harness};
    use pretty_assertions::assert_eq;

    fn with_image(path: &str) -> ContentPayload {
        ContentPayload::new().with(PayloadPatch::new().image_path(path))
    }

    #[tokio::test]
    async fn test_replaces_image_path() {
        let harness = Harness::new();
        let stage = OptimizeImageStage::new(harness.optimizer.clone());

        let flow = run_stage(&stage, with_image("articles/a.png"), &harness.context("Optimise Image"))
            .await
            .unwrap();

        assert_eq!(flow.payload().image_path(), Some("articles/a.webp"));
        assert_eq!(harness.optimizer.paths(), vec!["articles/a.png"]);
        assert_eq!(harness.events.event_types(), vec!["image.optimized"]);
    }

    #[tokio::test]
    async fn test_disabled_in_config() {
        let mut harness = Harness::new();
        harness.config.images.optimize = false;
        let stage = OptimizeImageStage::new(harness.optimizer.clone());

        let flow = run_stage(&stage, with_image("articles/a.png"), &harness.context("Optimise Image"))
            .await
            .unwrap();

        assert_eq!(flow.payload().image_path(), Some("articles/a.png"));
        assert!(harness.optimizer.paths().is_empty());
        assert_eq!(
            harness.progress_lines(),
            vec!["Optimise Image: skipped — disabled in config".to_string()]
        );
    }

    #[tokio::test]
    async fn test_skips_without_image() {
        let harness = Harness::new();
        let stage = OptimizeImageStage::new(harness.optimizer.clone());
        run_stage(&stage, ContentPayload::new(), &harness.context("Optimise Image"))
            .await
            .unwrap();
        assert_eq!(
            harness.progress_lines(),
            vec!["Optimise Image: skipped — no image to optimise".to_string()]
        );
    }
}
