//! Generates a featured image from the AI-written prompt.

use super::{Next, Pipe, StageContext, StageFlow};
use crate::ai::ImageGeneration;
use crate::core::PipelineEvent;
use crate::errors::Result;
use crate::payload::{ContentPayload, PayloadPatch};
use async_trait::async_trait;
use std::sync::Arc;

/// Fills `image_path` from `image_prompt`.
#[derive(Debug, Clone)]
pub struct GenerateImageStage {
    generator: Arc<dyn ImageGeneration>,
}

impl GenerateImageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(generator: Arc<dyn ImageGeneration>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Pipe for GenerateImageStage {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn label(&self) -> &str {
        "Generate Image"
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        if payload.image_path().is_some() {
            ctx.skipped("image already present");
            return Ok(next.call(payload.clone()));
        }
        let Some(prompt) = payload.image_prompt().filter(|p| !p.trim().is_empty()) else {
            ctx.skipped("no image prompt");
            return Ok(next.call(payload.clone()));
        };

        let path = self.generator.generate(prompt).await?;
        let payload = payload.with(PayloadPatch::new().image_path(path.clone()));

        ctx.emit(PipelineEvent::ImageGenerated {
            path,
            payload: payload.to_snapshot(),
        })
        .await;
        ctx.completed(None);
        Ok(next.call(payload))
    }
}
