//! Fetches raw content for the payload's source locator.

use super::{Next, Pipe, StageContext, StageFlow};
use crate::core::PipelineEvent;
use crate::errors::Result;
use crate::payload::{ContentPayload, PayloadPatch};
use crate::sources::ContentSourceManager;
use crate::utils::strip_tags;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Resolves a source driver and fills `raw_content` and `cleaned_content`.
#[derive(Debug, Clone)]
pub struct FetchStage {
    sources: Arc<ContentSourceManager>,
}

impl FetchStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(sources: Arc<ContentSourceManager>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Pipe for FetchStage {
    fn name(&self) -> &str {
        "fetch"
    }

    fn label(&self) -> &str {
        "Fetch"
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        if payload.raw_content().is_some_and(|c| !c.trim().is_empty()) {
            ctx.skipped("content already present");
            return Ok(next.call(payload.clone()));
        }
        let Some(url) = payload.source_url().filter(|u| !u.trim().is_empty()) else {
            ctx.skipped("no source URL");
            return Ok(next.call(payload.clone()));
        };

        let fetched = self.sources.fetch(url, payload.source_driver()).await?;
        let driver = fetched.driver().unwrap_or("unknown").to_string();
        let length = fetched.content.chars().count();

        let mut patch = PayloadPatch::new()
            .cleaned_content(strip_tags(&fetched.content))
            .raw_content(fetched.content)
            .source_driver(driver.clone())
            .extra("source_meta", Value::Object(fetched.meta));
        if payload.title().is_none() {
            if let Some(title) = fetched.title {
                patch = patch.title(title);
            }
        }
        let payload = payload.with(patch);

        ctx.emit(PipelineEvent::ContentFetched {
            driver: driver.clone(),
            length,
            payload: payload.to_snapshot(),
        })
        .await;
        ctx.completed(Some(&format!("{length} chars via {driver} driver")));
        Ok(next.call(payload))
    }
}
