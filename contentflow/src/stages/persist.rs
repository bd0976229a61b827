//! Creates the article record.

use super::{Next, Pipe, StageContext, StageFlow};
use crate::core::{ArticleStatus, PipelineEvent};
use crate::errors::Result;
use crate::payload::{ContentPayload, PayloadPatch};
use crate::store::{ContentStore, NewArticle};
use crate::utils::slugify;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Persists the payload as a published article, attaches its tags and
/// flags the originating staged input.
#[derive(Clone)]
pub struct PersistStage {
    store: Arc<dyn ContentStore>,
}

impl fmt::Debug for PersistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistStage").finish_non_exhaustive()
    }
}

impl PersistStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    fn new_article(payload: &ContentPayload, tag_ids: Vec<i64>) -> NewArticle {
        let title = payload.title().unwrap_or("Untitled").to_string();
        let slug = payload
            .slug()
            .filter(|s| !s.is_empty())
            .map_or_else(|| slugify(&title), String::from);

        NewArticle {
            title,
            slug,
            content: payload.content().map(String::from),
            description: payload.description().map(String::from),
            featured_image: payload.image_path().map(String::from),
            meta_title: payload.meta_title().map(String::from),
            meta_description: payload.meta_description().map(String::from),
            category_id: payload.category_id(),
            status: ArticleStatus::Published,
            published_at: Some(Utc::now()),
            tag_ids,
            staged_content_id: payload.staged_content().map(|staged| staged.id),
        }
    }
}

#[async_trait]
impl Pipe for PersistStage {
    fn name(&self) -> &str {
        "persist"
    }

    fn label(&self) -> &str {
        "Create Article"
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        if payload.is_rejected() {
            ctx.skipped("content was rejected");
            return Ok(StageFlow::halt(payload.clone()));
        }
        if let Some(article) = payload.article() {
            ctx.skipped(&format!("article #{} already exists", article.id));
            return Ok(next.call(payload.clone()));
        }

        // Tags are find-or-create; the article write must stay the last
        // store call so a replay never duplicates it.
        let mut tag_ids = Vec::with_capacity(payload.tags().len());
        for name in payload.tags() {
            let id = self.store.first_or_create_tag(name).await?.id;
            if !tag_ids.contains(&id) {
                tag_ids.push(id);
            }
        }
        let article = self
            .store
            .create_article(Self::new_article(payload, tag_ids))
            .await?;

        let mut patch = PayloadPatch::new().article(article.clone());
        if let Some(staged) = payload.staged_content() {
            let mut staged = staged.clone();
            staged.published = true;
            staged.published_at = article.published_at;
            patch = patch.staged_content(staged);
        }
        let payload = payload.with(patch);

        info!(
            article_id = article.id,
            slug = %article.slug,
            tags = article.tags.len(),
            "Article created"
        );
        ctx.emit(PipelineEvent::ArticleCreated {
            article_id: article.id,
            payload: payload.to_snapshot(),
        })
        .await;
        ctx.completed(Some(&format!("ID #{}", article.id)));
        Ok(next.call(payload))
    }
}
