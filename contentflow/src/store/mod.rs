//! Content and publish-log storage.
//!
//! The pipeline only needs a handful of operations on articles, tags and
//! staged inputs, so the stores are small async traits. In-memory
//! implementations are provided for tests and embedding.

mod memory;
mod models;

pub use memory::{InMemoryContentStore, InMemoryPublishLogStore};
pub use models::{
    Article, Category, NewArticle, NewPublishLog, PublishLog, StagedContent, Tag,
};

use crate::errors::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Durable storage for articles, tags, categories and staged inputs.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Creates an article and returns it with its id.
    ///
    /// Attaching `tag_ids` and flagging `staged_content_id` as published
    /// happen in the same write: either the article exists with both, or
    /// nothing changed.
    async fn create_article(&self, article: NewArticle) -> Result<Article>;

    /// Looks up an article.
    async fn find_article(&self, id: i64) -> Result<Option<Article>>;

    /// Returns the tag with this name's slug, creating it if needed.
    async fn first_or_create_tag(&self, name: &str) -> Result<Tag>;

    /// Returns all categories as id -> name.
    async fn categories(&self) -> Result<BTreeMap<i64, String>>;

    /// Looks up a staged input.
    async fn find_staged_content(&self, id: i64) -> Result<Option<StagedContent>>;
}

/// Append-only log of publish attempts.
#[async_trait]
pub trait PublishLogStore: Send + Sync {
    /// Appends a row.
    async fn append(&self, log: NewPublishLog) -> Result<PublishLog>;

    /// Returns true if a success row exists for this article and channel.
    async fn was_published_to(&self, article_id: i64, channel: &str) -> Result<bool>;

    /// Returns every row for an article, oldest first.
    async fn logs_for(&self, article_id: i64) -> Result<Vec<PublishLog>>;
}
