//! Records owned by the content store.

use crate::core::{ArticleStatus, PublishStatus};
use crate::publishing::PublishResult;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Store-assigned id.
    pub id: i64,
    /// Headline.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Body (HTML).
    pub content: Option<String>,
    /// Short summary.
    pub description: Option<String>,
    /// Relative path of the featured image.
    pub featured_image: Option<String>,
    /// SEO title.
    pub meta_title: Option<String>,
    /// SEO description.
    pub meta_description: Option<String>,
    /// Category id.
    pub category_id: Option<i64>,
    /// Publication status.
    pub status: ArticleStatus,
    /// When the article went live.
    pub published_at: Option<Timestamp>,
    /// Attached tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Article {
    /// Returns true if the article is live.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    /// Returns true if the article has a non-empty body.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Fields for creating an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    /// Headline.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Body (HTML).
    pub content: Option<String>,
    /// Short summary.
    pub description: Option<String>,
    /// Relative path of the featured image.
    pub featured_image: Option<String>,
    /// SEO title.
    pub meta_title: Option<String>,
    /// SEO description.
    pub meta_description: Option<String>,
    /// Category id.
    pub category_id: Option<i64>,
    /// Publication status.
    pub status: ArticleStatus,
    /// When the article went live.
    pub published_at: Option<Timestamp>,
    /// Tags attached in the same write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<i64>,
    /// Staged input flagged as published in the same write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_content_id: Option<i64>,
}

/// A tag, unique by slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Store-assigned id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Unique slug.
    pub slug: String,
}

/// An article category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Store-assigned id.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// A source item queued for processing (e.g. a scraped headline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedContent {
    /// Store-assigned id.
    pub id: i64,
    /// Headline as found at the source.
    pub title: String,
    /// Source URL.
    pub url: String,
    /// Category hint from the source.
    pub category: Option<String>,
    /// Name of the source site.
    pub source_name: Option<String>,
    /// Whether an article was produced from it.
    pub published: bool,
    /// When it was published.
    pub published_at: Option<Timestamp>,
}

impl StagedContent {
    /// Creates an unpublished staged item.
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: url.into(),
            category: None,
            source_name: None,
            published: false,
            published_at: None,
        }
    }

    /// Sets the source name.
    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Sets the category hint.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One publish attempt for an (article, channel) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishLog {
    /// Store-assigned id.
    pub id: i64,
    /// Article published.
    pub article_id: i64,
    /// Channel name.
    pub channel: String,
    /// Outcome.
    pub status: PublishStatus,
    /// Id assigned by the channel.
    pub external_id: Option<String>,
    /// Link on the channel.
    pub external_url: Option<String>,
    /// Failure detail.
    pub error: Option<String>,
    /// Channel-specific data.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Attempt time.
    pub created_at: Timestamp,
}

/// Fields for appending a publish log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPublishLog {
    /// Article published.
    pub article_id: i64,
    /// Channel name.
    pub channel: String,
    /// Outcome.
    pub status: PublishStatus,
    /// Id assigned by the channel.
    pub external_id: Option<String>,
    /// Link on the channel.
    pub external_url: Option<String>,
    /// Failure detail.
    pub error: Option<String>,
    /// Channel-specific data.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewPublishLog {
    /// Builds a log row from a channel outcome.
    #[must_use]
    pub fn from_result(article_id: i64, result: &PublishResult) -> Self {
        Self {
            article_id,
            channel: result.channel.clone(),
            status: if result.success {
                PublishStatus::Success
            } else {
                PublishStatus::Failed
            },
            external_id: result.external_id.clone(),
            external_url: result.external_url.clone(),
            error: result.error.clone(),
            metadata: result.metadata.clone(),
        }
    }
}
