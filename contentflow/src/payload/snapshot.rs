//! Serializable payload checkpoints.

use super::ContentPayload;
use crate::errors::Result;
use crate::publishing::PublishResult;
use crate::store::ContentStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A plain projection of a payload, with records replaced by their ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadSnapshot {
    /// Source locator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Source driver hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_driver: Option<String>,
    /// Raw fetched content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    /// Cleaned content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_content: Option<String>,
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Rewritten body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// SEO title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    /// SEO description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    /// Image prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    /// Stored image path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Category id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    /// Candidate categories.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<i64, String>,
    /// Tag names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Persisted article id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<i64>,
    /// Staged input id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_content_id: Option<i64>,
    /// Rejection flag.
    #[serde(default)]
    pub rejected: bool,
    /// Rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Per-channel outcomes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub publish_results: BTreeMap<String, PublishResult>,
    /// Source-specific metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ContentPayload {
    /// Projects the payload into a serializable snapshot.
    #[must_use]
    pub fn to_snapshot(&self) -> PayloadSnapshot {
        PayloadSnapshot {
            source_url: self.source_url.clone(),
            source_driver: self.source_driver.clone(),
            raw_content: self.raw_content.clone(),
            cleaned_content: self.cleaned_content.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            description: self.description.clone(),
            slug: self.slug.clone(),
            meta_title: self.meta_title.clone(),
            meta_description: self.meta_description.clone(),
            image_prompt: self.image_prompt.clone(),
            image_path: self.image_path.clone(),
            category_id: self.category_id,
            categories: self.categories.clone(),
            tags: self.tags.clone(),
            article_id: self.article.as_ref().map(|a| a.id),
            staged_content_id: self.staged_content.as_ref().map(|s| s.id),
            rejected: self.rejected,
            rejection_reason: self.rejection_reason.clone(),
            publish_results: self.publish_results.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Rebuilds a payload, re-fetching referenced records from the store.
    ///
    /// A record that no longer exists leaves its field absent. Store
    /// failures still propagate.
    pub async fn from_snapshot(snapshot: PayloadSnapshot, store: &dyn ContentStore) -> Result<Self> {
        let article = match snapshot.article_id {
            Some(id) => {
                let found = store.find_article(id).await?;
                if found.is_none() {
                    tracing::warn!(article_id = id, "Snapshot references a missing article");
                }
                found
            }
            None => None,
        };

        let staged_content = match snapshot.staged_content_id {
            Some(id) => {
                let found = store.find_staged_content(id).await?;
                if found.is_none() {
                    tracing::warn!(staged_content_id = id, "Snapshot references missing staged content");
                }
                found
            }
            None => None,
        };

        let mut payload = Self::from_snapshot_detached(snapshot);
        payload.article = article;
        payload.staged_content = staged_content;
        Ok(payload)
    }

    /// Rebuilds a payload without a store; record references stay absent.
    #[must_use]
    pub fn from_snapshot_detached(snapshot: PayloadSnapshot) -> Self {
        Self {
            source_url: snapshot.source_url,
            source_driver: snapshot.source_driver,
            raw_content: snapshot.raw_content,
            cleaned_content: snapshot.cleaned_content,
            title: snapshot.title,
            content: snapshot.content,
            description: snapshot.description,
            slug: snapshot.slug,
            meta_title: snapshot.meta_title,
            meta_description: snapshot.meta_description,
            image_prompt: snapshot.image_prompt,
            image_path: snapshot.image_path,
            category_id: snapshot.category_id,
            categories: snapshot.categories,
            tags: snapshot.tags,
            article: None,
            staged_content: None,
            rejected: snapshot.rejected,
            rejection_reason: snapshot.rejection_reason,
            publish_results: snapshot.publish_results,
            extra: snapshot.extra,
        }
    }

    /// Returns the persisted article's id.
    #[must_use]
    pub fn article_id(&self) -> Option<i64> {
        self.article.as_ref().map(|a| a.id)
    }

    /// Returns the staged input's id.
    #[must_use]
    pub fn staged_content_id(&self) -> Option<i64> {
        self.staged_content.as_ref().map(|s| s.id)
    }
}
