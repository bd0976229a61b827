//! In-memory store implementations.

use super::{
    Article, ContentStore, NewArticle, NewPublishLog, PublishLog, PublishLogStore,
    StagedContent, Tag,
};
use crate::errors::Result;
use crate::utils::slugify;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
struct ContentTables {
    articles: BTreeMap<i64, Article>,
    tags: BTreeMap<i64, Tag>,
    categories: BTreeMap<i64, String>,
    staged: BTreeMap<i64, StagedContent>,
}

/// Content store backed by in-process maps.
#[derive(Debug)]
pub struct InMemoryContentStore {
    tables: RwLock<ContentTables>,
    next_article_id: AtomicI64,
    next_tag_id: AtomicI64,
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(ContentTables::default()),
            next_article_id: AtomicI64::new(1),
            next_tag_id: AtomicI64::new(1),
        }
    }

    /// Adds a category.
    #[must_use]
    pub fn with_category(self, id: i64, name: impl Into<String>) -> Self {
        self.insert_category(id, name);
        self
    }

    /// Adds or renames a category on a shared store.
    pub fn insert_category(&self, id: i64, name: impl Into<String>) {
        self.tables.write().categories.insert(id, name.into());
    }

    /// Inserts or replaces a staged input.
    pub fn insert_staged(&self, staged: StagedContent) {
        self.tables.write().staged.insert(staged.id, staged);
    }

    /// Removes an article, as if deleted by an operator.
    pub fn delete_article(&self, id: i64) -> Option<Article> {
        self.tables.write().articles.remove(&id)
    }

    /// Returns all articles.
    #[must_use]
    pub fn articles(&self) -> Vec<Article> {
        self.tables.read().articles.values().cloned().collect()
    }

    /// Returns the number of articles.
    #[must_use]
    pub fn article_count(&self) -> usize {
        self.tables.read().articles.len()
    }

    /// Returns all tags.
    #[must_use]
    pub fn tags(&self) -> Vec<Tag> {
        self.tables.read().tags.values().cloned().collect()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn create_article(&self, article: NewArticle) -> Result<Article> {
        let mut tables = self.tables.write();
        let tags: Vec<Tag> = article
            .tag_ids
            .iter()
            .filter_map(|id| tables.tags.get(id).cloned())
            .collect();

        let id = self.next_article_id.fetch_add(1, Ordering::SeqCst);
        let record = Article {
            id,
            title: article.title,
            slug: article.slug,
            content: article.content,
            description: article.description,
            featured_image: article.featured_image,
            meta_title: article.meta_title,
            meta_description: article.meta_description,
            category_id: article.category_id,
            status: article.status,
            published_at: article.published_at,
            tags,
            created_at: Utc::now(),
        };
        if let Some(staged) = article
            .staged_content_id
            .and_then(|staged_id| tables.staged.get_mut(&staged_id))
        {
            staged.published = true;
            staged.published_at = record.published_at.or_else(|| Some(Utc::now()));
        }
        tables.articles.insert(id, record.clone());
        Ok(record)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>> {
        Ok(self.tables.read().articles.get(&id).cloned())
    }

    async fn first_or_create_tag(&self, name: &str) -> Result<Tag> {
        let slug = slugify(name);
        let mut tables = self.tables.write();
        if let Some(existing) = tables.tags.values().find(|t| t.slug == slug) {
            return Ok(existing.clone());
        }
        let tag = Tag {
            id: self.next_tag_id.fetch_add(1, Ordering::SeqCst),
            name: name.trim().to_string(),
            slug,
        };
        tables.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn categories(&self) -> Result<BTreeMap<i64, String>> {
        Ok(self.tables.read().categories.clone())
    }

    async fn find_staged_content(&self, id: i64) -> Result<Option<StagedContent>> {
        Ok(self.tables.read().staged.get(&id).cloned())
    }
}

/// Publish log backed by an in-process vector.
#[derive(Debug)]
pub struct InMemoryPublishLogStore {
    rows: RwLock<Vec<PublishLog>>,
    next_id: AtomicI64,
}

impl Default for InMemoryPublishLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPublishLogStore {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Returns all rows.
    #[must_use]
    pub fn all(&self) -> Vec<PublishLog> {
        self.rows.read().clone()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl PublishLogStore for InMemoryPublishLogStore {
    async fn append(&self, log: NewPublishLog) -> Result<PublishLog> {
        let row = PublishLog {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            article_id: log.article_id,
            channel: log.channel,
            status: log.status,
            external_id: log.external_id,
            external_url: log.external_url,
            error: log.error,
            metadata: log.metadata,
            created_at: Utc::now(),
        };
        self.rows.write().push(row.clone());
        Ok(row)
    }

    async fn was_published_to(&self, article_id: i64, channel: &str) -> Result<bool> {
        Ok(self.rows.read().iter().any(|row| {
            row.article_id == article_id && row.channel == channel && row.status.is_success()
        }))
    }

    async fn logs_for(&self, article_id: i64) -> Result<Vec<PublishLog>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|row| row.article_id == article_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArticleStatus, PublishStatus};

    fn new_article(title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            slug: slugify(title),
            status: ArticleStatus::Published,
            ..NewArticle::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_find_article() {
        let store = InMemoryContentStore::new();
        let first = store.create_article(new_article("First")).await.unwrap();
        let second = store.create_article(new_article("Second")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.find_article(2).await.unwrap().unwrap().title, "Second");
        assert!(store.find_article(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tags_are_unique_by_slug() {
        let store = InMemoryContentStore::new();
        let a = store.first_or_create_tag("Rust Lang").await.unwrap();
        let b = store.first_or_create_tag("rust lang").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.tags().len(), 1);
    }

    #[tokio::test]
    async fn test_create_attaches_tags_and_flags_staged_input() {
        let store = InMemoryContentStore::new().with_category(1, "Tech");
        store.insert_staged(StagedContent::new(5, "Headline", "https://example.com/a"));
        let tag = store.first_or_create_tag("news").await.unwrap();

        let article = store
            .create_article(NewArticle {
                tag_ids: vec![tag.id],
                staged_content_id: Some(5),
                ..new_article("Tagged")
            })
            .await
            .unwrap();

        assert_eq!(article.tags, vec![tag]);
        let staged = store.find_staged_content(5).await.unwrap().unwrap();
        assert!(staged.published);
        assert!(staged.published_at.is_some());
        assert_eq!(store.categories().await.unwrap().get(&1).unwrap(), "Tech");
    }

    #[tokio::test]
    async fn test_publish_log_success_lookup() {
        let logs = InMemoryPublishLogStore::new();
        let failed = NewPublishLog {
            article_id: 1,
            channel: "telegram".to_string(),
            status: PublishStatus::Failed,
            external_id: None,
            external_url: None,
            error: Some("timeout".to_string()),
            metadata: serde_json::Map::new(),
        };
        logs.append(failed.clone()).await.unwrap();
        assert!(!logs.was_published_to(1, "telegram").await.unwrap());

        logs.append(NewPublishLog {
            status: PublishStatus::Success,
            error: None,
            ..failed
        })
        .await
        .unwrap();
        assert!(logs.was_published_to(1, "telegram").await.unwrap());
        assert!(!logs.was_published_to(2, "telegram").await.unwrap());
        assert_eq!(logs.logs_for(1).await.unwrap().len(), 2);
    }
}
