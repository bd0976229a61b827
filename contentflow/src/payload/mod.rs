//! The immutable unit of work flowing through the pipeline.
//!
//! A [`ContentPayload`] is never mutated. Stages read it through accessors
//! and derive a new one with [`ContentPayload::with`], supplying only the
//! fields they change in a [`PayloadPatch`].

mod snapshot;

pub use snapshot::PayloadSnapshot;

use crate::publishing::PublishResult;
use crate::store::{Article, StagedContent};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Everything produced so far in one run.
#[derive(Debug, Clone, Default)]
pub struct ContentPayload {
    source_url: Option<String>,
    source_driver: Option<String>,
    raw_content: Option<String>,
    cleaned_content: Option<String>,
    title: Option<String>,
    content: Option<String>,
    description: Option<String>,
    slug: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    image_prompt: Option<String>,
    image_path: Option<String>,
    category_id: Option<i64>,
    categories: BTreeMap<i64, String>,
    tags: Vec<String>,
    article: Option<Article>,
    staged_content: Option<StagedContent>,
    rejected: bool,
    rejection_reason: Option<String>,
    publish_results: BTreeMap<String, PublishResult>,
    extra: Map<String, Value>,
}

impl ContentPayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a payload for a source locator (URL, feed, or text).
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Creates a payload whose raw content is already known.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            source_driver: Some("text".to_string()),
            cleaned_content: Some(text.clone()),
            raw_content: Some(text),
            ..Self::default()
        }
    }

    /// Creates a payload from a staged input.
    #[must_use]
    pub fn from_staged_content(staged: &StagedContent) -> Self {
        let mut extra = Map::new();
        if let Some(source) = &staged.source_name {
            extra.insert("source_name".to_string(), Value::String(source.clone()));
        }
        if let Some(category) = &staged.category {
            extra.insert("category".to_string(), Value::String(category.clone()));
        }

        Self {
            source_url: Some(staged.url.clone()),
            title: Some(staged.title.clone()),
            staged_content: Some(staged.clone()),
            extra,
            ..Self::default()
        }
    }

    /// Returns a new payload with the patch applied.
    ///
    /// `rejected` is sticky: a patch can set it but never clear it, and an
    /// article cannot be attached to a rejected payload.
    #[must_use]
    pub fn with(&self, patch: PayloadPatch) -> Self {
        let mut next = self.clone();

        macro_rules! apply {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = patch.$field {
                        next.$field = Some(value);
                    }
                )*
            };
        }

        apply!(
            source_url,
            source_driver,
            raw_content,
            cleaned_content,
            title,
            content,
            description,
            slug,
            meta_title,
            meta_description,
            image_prompt,
            image_path,
            category_id,
            staged_content,
        );

        if let Some(categories) = patch.categories {
            next.categories = categories;
        }
        if let Some(tags) = patch.tags {
            next.tags = tags;
        }
        next.publish_results.extend(patch.publish_results);
        next.extra.extend(patch.extra);

        if patch.rejected && !next.rejected {
            next.rejected = true;
            next.rejection_reason = patch.rejection_reason;
        }

        if let Some(article) = patch.article {
            if next.rejected {
                tracing::warn!(
                    article_id = article.id,
                    "Ignoring article reference on a rejected payload"
                );
            } else {
                next.article = Some(article);
            }
        }

        next
    }

    /// Source locator.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Source driver hint.
    #[must_use]
    pub fn source_driver(&self) -> Option<&str> {
        self.source_driver.as_deref()
    }

    /// Raw fetched content.
    #[must_use]
    pub fn raw_content(&self) -> Option<&str> {
        self.raw_content.as_deref()
    }

    /// Cleaned content.
    #[must_use]
    pub fn cleaned_content(&self) -> Option<&str> {
        self.cleaned_content.as_deref()
    }

    /// Cleaned content, falling back to raw content.
    #[must_use]
    pub fn best_content(&self) -> Option<&str> {
        self.cleaned_content
            .as_deref()
            .or(self.raw_content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    /// Title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Rewritten body.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Slug.
    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    /// SEO title.
    #[must_use]
    pub fn meta_title(&self) -> Option<&str> {
        self.meta_title.as_deref()
    }

    /// SEO description.
    #[must_use]
    pub fn meta_description(&self) -> Option<&str> {
        self.meta_description.as_deref()
    }

    /// Image prompt.
    #[must_use]
    pub fn image_prompt(&self) -> Option<&str> {
        self.image_prompt.as_deref()
    }

    /// Stored image path.
    #[must_use]
    pub fn image_path(&self) -> Option<&str> {
        self.image_path.as_deref()
    }

    /// Category id.
    #[must_use]
    pub const fn category_id(&self) -> Option<i64> {
        self.category_id
    }

    /// Candidate categories (id -> name).
    #[must_use]
    pub const fn categories(&self) -> &BTreeMap<i64, String> {
        &self.categories
    }

    /// Tag names.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Persisted article, once created.
    #[must_use]
    pub const fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    /// Originating staged input.
    #[must_use]
    pub const fn staged_content(&self) -> Option<&StagedContent> {
        self.staged_content.as_ref()
    }

    /// Whether a stage refused the content.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Why the content was refused.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Per-channel publish outcomes.
    #[must_use]
    pub const fn publish_results(&self) -> &BTreeMap<String, PublishResult> {
        &self.publish_results
    }

    /// Source-specific metadata.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// The subset of fields a stage changes.
///
/// Unset fields keep the current payload's value. Publish results and
/// extra entries are merged rather than replaced.
#[derive(Debug, Clone, Default)]
pub struct PayloadPatch {
    source_url: Option<String>,
    source_driver: Option<String>,
    raw_content: Option<String>,
    cleaned_content: Option<String>,
    title: Option<String>,
    content: Option<String>,
    description: Option<String>,
    slug: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    image_prompt: Option<String>,
    image_path: Option<String>,
    category_id: Option<i64>,
    categories: Option<BTreeMap<i64, String>>,
    tags: Option<Vec<String>>,
    article: Option<Article>,
    staged_content: Option<StagedContent>,
    rejected: bool,
    rejection_reason: Option<String>,
    publish_results: BTreeMap<String, PublishResult>,
    extra: Map<String, Value>,
}

macro_rules! patch_setters {
    ($($(#[$doc:meta])* $field:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

impl PayloadPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    patch_setters!(
        /// Sets the source locator.
        source_url: String,
        /// Sets the source driver hint.
        source_driver: String,
        /// Sets the raw content.
        raw_content: String,
        /// Sets the cleaned content.
        cleaned_content: String,
        /// Sets the title.
        title: String,
        /// Sets the rewritten body.
        content: String,
        /// Sets the description.
        description: String,
        /// Sets the slug.
        slug: String,
        /// Sets the SEO title.
        meta_title: String,
        /// Sets the SEO description.
        meta_description: String,
        /// Sets the image prompt.
        image_prompt: String,
        /// Sets the image path.
        image_path: String,
    );

    /// Sets the category id.
    #[must_use]
    pub const fn category_id(mut self, id: i64) -> Self {
        self.category_id = Some(id);
        self
    }

    /// Replaces the candidate categories.
    #[must_use]
    pub fn categories(mut self, categories: BTreeMap<i64, String>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Replaces the tag list.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Attaches the persisted article.
    #[must_use]
    pub fn article(mut self, article: Article) -> Self {
        self.article = Some(article);
        self
    }

    /// Attaches the originating staged input.
    #[must_use]
    pub fn staged_content(mut self, staged: StagedContent) -> Self {
        self.staged_content = Some(staged);
        self
    }

    /// Marks the payload rejected.
    #[must_use]
    pub fn reject(mut self, reason: impl Into<String>) -> Self {
        self.rejected = true;
        self.rejection_reason = Some(reason.into());
        self
    }

    /// Records one channel's outcome.
    #[must_use]
    pub fn publish_result(mut self, channel: impl Into<String>, result: PublishResult) -> Self {
        self.publish_results.insert(channel.into(), result);
        self
    }

    /// Sets one metadata entry.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArticleStatus;
    use chrono::Utc;

    fn article(id: i64) -> Article {
        Article {
            id,
            title: "T".to_string(),
            slug: "t".to_string(),
            content: None,
            description: None,
            featured_image: None,
            meta_title: None,
            meta_description: None,
            category_id: None,
            status: ArticleStatus::Published,
            published_at: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_with_does_not_mutate_original() {
        let original = ContentPayload::from_url("https://example.com").with(
            PayloadPatch::new()
                .title("Original")
                .tags(["a", "b"])
                .category_id(3),
        );

        let next = original.with(PayloadPatch::new().title("Changed"));

        assert_eq!(original.title(), Some("Original"));
        assert_eq!(next.title(), Some("Changed"));
        assert_eq!(next.source_url(), Some("https://example.com"));
        assert_eq!(next.tags(), ["a", "b"]);
        assert_eq!(next.category_id(), Some(3));
    }

    #[test]
    fn test_rejection_is_sticky() {
        let rejected = ContentPayload::new().with(PayloadPatch::new().reject("low quality"));
        assert!(rejected.is_rejected());

        let later = rejected.with(PayloadPatch::new().reject("other reason").title("x"));
        assert!(later.is_rejected());
        assert_eq!(later.rejection_reason(), Some("low quality"));
        assert_eq!(later.title(), Some("x"));
    }

    #[test]
    fn test_rejected_payload_cannot_gain_article() {
        let rejected = ContentPayload::new().with(PayloadPatch::new().reject("no"));
        let next = rejected.with(PayloadPatch::new().article(article(1)));
        assert!(next.article().is_none());

        let both = ContentPayload::new().with(PayloadPatch::new().article(article(2)).reject("no"));
        assert!(both.article().is_none());
    }

    #[test]
    fn test_merge_maps() {
        let payload = ContentPayload::new()
            .with(PayloadPatch::new().extra("a", 1).publish_result("log", PublishResult::success("log")))
            .with(PayloadPatch::new().extra("b", 2).publish_result("telegram", PublishResult::failure("telegram", "down")));

        assert_eq!(payload.extra().len(), 2);
        assert_eq!(payload.publish_results().len(), 2);
        assert!(payload.publish_results()["log"].success);
    }

    #[test]
    fn test_from_staged_content() {
        let staged = StagedContent::new(9, "Headline", "https://news.test/a")
            .with_source_name("News")
            .with_category("World");
        let payload = ContentPayload::from_staged_content(&staged);

        assert_eq!(payload.source_url(), Some("https://news.test/a"));
        assert_eq!(payload.title(), Some("Headline"));
        assert_eq!(payload.staged_content().map(|s| s.id), Some(9));
        assert_eq!(payload.extra()["source_name"], "News");
        assert_eq!(payload.extra()["category"], "World");
    }

    #[test]
    fn test_from_text_and_best_content() {
        let payload = ContentPayload::from_text("plain words");
        assert_eq!(payload.raw_content(), Some("plain words"));
        assert_eq!(payload.source_driver(), Some("text"));
        assert_eq!(payload.best_content(), Some("plain words"));

        let raw_only = ContentPayload::new().with(PayloadPatch::new().raw_content("raw"));
        assert_eq!(raw_only.best_content(), Some("raw"));
        assert_eq!(ContentPayload::new().best_content(), None);
    }
}
