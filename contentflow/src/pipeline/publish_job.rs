//! Queue entry point for (re)publishing an existing article.

use super::RunLocks;
use crate::errors::Result;
use crate::publishing::{PublishResult, PublisherManager};
use crate::store::ContentStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// How a [`PublishArticleJob`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishJobOutcome {
    /// The article no longer exists.
    Missing,
    /// The article is still a draft; queue the job again after the delay.
    Deferred {
        /// Suggested delay before the next attempt.
        retry_after: Duration,
    },
    /// Per-channel outcomes; channels skipped as already published or
    /// unsupported are absent.
    Published(BTreeMap<String, PublishResult>),
}

/// Publishes an article created outside the pipeline (or publishes it
/// again) to the active channels or to an explicit list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishArticleJob {
    /// Article to publish.
    pub article_id: i64,
    /// Channels to use instead of the active ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
}

impl PublishArticleJob {
    /// Attempts a queue should make before giving up.
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay used when the article is not published yet.
    pub const DEFER_DELAY: Duration = Duration::from_secs(60);

    /// A job for the active channels.
    #[must_use]
    pub const fn new(article_id: i64) -> Self {
        Self {
            article_id,
            channels: None,
        }
    }

    /// Restricts the job to `channels`.
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    /// Delay before retrying after failed attempt number `attempt`
    /// (1-based), or `None` once the attempts are spent.
    #[must_use]
    pub const fn backoff(attempt: u32) -> Option<Duration> {
        match attempt {
            1 => Some(Duration::from_secs(60)),
            2 => Some(Duration::from_secs(300)),
            _ => None,
        }
    }

    /// Runs the job while holding the article's publish lock.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` when another job holds the article, and store
    /// errors from loading it. Channel failures are outcomes, not errors.
    pub async fn handle(
        &self,
        store: &dyn ContentStore,
        publishers: &PublisherManager,
        locks: &RunLocks,
    ) -> Result<PublishJobOutcome> {
        let _guard = locks.acquire(&RunLocks::publish_key(self.article_id))?;

        let Some(article) = store.find_article(self.article_id).await? else {
            warn!(article_id = self.article_id, "Article to publish not found");
            return Ok(PublishJobOutcome::Missing);
        };
        if !article.is_published() {
            info!(article_id = self.article_id, "Article not published yet, deferring");
            return Ok(PublishJobOutcome::Deferred {
                retry_after: Self::DEFER_DELAY,
            });
        }

        let results = publishers
            .publish_to_channels(&article, self.channels.as_deref())
            .await;
        let succeeded = results.values().filter(|r| r.success).count();
        info!(
            article_id = self.article_id,
            succeeded,
            failed = results.len() - succeeded,
            "Publish job completed"
        );
        Ok(PublishJobOutcome::Published(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArticleStatus;
    use crate::errors::ContentFlowError;
    use crate::publishing::Publisher;
    use crate::store::NewArticle;
    use crate::testing::{Harness, MockPublisher};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn article(harness: &Harness, status: ArticleStatus) -> i64 {
        harness
            .store
            .create_article(NewArticle {
                title: "Manual post".to_string(),
                slug: "manual-post".to_string(),
                content: Some("<p>Written by hand.</p>".to_string()),
                status,
                ..NewArticle::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_publishes_to_active_channels_once() {
        let harness = Harness::new();
        let id = article(&harness, ArticleStatus::Published).await;
        let locks = RunLocks::new();
        let job = PublishArticleJob::new(id);

        let first = job.handle(harness.store.as_ref(), &harness.publishers, &locks).await.unwrap();
        let PublishJobOutcome::Published(results) = first else {
            panic!("expected results, got {first:?}");
        };
        assert!(results["mock"].success);

        let again = job.handle(harness.store.as_ref(), &harness.publishers, &locks).await.unwrap();
        assert_eq!(again, PublishJobOutcome::Published(BTreeMap::new()));
        assert_eq!(harness.publisher.calls(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_channels_override_active_ones() {
        let harness = Harness::new();
        harness
            .publishers
            .extend("extra", |_| Ok(Arc::new(MockPublisher::new("extra")) as Arc<dyn Publisher>));
        let id = article(&harness, ArticleStatus::Published).await;

        let outcome = PublishArticleJob::new(id)
            .with_channels(["extra"])
            .handle(harness.store.as_ref(), &harness.publishers, &RunLocks::new())
            .await
            .unwrap();

        let PublishJobOutcome::Published(results) = outcome else {
            panic!("expected results");
        };
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["extra"]);
        assert_eq!(harness.publisher.calls(), 0);
    }

    #[tokio::test]
    async fn test_draft_is_deferred_and_missing_is_reported() {
        let harness = Harness::new();
        let draft = article(&harness, ArticleStatus::Draft).await;
        let locks = RunLocks::new();

        let deferred = PublishArticleJob::new(draft)
            .handle(harness.store.as_ref(), &harness.publishers, &locks)
            .await
            .unwrap();
        assert_eq!(deferred, PublishJobOutcome::Deferred { retry_after: Duration::from_secs(60) });

        let missing = PublishArticleJob::new(999)
            .handle(harness.store.as_ref(), &harness.publishers, &locks)
            .await
            .unwrap();
        assert_eq!(missing, PublishJobOutcome::Missing);
        assert_eq!(harness.publisher.calls(), 0);
    }

    #[tokio::test]
    async fn test_same_article_cannot_publish_concurrently() {
        let harness = Harness::new();
        let id = article(&harness, ArticleStatus::Published).await;
        let locks = RunLocks::new();
        let _held = locks.acquire(&RunLocks::publish_key(id)).unwrap();

        let err = PublishArticleJob::new(id)
            .handle(harness.store.as_ref(), &harness.publishers, &locks)
            .await
            .unwrap_err();

        assert!(matches!(err, ContentFlowError::AlreadyRunning { .. }));
        assert_eq!(harness.publisher.calls(), 0);
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(PublishArticleJob::backoff(1), Some(Duration::from_secs(60)));
        assert_eq!(PublishArticleJob::backoff(2), Some(Duration::from_secs(300)));
        assert_eq!(PublishArticleJob::backoff(PublishArticleJob::MAX_ATTEMPTS), None);
    }

    #[test]
    fn test_job_serializes_compactly() {
        let json = serde_json::to_string(&PublishArticleJob::new(7)).unwrap();
        assert_eq!(json, r#"{"article_id":7}"#);
    }
}
