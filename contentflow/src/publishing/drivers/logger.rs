//! Log-only channel.

use crate::errors::Result;
use crate::publishing::{PublishResult, Publisher};
use crate::store::Article;
use async_trait::async_trait;
use tracing::info;

/// Writes published articles to the log.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    channel: String,
}

impl LogPublisher {
    /// Creates a log publisher for a channel name.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn supports(&self, _article: &Article) -> bool {
        true
    }

    async fn publish(&self, article: &Article) -> Result<PublishResult> {
        info!(
            channel = %self.channel,
            article_id = article.id,
            title = %article.title,
            slug = %article.slug,
            "Article published"
        );
        Ok(PublishResult::success(&self.channel).with_external_id(format!("log-{}", article.id)))
    }
}
