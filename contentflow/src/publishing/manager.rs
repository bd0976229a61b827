//! Channel resolution and fan-out.

use super::drivers::{
    BloggerPublisher, FacebookPublisher, LogPublisher, TelegramPublisher, WordPressPublisher,
};
use super::{PublishResult, Publisher};
use crate::config::{ChannelSettings, PublishingConfig};
use crate::errors::{ContentFlowError, Result};
use crate::store::{Article, NewPublishLog, PublishLogStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Builds a publisher from its channel settings.
pub type PublisherFactory =
    Arc<dyn Fn(&ChannelSettings) -> Result<Arc<dyn Publisher>> + Send + Sync>;

/// Channels shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinChannel {
    /// Writes to the log only.
    Log,
    /// Telegram bot message.
    Telegram,
    /// WordPress REST API.
    WordPress,
    /// Facebook page feed.
    Facebook,
    /// Google Blogger posts.
    Blogger,
}

impl BuiltinChannel {
    /// All built-in channels.
    pub const ALL: [Self; 5] = [
        Self::Log,
        Self::Telegram,
        Self::WordPress,
        Self::Facebook,
        Self::Blogger,
    ];

    /// Returns the channel name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Telegram => "telegram",
            Self::WordPress => "wordpress",
            Self::Facebook => "facebook",
            Self::Blogger => "blogger",
        }
    }
}

impl FromStr for BuiltinChannel {
    type Err = ContentFlowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ContentFlowError::UnknownChannel(s.to_string()))
    }
}

/// Resolves channel names to publishers and publishes to many at once.
pub struct PublisherManager {
    config: PublishingConfig,
    logs: Arc<dyn PublishLogStore>,
    http: reqwest::Client,
    resolved: RwLock<HashMap<String, Arc<dyn Publisher>>>,
    custom: RwLock<HashMap<String, PublisherFactory>>,
}

impl fmt::Debug for PublisherManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherManager")
            .field("default", &self.config.default)
            .field("channels", &self.config.channels)
            .field("custom", &self.custom.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl PublisherManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(config: PublishingConfig, logs: Arc<dyn PublishLogStore>) -> Self {
        Self {
            config,
            logs,
            http: reqwest::Client::new(),
            resolved: RwLock::new(HashMap::new()),
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Uses a shared HTTP client for built-in drivers.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Returns the default channel name.
    #[must_use]
    pub fn default_channel(&self) -> &str {
        &self.config.default
    }

    /// Returns the channels used when none are requested.
    #[must_use]
    pub fn active_channels(&self) -> &[String] {
        &self.config.channels
    }

    /// Registers a custom channel, replacing any cached instance.
    pub fn extend<F>(&self, name: impl Into<String>, factory: F) -> &Self
    where
        F: Fn(&ChannelSettings) -> Result<Arc<dyn Publisher>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.resolved.write().remove(&name);
        self.custom.write().insert(name, Arc::new(factory));
        self
    }

    /// Lists every resolvable channel name.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = BuiltinChannel::ALL
            .iter()
            .map(|c| c.as_str().to_string())
            .chain(self.custom.read().keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolves a channel name, defaulting to the configured default.
    pub fn driver(&self, name: Option<&str>) -> Result<Arc<dyn Publisher>> {
        let name = name.unwrap_or(&self.config.default);

        if let Some(cached) = self.resolved.read().get(name) {
            return Ok(Arc::clone(cached));
        }

        let publisher = self.create(name)?;
        self.resolved
            .write()
            .insert(name.to_string(), Arc::clone(&publisher));
        Ok(publisher)
    }

    fn create(&self, name: &str) -> Result<Arc<dyn Publisher>> {
        let settings = self.config.settings_for(name);

        let factory = self.custom.read().get(name).cloned();
        if let Some(factory) = factory {
            debug!(channel = %name, "Creating custom publisher");
            return factory(&settings);
        }

        let builtin: BuiltinChannel = settings
            .driver
            .as_deref()
            .unwrap_or(name)
            .parse()
            .map_err(|_| ContentFlowError::UnknownChannel(name.to_string()))?;

        let http = self.http.clone();
        let publisher: Arc<dyn Publisher> = match builtin {
            BuiltinChannel::Log => Arc::new(LogPublisher::new(name)),
            BuiltinChannel::Telegram => {
                Arc::new(TelegramPublisher::from_settings(name, &settings, http)?)
            }
            BuiltinChannel::WordPress => {
                Arc::new(WordPressPublisher::from_settings(name, &settings, http)?)
            }
            BuiltinChannel::Facebook => {
                Arc::new(FacebookPublisher::from_settings(name, &settings, http)?)
            }
            BuiltinChannel::Blogger => {
                Arc::new(BloggerPublisher::from_settings(name, &settings, http)?)
            }
        };
        Ok(publisher)
    }

    /// Publishes an article to each channel (or the active channels).
    ///
    /// Channels that do not support the article, or that already hold a
    /// success log for it, are skipped and get no entry in the result. Every
    /// attempt is logged. A failing channel never stops the others.
    pub async fn publish_to_channels(
        &self,
        article: &Article,
        channels: Option<&[String]>,
    ) -> BTreeMap<String, PublishResult> {
        let channels = channels.unwrap_or(&self.config.channels);
        let mut results = BTreeMap::new();

        for channel in channels {
            let Some(result) = self.publish_one(article, channel).await else {
                continue;
            };

            if result.success {
                info!(
                    article_id = article.id,
                    channel = %channel,
                    external_id = ?result.external_id,
                    "Published article"
                );
            } else {
                error!(
                    article_id = article.id,
                    channel = %channel,
                    error = ?result.error,
                    "Publishing failed"
                );
            }

            if let Err(e) = self
                .logs
                .append(NewPublishLog::from_result(article.id, &result))
                .await
            {
                error!(article_id = article.id, channel = %channel, error = %e, "Failed to record publish log");
            }

            results.insert(channel.clone(), result);
        }

        results
    }

    async fn publish_one(&self, article: &Article, channel: &str) -> Option<PublishResult> {
        let publisher = match self.driver(Some(channel)) {
            Ok(publisher) => publisher,
            Err(e) => return Some(PublishResult::failure(channel, e.to_string())),
        };

        if !publisher.supports(article) {
            debug!(article_id = article.id, channel = %channel, "Channel does not support article, skipping");
            return None;
        }

        match self.logs.was_published_to(article.id, channel).await {
            Ok(true) => {
                info!(article_id = article.id, channel = %channel, "Already published, skipping");
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(article_id = article.id, channel = %channel, error = %e, "Could not read publish log");
                return Some(PublishResult::failure(
                    channel,
                    format!("could not verify previous publications: {e}"),
                ));
            }
        }

        let mut result = match publisher.publish(article).await {
            Ok(result) => result,
            Err(e) => PublishResult::failure(channel, e.to_string()),
        };
        channel.clone_into(&mut result.channel);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPublishLogStore;
    use crate::testing::{sample_article, MockPublisher};

    fn manager(channels: &[&str]) -> (PublisherManager, Arc<InMemoryPublishLogStore>) {
        let logs = Arc::new(InMemoryPublishLogStore::new());
        let config = PublishingConfig {
            channels: channels.iter().map(|c| (*c).to_string()).collect(),
            ..PublishingConfig::default()
        };
        (PublisherManager::new(config, logs.clone()), logs)
    }

    #[tokio::test]
    async fn test_builtin_log_channel() {
        let (manager, logs) = manager(&["log"]);
        let article = sample_article(3);

        let results = manager.publish_to_channels(&article, None).await;
        assert!(results["log"].success);
        assert_eq!(results["log"].external_id.as_deref(), Some("log-3"));
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_second_publish_is_skipped() {
        let (manager, logs) = manager(&["log"]);
        let article = sample_article(1);

        let first = manager.publish_to_channels(&article, None).await;
        let second = manager.publish_to_channels(&article, None).await;

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_abort_fanout() {
        let (manager, logs) = manager(&["broken", "log", "missing"]);
        manager.extend("broken", |_| Ok(Arc::new(MockPublisher::failing("broken", "boom"))));

        let results = manager.publish_to_channels(&sample_article(1), None).await;

        assert!(!results["broken"].success);
        assert!(results["broken"].error.as_deref().unwrap().contains("boom"));
        assert!(results["log"].success);
        assert!(!results["missing"].success);
        assert_eq!(logs.len(), 3);
    }

    #[tokio::test]
    async fn test_unsupported_channel_is_skipped() {
        let (manager, logs) = manager(&["picky"]);
        manager.extend("picky", |_| Ok(Arc::new(MockPublisher::new("picky").unsupported())));

        let results = manager.publish_to_channels(&sample_article(1), None).await;
        assert!(results.is_empty());
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn test_failed_attempt_allows_retry() {
        let (manager, _logs) = manager(&["flaky"]);
        let flaky = Arc::new(MockPublisher::new("flaky").fail_times(1));
        let shared = Arc::clone(&flaky);
        manager.extend("flaky", move |_| Ok(shared.clone() as Arc<dyn Publisher>));
        let article = sample_article(1);

        assert!(!manager.publish_to_channels(&article, None).await["flaky"].success);
        assert!(manager.publish_to_channels(&article, None).await["flaky"].success);
        assert!(manager.publish_to_channels(&article, None).await.is_empty());
        assert_eq!(flaky.calls(), 2);
    }

    #[test]
    fn test_unknown_driver_is_precondition_error() {
        let (manager, _) = manager(&["log"]);
        let err = manager.driver(Some("myspace")).unwrap_err();
        assert!(matches!(err, ContentFlowError::UnknownChannel(_)));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_available_includes_custom() {
        let (manager, _) = manager(&["log"]);
        manager.extend("slack", |_| Ok(Arc::new(MockPublisher::new("slack"))));
        let available = manager.available();
        assert!(available.contains(&"slack".to_string()));
        assert!(available.contains(&"wordpress".to_string()));
    }

    #[test]
    fn test_channel_alias_uses_driver_setting() {
        let logs = Arc::new(InMemoryPublishLogStore::new());
        let mut config = PublishingConfig::default();
        config.drivers.insert(
            "audit".to_string(),
            ChannelSettings {
                driver: Some("log".to_string()),
                ..ChannelSettings::default()
            },
        );
        let manager = PublisherManager::new(config, logs);
        assert_eq!(manager.driver(Some("audit")).unwrap().channel(), "audit");
    }

    #[test]
    fn test_blogger_channel_needs_blog_settings() {
        let logs = Arc::new(InMemoryPublishLogStore::new());
        let mut config = PublishingConfig::default();
        config.drivers.insert(
            "blogger".to_string(),
            ChannelSettings::default()
                .with_option("blog_id", "42")
                .with_option("access_token", "token"),
        );
        let manager = PublisherManager::new(config, logs);
        assert_eq!(manager.driver(Some("blogger")).unwrap().channel(), "blogger");

        let (bare, _) = self::manager(&["blogger"]);
        let err = bare.driver(Some("blogger")).unwrap_err();
        assert!(matches!(err, ContentFlowError::Config(_)));
    }
}
