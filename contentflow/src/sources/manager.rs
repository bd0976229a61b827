//! Source resolution and auto-detection.

use super::drivers::{RssSource, TextSource, WebSource};
use super::{ContentSource, FetchedContent};
use crate::config::SourcesConfig;
use crate::errors::{ContentFlowError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a custom source from the sources configuration.
pub type SourceFactory = Arc<dyn Fn(&SourcesConfig) -> Result<Arc<dyn ContentSource>> + Send + Sync>;

/// Sources shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinSource {
    /// RSS and Atom feeds.
    Rss,
    /// HTML pages.
    Web,
    /// The identifier itself is the content.
    Text,
}

impl BuiltinSource {
    /// All built-in sources.
    pub const ALL: [Self; 3] = [Self::Rss, Self::Web, Self::Text];

    /// Returns the driver name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Web => "web",
            Self::Text => "text",
        }
    }
}

impl FromStr for BuiltinSource {
    type Err = ContentFlowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ContentFlowError::UnknownSourceDriver(s.to_string()))
    }
}

/// Resolves source drivers by name or by detection.
pub struct ContentSourceManager {
    config: SourcesConfig,
    http: reqwest::Client,
    resolved: RwLock<HashMap<String, Arc<dyn ContentSource>>>,
    custom: RwLock<Vec<(String, SourceFactory)>>,
}

impl fmt::Debug for ContentSourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSourceManager")
            .field("default", &self.config.default)
            .field("forced", &self.config.forced)
            .field(
                "custom",
                &self.custom.read().iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ContentSourceManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(config: SourcesConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            resolved: RwLock::new(HashMap::new()),
            custom: RwLock::new(Vec::new()),
        }
    }

    /// Uses a shared HTTP client for built-in drivers.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Returns the default driver name.
    #[must_use]
    pub fn default_driver(&self) -> &str {
        &self.config.default
    }

    /// Registers a custom driver, replacing any cached instance.
    ///
    /// Custom drivers are tried after `rss` and before `web` during
    /// detection, in registration order.
    pub fn extend<F>(&self, name: impl Into<String>, factory: F) -> &Self
    where
        F: Fn(&SourcesConfig) -> Result<Arc<dyn ContentSource>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.resolved.write().remove(&name);
        let mut custom = self.custom.write();
        let factory: SourceFactory = Arc::new(factory);
        match custom.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = factory,
            None => custom.push((name, factory)),
        }
        self
    }

    /// Lists every resolvable driver name.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = BuiltinSource::ALL
            .iter()
            .map(|d| d.as_str().to_string())
            .chain(self.custom.read().iter().map(|(n, _)| n.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Driver names in detection order.
    #[must_use]
    pub fn detection_order(&self) -> Vec<String> {
        let mut order = vec![BuiltinSource::Rss.as_str().to_string()];
        order.extend(
            self.custom
                .read()
                .iter()
                .map(|(n, _)| n.clone())
                .filter(|n| BuiltinSource::from_str(n).is_err()),
        );
        order.push(BuiltinSource::Web.as_str().to_string());
        order.push(BuiltinSource::Text.as_str().to_string());
        order
    }

    /// Resolves a driver, defaulting to the configured default.
    pub fn driver(&self, name: Option<&str>) -> Result<Arc<dyn ContentSource>> {
        let name = name.unwrap_or(&self.config.default);

        if let Some(cached) = self.resolved.read().get(name) {
            return Ok(Arc::clone(cached));
        }

        let source = self.create(name)?;
        self.resolved
            .write()
            .insert(name.to_string(), Arc::clone(&source));
        Ok(source)
    }

    fn create(&self, name: &str) -> Result<Arc<dyn ContentSource>> {
        let factory = self
            .custom
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| Arc::clone(f));
        if let Some(factory) = factory {
            debug!(driver = %name, "Creating custom content source");
            return factory(&self.config);
        }

        let http = self.http.clone();
        let source: Arc<dyn ContentSource> = match name.parse()? {
            BuiltinSource::Rss => Arc::new(RssSource::new(&self.config.rss, http)),
            BuiltinSource::Web => Arc::new(WebSource::new(&self.config.web, http)),
            BuiltinSource::Text => Arc::new(TextSource),
        };
        Ok(source)
    }

    /// Picks the first driver that supports the identifier, else the default.
    pub fn detect(&self, identifier: &str) -> Result<Arc<dyn ContentSource>> {
        for name in self.detection_order() {
            let source = self.driver(Some(&name))?;
            if source.supports(identifier) {
                debug!(driver = %name, "Detected content source");
                return Ok(source);
            }
        }
        self.driver(None)
    }

    /// Fetches an identifier with a forced driver, the configured forced
    /// driver, or a detected one.
    pub async fn fetch(&self, identifier: &str, forced: Option<&str>) -> Result<FetchedContent> {
        let source = match forced.or(self.config.forced.as_deref()) {
            Some(name) => self.driver(Some(name))?,
            None => self.detect(identifier)?,
        };

        let mut fetched = source.fetch(identifier).await?;
        fetched
            .meta
            .entry("source_driver")
            .or_insert_with(|| Value::String(source.name().to_string()));

        info!(
            driver = %source.name(),
            length = fetched.content.chars().count(),
            "Fetched content"
        );
        Ok(fetched)
    }
}
