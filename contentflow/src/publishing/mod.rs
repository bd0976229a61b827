//! Multi-channel publishing.
//!
//! A [`Publisher`] pushes an article to one external channel. The
//! [`PublisherManager`] resolves channel names to publishers and fans an
//! article out to every active channel, isolating per-channel failures.

pub mod drivers;
mod manager;

pub use manager::{BuiltinChannel, PublisherFactory, PublisherManager};

use crate::errors::Result;
use crate::store::Article;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Outcome of publishing one article to one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Whether the channel accepted the article.
    pub success: bool,
    /// Channel name.
    pub channel: String,
    /// Id assigned by the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Link on the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Channel-specific data.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl PublishResult {
    /// Creates a success outcome.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            external_id: None,
            external_url: None,
            error: None,
            metadata: Map::new(),
        }
    }

    /// Creates a failure outcome.
    #[must_use]
    pub fn failure(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(channel)
        }
    }

    /// Sets the external id.
    #[must_use]
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Sets the external url.
    #[must_use]
    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A channel an article can be published to.
#[async_trait]
pub trait Publisher: Send + Sync + fmt::Debug {
    /// Channel name.
    fn channel(&self) -> &str;

    /// Returns false if this channel cannot take the article.
    fn supports(&self, article: &Article) -> bool;

    /// Publishes the article.
    async fn publish(&self, article: &Article) -> Result<PublishResult>;
}
