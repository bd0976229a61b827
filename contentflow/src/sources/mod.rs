//! Content sources: turning a locator into raw content.
//!
//! A [`ContentSource`] declares which identifiers it understands and
//! fetches them. [`ContentSourceManager`] picks a source either by name or
//! by trying each in order of specificity.

pub mod drivers;
mod manager;

pub use manager::{BuiltinSource, ContentSourceManager, SourceFactory};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Content returned by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedContent {
    /// Body, possibly containing markup.
    pub content: String,
    /// Title, if the source has one.
    pub title: Option<String>,
    /// Source-specific metadata.
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl FetchedContent {
    /// Creates fetched content without metadata.
    #[must_use]
    pub fn new(content: impl Into<String>, title: Option<String>) -> Self {
        Self {
            content: content.into(),
            title,
            meta: Map::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Returns the driver recorded in the metadata.
    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.meta.get("source_driver").and_then(Value::as_str)
    }
}

/// A place content can be fetched from.
#[async_trait]
pub trait ContentSource: Send + Sync + fmt::Debug {
    /// Driver name.
    fn name(&self) -> &str;

    /// Returns true if this source can fetch the identifier.
    fn supports(&self, identifier: &str) -> bool;

    /// Fetches the identifier.
    async fn fetch(&self, identifier: &str) -> Result<FetchedContent>;
}
