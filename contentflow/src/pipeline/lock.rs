//! Per-input mutual exclusion for runs.

use crate::errors::{ContentFlowError, Result};
use crate::utils::{identity_hash, Timestamp};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// In-flight run keys shared by every pipeline cloned from the same set.
///
/// A key is held from run creation until the run returns, so the same
/// logical input can never be processed by two runs at once.
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    held: Arc<DashMap<String, Timestamp>>,
}

impl RunLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the lock key for an input.
    ///
    /// Staged inputs lock on their id, URL inputs on a hash of the URL.
    /// Free text has no identity and is never locked.
    #[must_use]
    pub fn key_for(staged_content_id: Option<i64>, source_url: Option<&str>) -> Option<String> {
        match (staged_content_id, source_url) {
            (Some(id), _) => Some(format!("pipeline-{id}")),
            (None, Some(url)) => Some(format!("pipeline-url-{}", identity_hash(url))),
            (None, None) => None,
        }
    }

    /// Lock key for publishing an existing article.
    #[must_use]
    pub fn publish_key(article_id: i64) -> String {
        format!("publish-article-{article_id}")
    }

    /// Takes `key`, failing with `AlreadyRunning` if it is held.
    pub fn acquire(&self, key: &str) -> Result<RunLockGuard> {
        match self.held.entry(key.to_string()) {
            Entry::Occupied(_) => Err(ContentFlowError::AlreadyRunning {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                debug!(key = %key, "Run lock acquired");
                Ok(RunLockGuard {
                    key: key.to_string(),
                    held: Arc::clone(&self.held),
                })
            }
        }
    }

    /// Returns true if `key` is held.
    #[must_use]
    pub fn is_locked(&self, key: &str) -> bool {
        self.held.contains_key(key)
    }

    /// Number of held keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct RunLockGuard {
    key: String,
    held: Arc<DashMap<String, Timestamp>>,
}

impl RunLockGuard {
    /// The held key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.key);
        debug!(key = %self.key, "Run lock released");
    }
}
