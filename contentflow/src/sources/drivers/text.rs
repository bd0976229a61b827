//! Raw text passed straight through.

use crate::errors::Result;
use crate::sources::{ContentSource, FetchedContent};
use crate::utils::is_url;
use async_trait::async_trait;
use tracing::info;

/// Treats the identifier itself as the content. Matches anything that is
/// not a URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSource;

#[async_trait]
impl ContentSource for TextSource {
    fn name(&self) -> &str {
        "text"
    }

    fn supports(&self, identifier: &str) -> bool {
        !identifier.trim().is_empty() && !is_url(identifier)
    }

    async fn fetch(&self, identifier: &str) -> Result<FetchedContent> {
        info!(length = identifier.chars().count(), "Accepted raw text content");
        Ok(FetchedContent::new(identifier, None).with_meta("source_driver", self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_passthrough() {
        let fetched = TextSource.fetch("Plain words").await.unwrap();
        assert_eq!(fetched.content, "Plain words");
        assert_eq!(fetched.title, None);
        assert_eq!(fetched.driver(), Some("text"));
    }

    #[test]
    fn test_supports_non_urls_only() {
        assert!(TextSource.supports("# Heading\n\nbody"));
        assert!(!TextSource.supports("https://example.com"));
        assert!(!TextSource.supports(""));
    }
}
