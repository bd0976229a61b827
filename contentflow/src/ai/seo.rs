//! SEO metadata suggestions.

use super::{AiService, ChatMessage, ChatOptions};
use crate::errors::{ContentFlowError, Result};
use crate::utils::{slugify, truncate_chars};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const SYSTEM_PROMPT: &str = "You are an SEO specialist. Return only the requested JSON object.";
const MAX_TOKENS: u32 = 300;
const PREVIEW_CHARS: usize = 500;

/// Suggested metadata, clipped to the usual search-result limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoSuggestion {
    /// Headline, at most 70 characters.
    pub title: String,
    /// `<title>` text, at most 60 characters.
    pub meta_title: String,
    /// Meta description, at most 160 characters.
    pub meta_description: String,
    /// URL slug.
    pub slug: String,
    /// Short summary, at most 180 characters.
    pub description: String,
}

impl SeoSuggestion {
    fn from_json(raw: &serde_json::Value) -> Self {
        let field = |key: &str, max: usize| {
            let value = raw.get(key).and_then(serde_json::Value::as_str).unwrap_or_default();
            truncate_chars(value.trim(), max).trim_end().to_string()
        };

        let title = field("title", 70);
        let slug = match slugify(&field("slug", 200)) {
            slug if slug.is_empty() => slugify(&title),
            slug => slug,
        };

        Self {
            meta_title: field("meta_title", 60),
            meta_description: field("meta_description", 160),
            description: field("description", 180),
            slug,
            title,
        }
    }
}

/// Asks the configured AI provider for SEO metadata.
#[derive(Debug, Clone)]
pub struct SeoSuggester {
    ai: AiService,
}

impl SeoSuggester {
    /// Creates a suggester.
    #[must_use]
    pub const fn new(ai: AiService) -> Self {
        Self { ai }
    }

    fn prompt(title: &str, content: &str) -> String {
        let mut prompt = format!("Generate SEO-optimized metadata for an article.\n\nTitle: {title}\n");
        let content = content.trim();
        if !content.is_empty() {
            let preview = truncate_chars(content, PREVIEW_CHARS);
            let ellipsis = if preview.len() < content.len() { "..." } else { "" };
            let _ = writeln!(prompt, "Content preview: {preview}{ellipsis}");
        }
        prompt.push_str(
            "\nReturn a JSON object with these exact keys:\n\
             - \"title\": optimized title (max 70 chars)\n\
             - \"meta_title\": SEO meta title (max 60 chars)\n\
             - \"meta_description\": compelling meta description (max 160 chars)\n\
             - \"slug\": URL-friendly slug\n\
             - \"description\": short article description (max 180 chars)\n",
        );
        prompt
    }

    /// Suggests metadata for an article.
    ///
    /// Missing keys come back empty; an empty slug is derived from the
    /// suggested title.
    pub async fn suggest(&self, title: &str, content: &str) -> Result<SeoSuggestion> {
        let options = ChatOptions {
            max_tokens: Some(MAX_TOKENS),
            ..ChatOptions::json()
        };
        let response = self
            .ai
            .chat(
                vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(Self::prompt(title, content))],
                options,
            )
            .await?;

        let raw = super::extract_json(&response.content).ok_or_else(|| {
            ContentFlowError::provider(&response.provider, "SEO response is not valid JSON")
        })?;
        Ok(SeoSuggestion::from_json(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiProvider, AiProviderManager};
    use crate::config::AiConfig;
    use crate::testing::MockAiProvider;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn suggester(provider: Arc<MockAiProvider>) -> SeoSuggester {
        let manager = AiProviderManager::new(AiConfig {
            provider: "mock".to_string(),
            ..AiConfig::default()
        });
        manager.extend("mock", move |_| Ok(provider.clone() as Arc<dyn AiProvider>));
        SeoSuggester::new(AiService::new(Arc::new(manager)))
    }

    #[tokio::test]
    async fn test_suggestion_is_clipped_and_slugged() {
        let provider = Arc::new(MockAiProvider::new("mock").with_response(
            serde_json::json!({
                "title": "T".repeat(90),
                "meta_title": "Rust pipelines in production",
                "meta_description": "d".repeat(200),
                "slug": "Rust Pipelines: In Production!",
                "description": "Short summary."
            })
            .to_string(),
        ));
        let seo = suggester(provider.clone());

        let suggestion = seo.suggest("Rust pipelines", "<p>Body</p>").await.unwrap();

        assert_eq!(suggestion.title.chars().count(), 70);
        assert_eq!(suggestion.meta_title, "Rust pipelines in production");
        assert_eq!(suggestion.meta_description.chars().count(), 160);
        assert_eq!(suggestion.slug, "rust-pipelines-in-production");
        assert_eq!(suggestion.description, "Short summary.");

        let request = &provider.requests()[0];
        assert!(request.json_mode);
        assert_eq!(request.max_tokens, MAX_TOKENS);
        assert!(request.messages[1].content.contains("Content preview: <p>Body</p>"));
    }

    #[tokio::test]
    async fn test_missing_keys_come_back_empty() {
        let provider = Arc::new(MockAiProvider::new("mock").with_response(r#"{"title": "Only a title"}"#));

        let suggestion = suggester(provider.clone()).suggest("Only a title", "").await.unwrap();

        assert_eq!(suggestion.meta_description, "");
        assert_eq!(suggestion.slug, "only-a-title");
        assert!(!provider.requests()[0].messages[1].content.contains("Content preview"));
    }

    #[tokio::test]
    async fn test_prose_answer_is_an_error() {
        let provider = Arc::new(MockAiProvider::new("mock").with_response("Here are some ideas"));
        let err = suggester(provider).suggest("Title", "").await.unwrap_err();
        assert!(matches!(err, ContentFlowError::Provider { .. }));
    }

    #[test]
    fn test_long_content_preview_is_shortened() {
        let prompt = SeoSuggester::prompt("T", &"word ".repeat(300));
        let preview = prompt
            .lines()
            .find(|line| line.starts_with("Content preview: "))
            .unwrap();
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= "Content preview: ".len() + PREVIEW_CHARS + 3);
    }
}
