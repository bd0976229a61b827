//! AI providers: chat completion and image generation.
//!
//! Every provider normalizes its native response into [`ChatResponse`] so
//! callers never depend on a vendor's wire shape. [`AiProviderManager`]
//! resolves provider names, [`AiService`] adds primary/fallback model
//! retries and JSON extraction, [`ImageGenerator`] stores generated
//! images on disk and [`SeoSuggester`] drafts search metadata.

mod images;
mod manager;
pub mod providers;
mod seo;
mod service;

pub use images::{ImageGeneration, ImageGenerator};
pub use manager::{AiProviderManager, BuiltinProvider, ProviderFactory};
pub use seo::{SeoSuggester, SeoSuggestion};
pub use service::{extract_json, AiService, ChatOptions};

use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions.
    System,
    /// Caller input.
    User,
    /// Model output.
    Assistant,
}

impl ChatRole {
    /// Returns the OpenAI-style role name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote it.
    pub role: ChatRole,
    /// Text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A provider-agnostic chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Conversation.
    pub messages: Vec<ChatMessage>,
    /// Model name.
    pub model: String,
    /// Completion token budget.
    pub max_tokens: u32,
    /// Ask the provider for a JSON object.
    pub json_mode: bool,
}

impl ChatRequest {
    /// Returns a copy targeting another model.
    #[must_use]
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

/// Token accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub prompt_tokens: u32,
    /// Completion tokens.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Creates a usage record.
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Returns the total token count.
    #[must_use]
    pub const fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// The common response shape for every provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Message content.
    pub content: String,
    /// Model that answered.
    pub model: String,
    /// Provider that answered.
    pub provider: String,
    /// Why generation stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Token accounting.
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// Returns true if the output was cut off by the token budget.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(
            self.finish_reason.as_deref(),
            Some("length" | "max_tokens" | "MAX_TOKENS")
        )
    }
}

/// An image generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Prompt.
    pub prompt: String,
    /// Model name.
    pub model: String,
    /// `WIDTHxHEIGHT`.
    pub size: String,
    /// Quality hint.
    pub quality: String,
}

/// A text (and optionally image) generation backend.
#[async_trait]
pub trait AiProvider: Send + Sync + fmt::Debug {
    /// Provider name.
    fn name(&self) -> &str;

    /// Runs a chat completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Generates an image and returns its encoded bytes.
    async fn generate_image(&self, _request: &ImageRequest) -> Result<Vec<u8>> {
        Err(ContentFlowError::provider(
            self.name(),
            "image generation is not supported",
        ))
    }

    /// Returns true if [`AiProvider::generate_image`] is implemented.
    fn supports_image_generation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total() {
        assert_eq!(TokenUsage::new(10, 5).total_tokens(), 15);
    }

    #[test]
    fn test_truncation_reasons() {
        let mut response = ChatResponse {
            content: String::new(),
            model: "m".to_string(),
            provider: "p".to_string(),
            finish_reason: Some("stop".to_string()),
            usage: TokenUsage::default(),
        };
        assert!(!response.is_truncated());
        response.finish_reason = Some("length".to_string());
        assert!(response.is_truncated());
        response.finish_reason = Some("MAX_TOKENS".to_string());
        assert!(response.is_truncated());
    }

    #[test]
    fn test_with_model_keeps_messages() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            model: "a".to_string(),
            max_tokens: 10,
            json_mode: true,
        };
        let other = request.with_model("b");
        assert_eq!(other.model, "b");
        assert_eq!(other.messages, request.messages);
        assert!(other.json_mode);
    }
}
