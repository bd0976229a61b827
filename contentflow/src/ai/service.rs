//! Chat with automatic model fallback.

use super::{AiProviderManager, ChatMessage, ChatRequest, ChatResponse};
use crate::errors::{ContentFlowError, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

#[allow(clippy::expect_used)]
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*\n(.+?)\n\s*```").expect("code fence pattern is valid")
});

/// Per-call overrides for [`AiService::chat`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatOptions {
    /// Model to try first instead of the configured content model.
    pub model: Option<String>,
    /// Token budget instead of the configured one.
    pub max_tokens: Option<u32>,
    /// Request a JSON object.
    pub json_mode: bool,
}

impl ChatOptions {
    /// Options requesting JSON output.
    #[must_use]
    pub fn json() -> Self {
        Self {
            json_mode: true,
            ..Self::default()
        }
    }

    /// Sets the primary model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// High-level chat access for stages.
#[derive(Debug, Clone)]
pub struct AiService {
    manager: Arc<AiProviderManager>,
}

impl AiService {
    /// Creates a service over a provider manager.
    #[must_use]
    pub const fn new(manager: Arc<AiProviderManager>) -> Self {
        Self { manager }
    }

    /// Returns the provider manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<AiProviderManager> {
        &self.manager
    }

    /// Sends a chat request through the default provider.
    ///
    /// If the primary model fails, the request is retried once with the
    /// fallback model on the same provider. When both models are the same
    /// the original error is returned without a retry.
    pub async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<ChatResponse> {
        let config = self.manager.config();
        let provider = self.manager.provider(None)?;

        let request = ChatRequest {
            messages,
            model: options.model.unwrap_or_else(|| config.content_model.clone()),
            max_tokens: options.max_tokens.unwrap_or(config.max_tokens),
            json_mode: options.json_mode,
        };

        debug!(provider = %provider.name(), model = %request.model, "Sending chat request");

        let response = match provider.chat(&request).await {
            Ok(response) => response,
            Err(e) if e.is_precondition() || config.fallback_model == request.model => return Err(e),
            Err(e) => {
                warn!(
                    provider = %provider.name(),
                    model = %request.model,
                    fallback = %config.fallback_model,
                    error = %e,
                    "Primary model failed, retrying with fallback"
                );
                provider
                    .chat(&request.with_model(config.fallback_model.clone()))
                    .await?
            }
        };

        if response.is_truncated() {
            warn!(
                provider = %response.provider,
                model = %response.model,
                completion_tokens = response.usage.completion_tokens,
                "AI response was truncated by the token limit"
            );
        }

        Ok(response)
    }

    /// Runs a system + user prompt and returns the text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .chat(
                vec![ChatMessage::system(system), ChatMessage::user(user)],
                ChatOptions::default(),
            )
            .await?;
        Ok(response.content)
    }

    /// Runs a system + user prompt in JSON mode and parses the answer.
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        let response = self
            .chat(
                vec![ChatMessage::system(system), ChatMessage::user(user)],
                ChatOptions::json(),
            )
            .await?;
        extract_json(&response.content).ok_or_else(|| {
            ContentFlowError::provider(
                response.provider,
                format!(
                    "response is not valid JSON: {}",
                    crate::utils::truncate_chars(&response.content, 200)
                ),
            )
        })
    }
}

/// Parses JSON from model output, tolerating Markdown code fences and
/// surrounding prose.
#[must_use]
pub fn extract_json(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(inner) = CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str(inner.as_str().trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end)
        .then(|| serde_json::from_str(&trimmed[start..=end]).ok())
        .flatten()
}
