//! Anthropic messages API.

use super::{base_url, ensure_success, require_api_key};
use crate::ai::{AiProvider, ChatRequest, ChatResponse, ChatRole, TokenUsage};
use crate::config::ProviderSettings;
use crate::errors::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const CLAUDE_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const JSON_INSTRUCTION: &str =
    "Respond with a single valid JSON object only, without Markdown or commentary.";

/// Claude text provider. Claude cannot generate images.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl ClaudeProvider {
    /// Creates the provider; requires an API key.
    pub fn new(settings: &ProviderSettings, http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            http,
            api_key: require_api_key("claude", settings)?,
            base_url: base_url(settings, CLAUDE_BASE),
            timeout: settings.timeout(),
        })
    }

    fn body(request: &ChatRequest) -> serde_json::Value {
        let mut system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();
        if request.json_mode {
            system.push(JSON_INSTRUCTION);
        }

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }
        body
    }
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(self.timeout)
            .json(&Self::body(request))
            .send()
            .await?;
        let parsed: MessagesResponse = ensure_success(self.name(), response).await?.json().await?;

        let content = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatResponse {
            content,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            provider: self.name().to_string(),
            finish_reason: parsed.stop_reason,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
                .unwrap_or_default(),
        })
    }
}
