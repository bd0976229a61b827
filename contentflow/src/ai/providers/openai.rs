//! OpenAI and OpenAI-compatible (Ollama) chat and image APIs.

use super::{base_url, ensure_success, require_api_key};
use crate::ai::{AiProvider, ChatRequest, ChatResponse, ImageRequest, TokenUsage};
use crate::config::ProviderSettings;
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const OLLAMA_BASE: &str = "http://localhost:11434/v1";

/// Provider for the `/chat/completions` family of APIs.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    name: String,
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    images: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl OpenAiProvider {
    /// Creates the OpenAI provider; requires an API key.
    pub fn openai(settings: &ProviderSettings, http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            name: "openai".to_string(),
            http,
            api_key: Some(require_api_key("openai", settings)?),
            base_url: base_url(settings, OPENAI_BASE),
            timeout: settings.timeout(),
            images: true,
        })
    }

    /// Creates the Ollama provider; no key, no images.
    #[must_use]
    pub fn ollama(settings: &ProviderSettings, http: reqwest::Client) -> Self {
        Self {
            name: "ollama".to_string(),
            http,
            api_key: settings.api_key.clone(),
            base_url: base_url(settings, OLLAMA_BASE),
            timeout: settings.timeout(),
            images: false,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(format!("{}{path}", self.base_url))
            .timeout(self.timeout);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).timeout(self.timeout).send().await?;
        let response = ensure_success(&self.name, response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });
        if request.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let response = self.post("/chat/completions").json(&body).send().await?;
        let parsed: CompletionResponse = ensure_success(&self.name, response).await?.json().await?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ContentFlowError::provider(&self.name, "no choices in response"))?;
        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            provider: self.name.clone(),
            finish_reason: choice.finish_reason,
            usage,
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        if !self.images {
            return Err(ContentFlowError::provider(
                &self.name,
                "image generation is not supported",
            ));
        }

        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "n": 1,
            "size": request.size,
            "quality": request.quality,
            "response_format": "b64_json",
        });
        let response = self.post("/images/generations").json(&body).send().await?;
        let parsed: ImagesResponse = ensure_success(&self.name, response).await?.json().await?;

        let image = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ContentFlowError::provider(&self.name, "no image in response"))?;

        match (image.b64_json, image.url) {
            (Some(encoded), _) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ContentFlowError::provider(&self.name, format!("invalid base64 image: {e}"))),
            (None, Some(url)) => self.download(&url).await,
            (None, None) => Err(ContentFlowError::provider(&self.name, "image response had no data")),
        }
    }

    fn supports_image_generation(&self) -> bool {
        self.images
    }
}
