//! Google Gemini `generateContent` API.

use super::{base_url, ensure_success, require_api_key};
use crate::ai::{AiProvider, ChatRequest, ChatResponse, ChatRole, ImageRequest, TokenUsage};
use crate::config::ProviderSettings;
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini text and image provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GeminiProvider {
    /// Creates the provider; requires an API key.
    pub fn new(settings: &ProviderSettings, http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            http,
            api_key: require_api_key("gemini", settings)?,
            base_url: base_url(settings, GEMINI_BASE),
            timeout: settings.timeout(),
        })
    }

    fn body(request: &ChatRequest) -> serde_json::Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = if m.role == ChatRole::Assistant { "model" } else { "user" };
                serde_json::json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut generation = serde_json::json!({"maxOutputTokens": request.max_tokens});
        if request.json_mode {
            generation["responseMimeType"] = serde_json::json!("application/json");
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if !system.is_empty() {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": system.join("\n\n")}]});
        }
        body
    }

    async fn generate(&self, model: &str, body: &serde_json::Value) -> Result<GenerateResponse> {
        let response = self
            .http
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        Ok(ensure_success(self.name(), response).await?.json().await?)
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let parsed = self.generate(&request.model, &Self::body(request)).await?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ContentFlowError::provider(self.name(), "no candidates in response"))?;
        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            model: parsed.model_version.unwrap_or_else(|| request.model.clone()),
            provider: self.name().to_string(),
            finish_reason: candidate.finish_reason,
            usage: parsed
                .usage_metadata
                .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
                .unwrap_or_default(),
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]},
        });
        let parsed = self.generate(&request.model, &body).await?;

        let encoded = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
            .ok_or_else(|| ContentFlowError::provider(self.name(), "no image data in response"))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.data)
            .map_err(|e| ContentFlowError::provider(self.name(), format!("invalid base64 image: {e}")))
    }

    fn supports_image_generation(&self) -> bool {
        true
    }
}
