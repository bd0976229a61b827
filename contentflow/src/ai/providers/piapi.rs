//! PiAPI Flux image generation (image-only).

use super::{base_url, ensure_success, require_api_key};
use crate::ai::{AiProvider, ChatRequest, ChatResponse, ImageRequest};
use crate::config::{parse_image_size, ProviderSettings};
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const PIAPI_BASE: &str = "https://api.piapi.ai";
const DEFAULT_MODEL: &str = "flux-1";

/// Submits a txt2img task and polls it until the image is ready.
#[derive(Debug, Clone)]
pub struct PiApiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_attempts: u32,
    interval: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<TaskData>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskData {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<TaskOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskOutput {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    images: Vec<OutputImage>,
}

#[derive(Debug, Deserialize)]
struct OutputImage {
    url: String,
}

impl TaskOutput {
    fn url(self) -> Option<String> {
        self.image_url
            .or_else(|| self.images.into_iter().next().map(|image| image.url))
    }
}

impl PiApiProvider {
    /// Creates the provider; requires an API key.
    pub fn new(settings: &ProviderSettings, http: reqwest::Client) -> Result<Self> {
        let (max_attempts, interval) = settings.polling();
        Ok(Self {
            http,
            api_key: require_api_key("piapi", settings)?,
            base_url: base_url(settings, PIAPI_BASE),
            timeout: settings.timeout(),
            max_attempts,
            interval,
        })
    }

    async fn submit(&self, request: &ImageRequest) -> Result<String> {
        let (width, height) = parse_image_size(&request.size).unwrap_or((1024, 1024));
        let model = if request.model.is_empty() {
            DEFAULT_MODEL
        } else {
            request.model.as_str()
        };
        let body = serde_json::json!({
            "model": model,
            "task_type": "txt2img",
            "input": {
                "prompt": request.prompt,
                "width": width,
                "height": height,
            },
        });

        let response = self
            .http
            .post(format!("{}/api/flux/v1/run", self.base_url))
            .header("x-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let parsed: Envelope = ensure_success(self.name(), response).await?.json().await?;

        parsed
            .data
            .and_then(|d| d.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ContentFlowError::provider(self.name(), "response had no task_id"))
    }

    async fn poll(&self, task_id: &str) -> Result<String> {
        let url = format!("{}/api/flux/v1/task/{task_id}", self.base_url);

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;

            let response = match self
                .http
                .get(&url)
                .header("x-api-key", &self.api_key)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    debug!(task_id, attempt, status = %response.status(), "Task status check failed");
                    continue;
                }
                Err(e) => {
                    debug!(task_id, attempt, error = %e, "Task status check failed");
                    continue;
                }
            };

            let data = response.json::<Envelope>().await?.data.unwrap_or_default();
            match data.status.as_deref() {
                Some("completed") => {
                    return data
                        .output
                        .and_then(TaskOutput::url)
                        .ok_or_else(|| ContentFlowError::provider(self.name(), "task completed without an image URL"));
                }
                Some("failed") => {
                    let reason = match data.error {
                        Some(serde_json::Value::String(message)) => message,
                        Some(other) => other.to_string(),
                        None => "Unknown error".to_string(),
                    };
                    return Err(ContentFlowError::provider(
                        self.name(),
                        format!("image generation failed: {reason}"),
                    ));
                }
                _ => {}
            }
        }

        Err(ContentFlowError::provider(
            self.name(),
            format!("image generation timed out after {} status checks", self.max_attempts),
        ))
    }
}

#[async_trait]
impl AiProvider for PiApiProvider {
    fn name(&self) -> &str {
        "piapi"
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
        Err(ContentFlowError::Config(
            "AI provider [piapi] is image-only; configure another provider for text".to_string(),
        ))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let task_id = self.submit(request).await?;
        debug!(task_id = %task_id, "Image task submitted");
        let url = self.poll(&task_id).await?;

        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        let response = ensure_success(self.name(), response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn supports_image_generation(&self) -> bool {
        true
    }
}
