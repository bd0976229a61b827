//! Built-in provider implementations.
//!
//! Each one maps the common [`ChatRequest`](super::ChatRequest) onto a
//! vendor API and normalizes the answer into
//! [`ChatResponse`](super::ChatResponse).

mod claude;
mod gemini;
mod openai;
mod piapi;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use piapi::PiApiProvider;

use crate::config::ProviderSettings;
use crate::errors::{ContentFlowError, Result};

fn require_api_key(provider: &str, settings: &ProviderSettings) -> Result<String> {
    settings
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ContentFlowError::Config(format!("AI provider [{provider}] requires an api_key")))
}

fn base_url(settings: &ProviderSettings, default: &str) -> String {
    settings
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

async fn ensure_success(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ContentFlowError::provider(
        provider,
        format!("API error ({status}): {body}"),
    ))
}
