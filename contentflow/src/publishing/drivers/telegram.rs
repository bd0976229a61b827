//! Telegram Bot API channel.

use super::{error_body, required_option};
use crate::config::ChannelSettings;
use crate::errors::{ContentFlowError, Result};
use crate::publishing::{PublishResult, Publisher};
use crate::store::Article;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends a message to a Telegram chat.
#[derive(Debug, Clone)]
pub struct TelegramPublisher {
    channel: String,
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    site_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramPublisher {
    /// Builds the driver from `bot_token`, `chat_id`, and optional
    /// `site_url` / `api_base` options.
    pub fn from_settings(
        channel: &str,
        settings: &ChannelSettings,
        http: reqwest::Client,
    ) -> Result<Self> {
        Ok(Self {
            channel: channel.to_string(),
            http,
            api_base: settings
                .option_str("api_base")
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            bot_token: required_option(channel, settings, "bot_token")?,
            chat_id: required_option(channel, settings, "chat_id")?,
            site_url: settings
                .option_str("site_url")
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn message_text(&self, article: &Article) -> String {
        let mut text = format!("<b>{}</b>", escape_html(&article.title));
        if let Some(description) = article.description.as_deref().filter(|d| !d.is_empty()) {
            text.push_str("\n\n");
            text.push_str(&escape_html(description));
        }
        if let Some(site) = &self.site_url {
            text.push_str(&format!("\n\n{site}/{}", article.slug));
        }
        text
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl Publisher for TelegramPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn supports(&self, article: &Article) -> bool {
        article.is_published()
    }

    async fn publish(&self, article: &Article) -> Result<PublishResult> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": self.message_text(article),
                "parse_mode": "HTML",
            }))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ContentFlowError::publish(&self.channel, error_body(response).await));
        }

        let body: SendMessageResponse = response.json().await?;
        match (body.ok, body.result) {
            (true, Some(sent)) => Ok(PublishResult::success(&self.channel)
                .with_external_id(sent.message_id.to_string())
                .with_metadata("chat_id", self.chat_id.clone())),
            _ => Err(ContentFlowError::publish(
                &self.channel,
                body.description
                    .unwrap_or_else(|| "Telegram rejected the message".to_string()),
            )),
        }
    }
}
