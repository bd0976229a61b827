//! Facebook page feed channel.

use super::{error_body, required_option};
use crate::config::ChannelSettings;
use crate::errors::{ContentFlowError, Result};
use crate::publishing::{PublishResult, Publisher};
use crate::store::Article;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

/// Posts a link and summary to a Facebook page.
#[derive(Debug, Clone)]
pub struct FacebookPublisher {
    channel: String,
    http: reqwest::Client,
    graph_base: String,
    page_id: String,
    access_token: String,
    site_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

impl FacebookPublisher {
    /// Builds the driver from `page_id`, `access_token` and optional
    /// `site_url` / `graph_base` options.
    pub fn from_settings(
        channel: &str,
        settings: &ChannelSettings,
        http: reqwest::Client,
    ) -> Result<Self> {
        Ok(Self {
            channel: channel.to_string(),
            http,
            graph_base: settings
                .option_str("graph_base")
                .unwrap_or(DEFAULT_GRAPH_BASE)
                .trim_end_matches('/')
                .to_string(),
            page_id: required_option(channel, settings, "page_id")?,
            access_token: required_option(channel, settings, "access_token")?,
            site_url: settings
                .option_str("site_url")
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn supports(&self, article: &Article) -> bool {
        article.is_published()
    }

    async fn publish(&self, article: &Article) -> Result<PublishResult> {
        let mut message = article.title.clone();
        if let Some(description) = article.description.as_deref().filter(|d| !d.is_empty()) {
            message.push_str("\n\n");
            message.push_str(description);
        }

        let mut body = serde_json::json!({
            "message": message,
            "access_token": self.access_token,
        });
        if let Some(site) = &self.site_url {
            body["link"] = serde_json::json!(format!("{site}/{}", article.slug));
        }

        let response = self
            .http
            .post(format!("{}/{}/feed", self.graph_base, self.page_id))
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ContentFlowError::publish(&self.channel, error_body(response).await));
        }

        let post: CreatedPost = response.json().await?;
        Ok(PublishResult::success(&self.channel)
            .with_external_url(format!("https://www.facebook.com/{}", post.id))
            .with_external_id(post.id))
    }
}
