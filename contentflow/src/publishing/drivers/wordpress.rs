//! WordPress REST API channel.

use super::{error_body, required_option};
use crate::config::ChannelSettings;
use crate::errors::{ContentFlowError, Result};
use crate::publishing::{PublishResult, Publisher};
use crate::store::Article;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Creates posts through `/wp-json/wp/v2/posts` with an application password.
#[derive(Debug, Clone)]
pub struct WordPressPublisher {
    channel: String,
    http: reqwest::Client,
    site_url: String,
    username: String,
    app_password: String,
    post_status: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: i64,
    #[serde(default)]
    link: Option<String>,
}

impl WordPressPublisher {
    /// Builds the driver from `url`, `username`, `app_password` and an
    /// optional `status` (default `publish`).
    pub fn from_settings(
        channel: &str,
        settings: &ChannelSettings,
        http: reqwest::Client,
    ) -> Result<Self> {
        Ok(Self {
            channel: channel.to_string(),
            http,
            site_url: required_option(channel, settings, "url")?
                .trim_end_matches('/')
                .to_string(),
            username: required_option(channel, settings, "username")?,
            app_password: required_option(channel, settings, "app_password")?,
            post_status: settings.option_str("status").unwrap_or("publish").to_string(),
        })
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn supports(&self, article: &Article) -> bool {
        article.is_published() && article.has_content()
    }

    async fn publish(&self, article: &Article) -> Result<PublishResult> {
        let url = format!("{}/wp-json/wp/v2/posts", self.site_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.app_password))
            .json(&serde_json::json!({
                "title": article.title,
                "content": article.content.clone().unwrap_or_default(),
                "status": self.post_status,
                "slug": article.slug,
                "excerpt": article.description.clone().unwrap_or_default(),
            }))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ContentFlowError::publish(&self.channel, error_body(response).await));
        }

        let post: CreatedPost = response.json().await?;
        let mut result = PublishResult::success(&self.channel)
            .with_external_id(post.id.to_string())
            .with_metadata("status", self.post_status.clone());
        if let Some(link) = post.link {
            result = result.with_external_url(link);
        }
        Ok(result)
    }
}
