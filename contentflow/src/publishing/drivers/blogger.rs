//! Google Blogger API v3 channel.

use super::{error_body, required_option};
use crate::config::ChannelSettings;
use crate::errors::{ContentFlowError, Result};
use crate::publishing::{PublishResult, Publisher};
use crate::store::Article;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const BLOGGER_API: &str = "https://www.googleapis.com/blogger/v3";

/// Creates posts on one blog. Tags become post labels.
///
/// Authenticates with an OAuth `access_token`; an `api_key`, when set, is
/// sent as the `key` query parameter.
#[derive(Debug, Clone)]
pub struct BloggerPublisher {
    channel: String,
    http: reqwest::Client,
    api_base: String,
    blog_id: String,
    access_token: String,
    api_key: Option<String>,
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl BloggerPublisher {
    /// Builds the driver from `blog_id` and `access_token`, plus optional
    /// `api_key`, `draft` and `api_base`.
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
                .unwrap_or(BLOGGER_API)
                .trim_end_matches('/')
                .to_string(),
            blog_id: required_option(channel, settings, "blog_id")?,
            access_token: required_option(channel, settings, "access_token")?,
            api_key: settings.option_str("api_key").map(String::from),
            draft: settings
                .options
                .get("draft")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
        })
    }

    fn body(article: &Article) -> serde_json::Value {
        let mut body = serde_json::json!({
            "kind": "blogger#post",
            "title": article.title,
            "content": article.content.clone().unwrap_or_default(),
        });
        let labels: Vec<&str> = article.tags.iter().map(|t| t.name.as_str()).collect();
        if !labels.is_empty() {
            body["labels"] = serde_json::json!(labels);
        }
        body
    }
}

#[async_trait]
impl Publisher for BloggerPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn supports(&self, article: &Article) -> bool {
        article.is_published() && article.has_content()
    }

    async fn publish(&self, article: &Article) -> Result<PublishResult> {
        let url = format!("{}/blogs/{}/posts/", self.api_base, self.blog_id);
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }
        if self.draft {
            query.push(("isDraft", "true"));
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .json(&Self::body(article))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = error_body(response).await;
            let parsed = text
                .split_once(": ")
                .and_then(|(_, body)| serde_json::from_str::<ApiError>(body).ok());
            let message = match parsed {
                Some(api) => format!("HTTP {status}: {}", api.error.message),
                None => text,
            };
            return Err(ContentFlowError::publish(&self.channel, message));
        }

        let post: CreatedPost = response.json().await?;
        let mut result = PublishResult::success(&self.channel)
            .with_external_id(post.id)
            .with_metadata("blog_id", self.blog_id.clone());
        if let Some(link) = post.url {
            result = result.with_external_url(link);
        }
        Ok(result)
    }
}
