//! HTML page scraping.

use super::{read_body, url_path};
use crate::config::WebSourceSettings;
use crate::errors::Result;
use crate::sources::{ContentSource, FetchedContent};
use crate::utils::{is_url, strip_tags};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

#[allow(clippy::expect_used)]
static CHROME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(nav|footer|header|aside|form|iframe)\b[^>]*>.*?</(nav|footer|header|aside|form|iframe)>|<!--.*?-->")
        .expect("page chrome pattern is valid")
});

#[allow(clippy::expect_used)]
static OG_TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("og:title selector is valid")
});

#[allow(clippy::expect_used)]
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));

#[allow(clippy::expect_used)]
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("h1 selector is valid"));

#[allow(clippy::expect_used)]
static PARAGRAPHS: LazyLock<[Selector; 3]> = LazyLock::new(|| {
    ["article p", "main p", "p"].map(|s| Selector::parse(s).expect("paragraph selector is valid"))
});

/// Fetches a page and extracts its readable text.
#[derive(Debug, Clone)]
pub struct WebSource {
    http: reqwest::Client,
    timeout: Duration,
    user_agent: String,
}

impl WebSource {
    /// Creates the driver.
    #[must_use]
    pub fn new(settings: &WebSourceSettings, http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(settings.timeout_seconds),
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// Pulls a title and body text out of an HTML document.
///
/// Paragraphs inside `<article>` win over `<main>`, which win over any
/// paragraph on the page. Pages without paragraphs fall back to the whole
/// document with navigation and page chrome removed.
#[must_use]
pub fn extract_page(html: &str) -> (String, Option<String>) {
    let document = Html::parse_document(html);

    let title = document
        .select(&OG_TITLE)
        .find_map(|el| el.value().attr("content"))
        .map(str::to_string)
        .or_else(|| document.select(&TITLE).next().map(|el| el.text().collect()))
        .or_else(|| document.select(&HEADING).next().map(|el| el.text().collect()))
        .map(|t: String| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());

    let body = PARAGRAPHS
        .iter()
        .map(|selector| {
            document
                .select(selector)
                .map(|p| p.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|paragraphs| !paragraphs.is_empty())
        .map(|paragraphs| paragraphs.join("\n\n"))
        .unwrap_or_else(|| strip_tags(&CHROME.replace_all(html, "")));

    (body, title)
}

#[async_trait]
impl ContentSource for WebSource {
    fn name(&self) -> &str {
        "web"
    }

    fn supports(&self, identifier: &str) -> bool {
        if !is_url(identifier) {
            return false;
        }
        let path = url_path(identifier).to_lowercase();
        ![".xml", ".rss", ".atom"].iter().any(|ext| path.ends_with(ext))
    }

    async fn fetch(&self, identifier: &str) -> Result<FetchedContent> {
        let response = self
            .http
            .get(identifier)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .timeout(self.timeout)
            .send()
            .await?;
        let html = read_body(self.name(), identifier, response).await?;
        debug!(url = %identifier, size = html.len(), "Fetched page");

        let (content, title) = extract_page(&html);
        info!(url = %identifier, length = content.chars().count(), "Scraped page content");

        Ok(FetchedContent::new(content, title)
            .with_meta("source_driver", self.name())
            .with_meta("url", identifier))
    }
}
