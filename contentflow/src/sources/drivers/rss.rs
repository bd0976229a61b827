//! RSS 2.0, RSS 1.0 (RDF) and Atom feeds.

use super::{read_body, url_path};
use crate::config::RssSourceSettings;
use crate::errors::{ContentFlowError, Result};
use crate::sources::{ContentSource, FetchedContent};
use crate::utils::{format_iso8601, is_url, parse_feed_date, Timestamp};
use async_trait::async_trait;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

#[allow(clippy::expect_used)]
static FEED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(feed|rss|atom|\.xml|\.rss|\.atom)").expect("feed path pattern is valid")
});

/// A single feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// Entry title.
    pub title: Option<String>,
    /// Full content, or the summary when the feed has no full content.
    pub content: String,
    /// Permalink.
    pub link: Option<String>,
    /// Publication date.
    pub date: Option<Timestamp>,
}

impl FeedEntry {
    fn to_meta(&self) -> Value {
        json!({
            "title": self.title,
            "link": self.link,
            "date": self.date.as_ref().map(format_iso8601),
        })
    }
}

/// A parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    /// Channel or feed title.
    pub title: Option<String>,
    /// Entries in document order.
    pub entries: Vec<FeedEntry>,
}

impl Feed {
    /// Returns the entry with the newest date, or the first entry when no
    /// entry is dated.
    #[must_use]
    pub fn latest(&self) -> Option<&FeedEntry> {
        self.entries
            .iter()
            .filter(|e| e.date.is_some())
            .max_by_key(|e| e.date)
            .or_else(|| self.entries.first())
    }
}

/// Fetches a feed and returns its latest entry.
#[derive(Debug, Clone)]
pub struct RssSource {
    http: reqwest::Client,
    timeout: Duration,
    max_items: usize,
}

impl RssSource {
    /// Creates the driver.
    #[must_use]
    pub fn new(settings: &RssSourceSettings, http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(settings.timeout_seconds),
            max_items: settings.max_items,
        }
    }
}

fn element_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: Node<'_, '_>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| child(node, name).and_then(element_text))
}

fn parse_item(item: Node<'_, '_>) -> FeedEntry {
    FeedEntry {
        title: child_text(item, &["title"]),
        // `encoded` is content:encoded
        content: child_text(item, &["encoded", "description"]).unwrap_or_default(),
        link: child_text(item, &["link"]),
        date: child_text(item, &["pubDate", "date"]).and_then(|d| parse_feed_date(&d)),
    }
}

fn parse_atom_entry(entry: Node<'_, '_>) -> FeedEntry {
    let link = entry
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "link")
        .find(|n| n.attribute("rel").map_or(true, |rel| rel == "alternate"))
        .and_then(|n| n.attribute("href"))
        .map(str::to_string);

    FeedEntry {
        title: child_text(entry, &["title"]),
        content: child_text(entry, &["content", "summary"]).unwrap_or_default(),
        link,
        date: child_text(entry, &["published", "updated"]).and_then(|d| parse_feed_date(&d)),
    }
}

/// Parses RSS 2.0, RSS 1.0 and Atom documents.
pub fn parse_feed(xml: &str, max_items: usize) -> Result<Feed> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ContentFlowError::source("rss", format!("invalid XML: {e}")))?;
    let root = doc.root_element();

    let (title, entries) = match root.tag_name().name() {
        "rss" => {
            let channel = child(root, "channel")
                .ok_or_else(|| ContentFlowError::source("rss", "RSS document has no <channel>"))?;
            let items = channel
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "item")
                .take(max_items)
                .map(parse_item)
                .collect();
            (child_text(channel, &["title"]), items)
        }
        "RDF" => {
            let items = root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "item")
                .take(max_items)
                .map(parse_item)
                .collect();
            (child(root, "channel").and_then(|c| child_text(c, &["title"])), items)
        }
        "feed" => {
            let entries = root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "entry")
                .take(max_items)
                .map(parse_atom_entry)
                .collect();
            (child_text(root, &["title"]), entries)
        }
        other => {
            return Err(ContentFlowError::source(
                "rss",
                format!("unrecognised feed root <{other}>"),
            ))
        }
    };

    Ok(Feed { title, entries })
}

#[async_trait]
impl ContentSource for RssSource {
    fn name(&self) -> &str {
        "rss"
    }

    fn supports(&self, identifier: &str) -> bool {
        is_url(identifier) && FEED_PATH.is_match(&url_path(identifier))
    }

    async fn fetch(&self, identifier: &str) -> Result<FetchedContent> {
        let response = self
            .http
            .get(identifier)
            .timeout(self.timeout)
            .send()
            .await?;
        let body = read_body(self.name(), identifier, response).await?;

        let feed = parse_feed(&body, self.max_items)?;
        let latest = feed.latest().ok_or_else(|| {
            ContentFlowError::source(self.name(), format!("no entries found in feed: {identifier}"))
        })?;

        info!(
            url = %identifier,
            entries = feed.entries.len(),
            latest_title = ?latest.title,
            "Parsed feed"
        );

        Ok(FetchedContent::new(latest.content.clone(), latest.title.clone())
            .with_meta("source_driver", self.name())
            .with_meta("url", identifier)
            .with_meta("feed_title", feed.title.clone())
            .with_meta("entry_link", latest.link.clone())
            .with_meta("entry_date", latest.date.as_ref().map(format_iso8601))
            .with_meta(
                "entries",
                feed.entries.iter().map(FeedEntry::to_meta).collect::<Vec<_>>(),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Tech Blog</title>
    <item>
      <title>Older post</title>
      <link>https://blog.test/older</link>
      <description>Old summary</description>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Newest post</title>
      <link>https://blog.test/newest</link>
      <description>Short summary</description>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
      <pubDate>Wed, 03 Jan 2024 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <entry>
    <title>Atom entry</title>
    <link rel="alternate" href="https://atom.test/1"/>
    <updated>2024-02-01T12:00:00Z</updated>
    <summary>Atom summary</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_rss_latest_prefers_newest_and_full_content() {
        let feed = parse_feed(RSS, 10).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Tech Blog"));
        assert_eq!(feed.entries.len(), 2);

        let latest = feed.latest().unwrap();
        assert_eq!(latest.title.as_deref(), Some("Newest post"));
        assert_eq!(latest.content, "<p>Full body</p>");
        assert_eq!(latest.link.as_deref(), Some("https://blog.test/newest"));
    }

    #[test]
    fn test_atom_entries() {
        let feed = parse_feed(ATOM, 10).unwrap();
        let latest = feed.latest().unwrap();
        assert_eq!(latest.title.as_deref(), Some("Atom entry"));
        assert_eq!(latest.content, "Atom summary");
        assert_eq!(latest.link.as_deref(), Some("https://atom.test/1"));
    }

    #[test]
    fn test_max_items_limits_entries() {
        let feed = parse_feed(RSS, 1).unwrap();
        assert_eq!(feed.entries.len(), 1);
    }

    #[test]
    fn test_invalid_xml() {
        let err = parse_feed("<rss><channel>", 10).unwrap_err();
        assert!(matches!(err, ContentFlowError::Source { .. }));
    }

    #[test]
    fn test_supports_feed_urls() {
        let source = RssSource::new(&RssSourceSettings::default(), reqwest::Client::new());
        assert!(source.supports("https://blog.test/feed"));
        assert!(source.supports("https://blog.test/posts.atom"));
        assert!(!source.supports("https://blog.test/about"));
        assert!(!source.supports("feed me"));
    }

    #[tokio::test]
    async fn test_fetch_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let source = RssSource::new(&RssSourceSettings::default(), reqwest::Client::new());
        let fetched = source
            .fetch(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap();

        assert_eq!(fetched.title.as_deref(), Some("Newest post"));
        assert_eq!(fetched.meta["feed_title"], "Tech Blog");
        assert_eq!(fetched.meta["entries"].as_array().unwrap().len(), 2);
        assert_eq!(fetched.driver(), Some("rss"));
    }

    #[tokio::test]
    async fn test_empty_feed_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<rss version=\"2.0\"><channel><title>Empty</title></channel></rss>",
            ))
            .mount(&server)
            .await;

        let source = RssSource::new(&RssSourceSettings::default(), reqwest::Client::new());
        let err = source
            .fetch(&format!("{}/feed", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no entries"));
    }
}
