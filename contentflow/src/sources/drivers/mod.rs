//! Built-in content sources.

mod rss;
mod text;
mod web;

pub use rss::RssSource;
pub use text::TextSource;
pub use web::WebSource;

use crate::errors::{ContentFlowError, Result};

/// Returns the URL path, or an empty string for anything unparseable.
fn url_path(identifier: &str) -> String {
    reqwest::Url::parse(identifier.trim())
        .map(|url| url.path().to_string())
        .unwrap_or_default()
}

async fn read_body(driver: &str, identifier: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(ContentFlowError::source(
            driver,
            format!("failed to fetch [{status}]: {identifier}"),
        ));
    }
    Ok(response.text().await?)
}
