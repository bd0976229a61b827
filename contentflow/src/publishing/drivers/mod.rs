//! Built-in channel drivers.

mod blogger;
mod facebook;
mod logger;
mod telegram;
mod wordpress;

pub use blogger::BloggerPublisher;
pub use facebook::FacebookPublisher;
pub use logger::LogPublisher;
pub use telegram::TelegramPublisher;
pub use wordpress::WordPressPublisher;

use crate::config::ChannelSettings;
use crate::errors::{ContentFlowError, Result};

fn required_option(channel: &str, settings: &ChannelSettings, key: &str) -> Result<String> {
    settings
        .option_str(key)
        .map(String::from)
        .ok_or_else(|| ContentFlowError::Config(format!("channel [{channel}] requires option `{key}`")))
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    format!("HTTP {status}: {body}")
}
