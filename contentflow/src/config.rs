//! Configuration for the pipeline, resolvers and media handling.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a working configuration. The config is passed explicitly to the
//! components that need it; nothing reads it from global state.

use crate::errors::{ContentFlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFlowConfig {
    /// Orchestrator settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// AI provider settings.
    #[serde(default)]
    pub ai: AiConfig,
    /// Content source settings.
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Publishing settings.
    #[serde(default)]
    pub publishing: PublishingConfig,
    /// Image storage and optimisation.
    #[serde(default)]
    pub images: ImageConfig,
    /// Fallback category list (id -> name) used when the store has none.
    #[serde(default)]
    pub categories: BTreeMap<i64, String>,
}

impl ContentFlowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `CONTENTFLOW_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored and logged.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CONTENTFLOW_HALT_ON_ERROR").and_then(|v| parse_bool(&v)) {
            self.pipeline.halt_on_error = value;
        }
        if let Some(value) = lookup("CONTENTFLOW_TRACK_RUNS").and_then(|v| parse_bool(&v)) {
            self.pipeline.track_runs = value;
        }
        if let Some(value) = lookup("CONTENTFLOW_RUN_TIMEOUT") {
            match value.trim().parse() {
                Ok(seconds) => self.pipeline.run_timeout_seconds = seconds,
                Err(_) => tracing::warn!(value = %value, "Ignoring invalid CONTENTFLOW_RUN_TIMEOUT"),
            }
        }
        if let Some(value) = lookup("CONTENTFLOW_AI_PROVIDER") {
            self.ai.provider = value;
        }
        if let Some(value) = lookup("CONTENTFLOW_CONTENT_MODEL") {
            self.ai.content_model = value;
        }
        if let Some(value) = lookup("CONTENTFLOW_FALLBACK_MODEL") {
            self.ai.fallback_model = value;
        }
        if let Some(value) = lookup("CONTENTFLOW_SOURCE_DRIVER") {
            self.sources.forced = Some(value).filter(|v| !v.is_empty());
        }
        if let Some(value) = lookup("CONTENTFLOW_CHANNELS") {
            self.publishing.channels = value
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        self
    }

    /// Checks values that would otherwise fail at run time.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.stages.is_empty() {
            return Err(ContentFlowError::Config(
                "pipeline.stages must not be empty".to_string(),
            ));
        }
        if self.pipeline.run_timeout_seconds == 0 {
            return Err(ContentFlowError::Config(
                "pipeline.run_timeout_seconds must be positive".to_string(),
            ));
        }
        if parse_image_size(&self.ai.image_size).is_none() {
            return Err(ContentFlowError::Config(format!(
                "ai.image_size must look like 1024x1024, got {}",
                self.ai.image_size
            )));
        }
        Ok(())
    }

    /// Sets the default stage list.
    #[must_use]
    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pipeline.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the halt-on-error policy.
    #[must_use]
    pub const fn with_halt_on_error(mut self, halt: bool) -> Self {
        self.pipeline.halt_on_error = halt;
        self
    }

    /// Enables or disables run tracking.
    #[must_use]
    pub const fn with_track_runs(mut self, track: bool) -> Self {
        self.pipeline.track_runs = track;
        self
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default ordered stage identifiers.
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,
    /// Convert a stage exception into a rejection and stop.
    #[serde(default = "default_true")]
    pub halt_on_error: bool,
    /// Persist run records and checkpoints.
    #[serde(default = "default_true")]
    pub track_runs: bool,
    /// Wall-clock budget for a whole run.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

fn default_stages() -> Vec<String> {
    [
        "fetch",
        "rewrite",
        "generate_image",
        "optimize_image",
        "persist",
        "publish",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_true() -> bool {
    true
}

const fn default_run_timeout() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            halt_on_error: true,
            track_runs: true,
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Returns the run budget as a duration.
    #[must_use]
    pub const fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

/// AI provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Default text provider name.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider used for image generation, if different.
    #[serde(default)]
    pub image_provider: Option<String>,
    /// Primary chat model.
    #[serde(default = "default_model")]
    pub content_model: String,
    /// Model retried once when the primary fails.
    #[serde(default = "default_model")]
    pub fallback_model: String,
    /// Completion token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Image model.
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Image size, `WIDTHxHEIGHT`.
    #[serde(default = "default_image_size")]
    pub image_size: String,
    /// Image quality hint.
    #[serde(default = "default_image_quality")]
    pub image_quality: String,
    /// Language the rewrite is produced in.
    #[serde(default = "default_language")]
    pub output_language: String,
    /// Per-provider credentials and endpoints.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_image_quality() -> String {
    "standard".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            image_provider: None,
            content_model: default_model(),
            fallback_model: default_model(),
            max_tokens: default_max_tokens(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            image_quality: default_image_quality(),
            output_language: default_language(),
            providers: HashMap::new(),
        }
    }
}

impl AiConfig {
    /// Returns settings for a provider, or defaults.
    #[must_use]
    pub fn settings_for(&self, provider: &str) -> ProviderSettings {
        self.providers.get(provider).cloned().unwrap_or_default()
    }
}

/// Credentials and endpoint for one AI provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Status checks before giving up on an asynchronous task.
    #[serde(default)]
    pub poll_max_attempts: Option<u32>,
    /// Delay between status checks.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

impl ProviderSettings {
    /// Returns the timeout, defaulting to 120 seconds.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(120))
    }

    /// Returns the poll budget, defaulting to 30 checks every 3 seconds.
    #[must_use]
    pub fn polling(&self) -> (u32, Duration) {
        (
            self.poll_max_attempts.unwrap_or(30),
            Duration::from_millis(self.poll_interval_ms.unwrap_or(3_000)),
        )
    }
}

/// Content source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Driver used when detection finds no match.
    #[serde(default = "default_source")]
    pub default: String,
    /// Driver forced for every fetch, bypassing detection.
    #[serde(default)]
    pub forced: Option<String>,
    /// Web driver settings.
    #[serde(default)]
    pub web: WebSourceSettings,
    /// RSS driver settings.
    #[serde(default)]
    pub rss: RssSourceSettings,
}

fn default_source() -> String {
    "web".to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default: default_source(),
            forced: None,
            web: WebSourceSettings::default(),
            rss: RssSourceSettings::default(),
        }
    }
}

/// Web page driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSourceSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
    /// User agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_fetch_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; ContentBot/1.0)".to_string()
}

impl Default for WebSourceSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// RSS/Atom driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssSourceSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
    /// Entries kept in the fetch metadata.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

const fn default_max_items() -> usize {
    10
}

impl Default for RssSourceSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            max_items: default_max_items(),
        }
    }
}

/// Publishing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Default channel.
    #[serde(default = "default_channel")]
    pub default: String,
    /// Channels published to when none are requested explicitly.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Per-channel settings.
    #[serde(default)]
    pub drivers: HashMap<String, ChannelSettings>,
}

fn default_channel() -> String {
    "log".to_string()
}

fn default_channels() -> Vec<String> {
    vec![default_channel()]
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            default: default_channel(),
            channels: default_channels(),
            drivers: HashMap::new(),
        }
    }
}

impl PublishingConfig {
    /// Returns settings for a channel, or empty settings.
    #[must_use]
    pub fn settings_for(&self, channel: &str) -> ChannelSettings {
        self.drivers.get(channel).cloned().unwrap_or_default()
    }
}

/// Settings for one publish channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Built-in driver backing this channel, when the channel name differs.
    #[serde(default)]
    pub driver: Option<String>,
    /// Driver-specific options (tokens, urls, ids).
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ChannelSettings {
    /// Returns a string option.
    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Sets an option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Image storage and optimisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Run the optimise stage.
    #[serde(default = "default_true")]
    pub optimize: bool,
    /// Images wider than this are downsized.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Encoder quality (1-100) for lossy formats.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Target format extension.
    #[serde(default = "default_format")]
    pub format: String,
    /// Files smaller than this keep their format.
    #[serde(default = "default_min_size")]
    pub min_size_for_conversion: u64,
    /// Subdirectory for article images.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Root of image storage on disk.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
}

const fn default_max_width() -> u32 {
    1600
}

const fn default_quality() -> u8 {
    82
}

fn default_format() -> String {
    "webp".to_string()
}

const fn default_min_size() -> u64 {
    20 * 1024
}

fn default_directory() -> String {
    "articles".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            max_width: default_max_width(),
            quality: default_quality(),
            format: default_format(),
            min_size_for_conversion: default_min_size(),
            directory: default_directory(),
            storage_root: default_storage_root(),
        }
    }
}

impl ImageConfig {
    /// Sets the storage root.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Resolves a stored relative path to a filesystem path.
    #[must_use]
    pub fn absolute_path(&self, relative: &str) -> PathBuf {
        self.storage_root.join(relative)
    }
}

/// Parses `WIDTHxHEIGHT`.
#[must_use]
pub fn parse_image_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    let width = w.trim().parse().ok().filter(|v| *v > 0)?;
    let height = h.trim().parse().ok().filter(|v| *v > 0)?;
    Some((width, height))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(value = %other, "Ignoring invalid boolean override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ContentFlowConfig::default();
        assert_eq!(
            config.pipeline.stages,
            vec![
                "fetch",
                "rewrite",
                "generate_image",
                "optimize_image",
                "persist",
                "publish"
            ]
        );
        assert!(config.pipeline.halt_on_error);
        assert!(config.pipeline.track_runs);
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.content_model, "gpt-4o-mini");
        assert_eq!(config.sources.default, "web");
        assert_eq!(config.publishing.channels, vec!["log"]);
        assert_eq!(config.images.max_width, 1600);
    }

    #[test]
    fn test_partial_json() {
        let config = ContentFlowConfig::from_json_str(
            r#"{
                "pipeline": {"halt_on_error": false},
                "ai": {"fallback_model": "gpt-4o"},
                "publishing": {
                    "channels": ["log", "telegram"],
                    "drivers": {"telegram": {"bot_token": "t", "chat_id": "42"}}
                }
            }"#,
        )
        .unwrap();

        assert!(!config.pipeline.halt_on_error);
        assert!(config.pipeline.track_runs);
        assert_eq!(config.ai.content_model, "gpt-4o-mini");
        assert_eq!(config.ai.fallback_model, "gpt-4o");
        let telegram = config.publishing.settings_for("telegram");
        assert_eq!(telegram.option_str("chat_id"), Some("42"));
        assert_eq!(telegram.driver, None);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("CONTENTFLOW_HALT_ON_ERROR", "false"),
            ("CONTENTFLOW_CHANNELS", "log, wordpress ,"),
            ("CONTENTFLOW_SOURCE_DRIVER", "rss"),
            ("CONTENTFLOW_RUN_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ContentFlowConfig::default()
            .with_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert!(!config.pipeline.halt_on_error);
        assert_eq!(config.publishing.channels, vec!["log", "wordpress"]);
        assert_eq!(config.sources.forced.as_deref(), Some("rss"));
        assert_eq!(config.pipeline.run_timeout_seconds, 300);
    }

    #[test]
    fn test_validate() {
        assert!(ContentFlowConfig::default().validate().is_ok());

        let empty = ContentFlowConfig::default().with_stages(Vec::<String>::new());
        assert!(matches!(empty.validate(), Err(ContentFlowError::Config(_))));

        let mut bad_size = ContentFlowConfig::default();
        bad_size.ai.image_size = "huge".to_string();
        assert!(bad_size.validate().is_err());
    }

    #[test]
    fn test_parse_image_size() {
        assert_eq!(parse_image_size("1792x1024"), Some((1792, 1024)));
        assert_eq!(parse_image_size("0x10"), None);
        assert_eq!(parse_image_size("1024"), None);
    }
}
