//! AI provider resolution.

use super::providers::{ClaudeProvider, GeminiProvider, OpenAiProvider, PiApiProvider};
use super::AiProvider;
use crate::config::{AiConfig, ProviderSettings};
use crate::errors::{ContentFlowError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Builds a provider from its settings.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderSettings) -> Result<Arc<dyn AiProvider>> + Send + Sync>;

/// Providers shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinProvider {
    /// OpenAI chat completions and images.
    OpenAi,
    /// Anthropic messages API.
    Claude,
    /// Google Gemini.
    Gemini,
    /// Local Ollama through its OpenAI-compatible endpoint.
    Ollama,
    /// PiAPI Flux, images only.
    PiApi,
}

impl BuiltinProvider {
    /// All built-in providers.
    pub const ALL: [Self; 5] = [Self::OpenAi, Self::Claude, Self::Gemini, Self::Ollama, Self::PiApi];

    /// Provider used for images when nothing better is configured.
    pub const IMAGE_FALLBACK: Self = Self::OpenAi;

    /// Returns the provider name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::PiApi => "piapi",
        }
    }

    fn create(self, settings: &ProviderSettings, http: reqwest::Client) -> Result<Arc<dyn AiProvider>> {
        let provider: Arc<dyn AiProvider> = match self {
            Self::OpenAi => Arc::new(OpenAiProvider::openai(settings, http)?),
            Self::Ollama => Arc::new(OpenAiProvider::ollama(settings, http)),
            Self::Claude => Arc::new(ClaudeProvider::new(settings, http)?),
            Self::Gemini => Arc::new(GeminiProvider::new(settings, http)?),
            Self::PiApi => Arc::new(PiApiProvider::new(settings, http)?),
        };
        Ok(provider)
    }
}

impl FromStr for BuiltinProvider {
    type Err = ContentFlowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ContentFlowError::UnknownProvider(s.to_string()))
    }
}

/// Resolves provider names to providers, caching each instance.
pub struct AiProviderManager {
    config: AiConfig,
    http: reqwest::Client,
    resolved: RwLock<HashMap<String, Arc<dyn AiProvider>>>,
    custom: RwLock<HashMap<String, ProviderFactory>>,
}

impl fmt::Debug for AiProviderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiProviderManager")
            .field("default", &self.config.provider)
            .field("image_provider", &self.config.image_provider)
            .field("custom", &self.custom.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl AiProviderManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            resolved: RwLock::new(HashMap::new()),
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Uses a shared HTTP client for built-in providers.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Returns the AI configuration.
    #[must_use]
    pub const fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Returns the default provider name.
    #[must_use]
    pub fn default_provider(&self) -> &str {
        &self.config.provider
    }

    /// Registers a custom provider, replacing any cached instance.
    pub fn extend<F>(&self, name: impl Into<String>, factory: F) -> &Self
    where
        F: Fn(&ProviderSettings) -> Result<Arc<dyn AiProvider>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.resolved.write().remove(&name);
        self.custom.write().insert(name, Arc::new(factory));
        self
    }

    /// Lists every resolvable provider name.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = BuiltinProvider::ALL
            .iter()
            .map(|p| p.as_str().to_string())
            .chain(self.custom.read().keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolves a provider, defaulting to the configured one.
    pub fn provider(&self, name: Option<&str>) -> Result<Arc<dyn AiProvider>> {
        let name = name.unwrap_or(&self.config.provider);

        if let Some(cached) = self.resolved.read().get(name) {
            return Ok(Arc::clone(cached));
        }

        let provider = self.create(name)?;
        self.resolved
            .write()
            .insert(name.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Resolves the provider used for image generation.
    ///
    /// Order: the configured image provider, then the default provider if it
    /// can draw, then the well-known image provider.
    pub fn image_provider(&self) -> Result<Arc<dyn AiProvider>> {
        if let Some(name) = self.config.image_provider.as_deref() {
            return self.provider(Some(name));
        }

        let default = self.provider(None)?;
        if default.supports_image_generation() {
            return Ok(default);
        }

        debug!(
            default = %self.config.provider,
            fallback = BuiltinProvider::IMAGE_FALLBACK.as_str(),
            "Default provider cannot generate images"
        );
        self.provider(Some(BuiltinProvider::IMAGE_FALLBACK.as_str()))
    }

    fn create(&self, name: &str) -> Result<Arc<dyn AiProvider>> {
        let settings = self.config.settings_for(name);

        let factory = self.custom.read().get(name).cloned();
        if let Some(factory) = factory {
            debug!(provider = %name, "Creating custom AI provider");
            return factory(&settings);
        }

        let builtin: BuiltinProvider = name.parse()?;
        builtin.create(&settings, self.http.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAiProvider;

    fn config_with_key(provider: &str) -> AiConfig {
        let mut config = AiConfig {
            provider: provider.to_string(),
            ..AiConfig::default()
        };
        for name in ["openai", "claude", "gemini", "piapi"] {
            config.providers.insert(
                name.to_string(),
                ProviderSettings {
                    api_key: Some("key".to_string()),
                    ..ProviderSettings::default()
                },
            );
        }
        config
    }

    #[test]
    fn test_resolves_default_and_caches() {
        let manager = AiProviderManager::new(config_with_key("claude"));
        let first = manager.provider(None).unwrap();
        let second = manager.provider(Some("claude")).unwrap();
        assert_eq!(first.name(), "claude");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_provider() {
        let manager = AiProviderManager::new(AiConfig::default());
        let err = manager.provider(Some("skynet")).unwrap_err();
        assert!(matches!(err, ContentFlowError::UnknownProvider(_)));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let manager = AiProviderManager::new(AiConfig::default());
        let err = manager.provider(Some("openai")).unwrap_err();
        assert!(matches!(err, ContentFlowError::Config(_)));
    }

    #[test]
    fn test_extend_overrides_cached_instance() {
        let manager = AiProviderManager::new(config_with_key("openai"));
        let builtin = manager.provider(Some("openai")).unwrap();
        assert!(builtin.supports_image_generation());

        manager.extend("openai", |_| Ok(Arc::new(MockAiProvider::new("openai"))));
        let replaced = manager.provider(Some("openai")).unwrap();
        assert!(!Arc::ptr_eq(&builtin, &replaced));
        assert!(manager.available().contains(&"ollama".to_string()));
    }

    #[test]
    fn test_image_provider_prefers_explicit_setting() {
        let mut config = config_with_key("claude");
        config.image_provider = Some("gemini".to_string());
        let manager = AiProviderManager::new(config);
        assert_eq!(manager.image_provider().unwrap().name(), "gemini");
    }

    #[test]
    fn test_image_provider_uses_default_when_capable() {
        let manager = AiProviderManager::new(config_with_key("gemini"));
        assert_eq!(manager.image_provider().unwrap().name(), "gemini");
    }

    #[test]
    fn test_piapi_is_an_image_only_builtin() {
        let mut config = config_with_key("claude");
        config.image_provider = Some("piapi".to_string());
        let manager = AiProviderManager::new(config);

        let images = manager.image_provider().unwrap();
        assert_eq!(images.name(), "piapi");
        assert!(images.supports_image_generation());
        assert_eq!(manager.provider(None).unwrap().name(), "claude");
        assert!(manager.available().contains(&"piapi".to_string()));
    }

    #[test]
    fn test_image_provider_falls_back_to_openai() {
        let manager = AiProviderManager::new(config_with_key("claude"));
        assert_eq!(manager.image_provider().unwrap().name(), "openai");
    }
}
