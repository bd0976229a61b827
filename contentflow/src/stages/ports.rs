//! StagePorts - the services built-in stages are wired to.

use crate::ai::{AiProviderManager, AiService, ImageGeneration, ImageGenerator};
use crate::config::ContentFlowConfig;
use crate::media::{ImageOptimization, ImageOptimizer};
use crate::publishing::PublisherManager;
use crate::sources::ContentSourceManager;
use crate::store::{ContentStore, PublishLogStore};
use std::sync::Arc;

/// Shared services handed to the built-in stages.
///
/// Every port is an `Arc`, so cloning the ports is cheap and stages built
/// from the same ports share resolver caches.
#[derive(Clone)]
pub struct StagePorts {
    /// Configuration.
    pub config: Arc<ContentFlowConfig>,
    /// Text completion.
    pub ai: Arc<AiService>,
    /// Content source resolver.
    pub sources: Arc<ContentSourceManager>,
    /// Publisher resolver.
    pub publishers: Arc<PublisherManager>,
    /// Image generation.
    pub image_generator: Arc<dyn ImageGeneration>,
    /// Image optimisation.
    pub optimizer: Arc<dyn ImageOptimization>,
    /// Articles, tags, categories and staged inputs.
    pub store: Arc<dyn ContentStore>,
}

impl std::fmt::Debug for StagePorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePorts")
            .field("sources", &self.sources)
            .field("publishers", &self.publishers)
            .field("image_generator", &self.image_generator)
            .field("optimizer", &self.optimizer)
            .finish_non_exhaustive()
    }
}

impl StagePorts {
    /// Builds the default services from configuration.
    #[must_use]
    pub fn from_config(
        config: Arc<ContentFlowConfig>,
        store: Arc<dyn ContentStore>,
        publish_logs: Arc<dyn PublishLogStore>,
    ) -> Self {
        let http = reqwest::Client::new();
        let providers = Arc::new(AiProviderManager::new(config.ai.clone()).with_http_client(http.clone()));

        Self {
            ai: Arc::new(AiService::new(Arc::clone(&providers))),
            sources: Arc::new(
                ContentSourceManager::new(config.sources.clone()).with_http_client(http.clone()),
            ),
            publishers: Arc::new(
                PublisherManager::new(config.publishing.clone(), publish_logs).with_http_client(http),
            ),
            image_generator: Arc::new(ImageGenerator::new(providers, config.images.clone())),
            optimizer: Arc::new(ImageOptimizer::new(config.images.clone())),
            store,
            config,
        }
    }

    /// Replaces the AI service.
    #[must_use]
    pub fn with_ai(mut self, ai: Arc<AiService>) -> Self {
        self.ai = ai;
        self
    }

    /// Replaces the source resolver.
    #[must_use]
    pub fn with_sources(mut self, sources: Arc<ContentSourceManager>) -> Self {
        self.sources = sources;
        self
    }

    /// Replaces the publisher resolver.
    #[must_use]
    pub fn with_publishers(mut self, publishers: Arc<PublisherManager>) -> Self {
        self.publishers = publishers;
        self
    }

    /// Replaces the image generator.
    #[must_use]
    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGeneration>) -> Self {
        self.image_generator = generator;
        self
    }

    /// Replaces the image optimiser.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Arc<dyn ImageOptimization>) -> Self {
        self.optimizer = optimizer;
        self
    }
}
