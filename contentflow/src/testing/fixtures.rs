//! Test fixtures: a fully wired harness and sample records.

use chrono::Utc;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;

use super::mocks::{MockAiProvider, MockContentSource, MockImageGenerator, MockImageOptimizer, MockPublisher};
use crate::ai::{AiProvider, AiProviderManager, AiService};
use crate::config::ContentFlowConfig;
use crate::core::ArticleStatus;
use crate::errors::Result;
use crate::events::CollectingEventSink;
use crate::payload::ContentPayload;
use crate::pipeline::ContentPipeline;
use crate::publishing::{Publisher, PublisherManager};
use crate::runs::InMemoryRunStore;
use crate::sources::{ContentSource, ContentSourceManager};
use crate::stages::{Next, Pipe, ProgressCallback, StageContext, StageFlow, StagePorts, StageRegistry};
use crate::store::{Article, InMemoryContentStore, InMemoryPublishLogStore};

/// A published article with a body and no image.
#[must_use]
pub fn sample_article(id: i64) -> Article {
    let now = Utc::now();
    Article {
        id,
        title: format!("Sample article {id}"),
        slug: format!("sample-article-{id}"),
        content: Some("<p>Sample body.</p>".to_string()),
        description: Some("A sample.".to_string()),
        featured_image: None,
        meta_title: None,
        meta_description: None,
        category_id: None,
        status: ArticleStatus::Published,
        published_at: Some(now),
        tags: Vec::new(),
        created_at: now,
    }
}

/// PNG bytes of a `width` x `height` gradient.
#[must_use]
#[allow(clippy::expect_used, clippy::cast_possible_truncation)]
pub fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 7) as u8, (y * 13) as u8, 128, 255])
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("in-memory PNG encoding is infallible");
    bytes
}

/// An AI answer accepting the content under `title`.
#[must_use]
pub fn accepted_rewrite(title: &str) -> String {
    serde_json::json!({
        "status": "accept",
        "title": title,
        "content": "<p>Rewritten body.</p>",
        "description": "A rewritten article.",
        "meta_title": title,
        "meta_description": "A rewritten article.",
        "text-to-image": "an editorial illustration",
        "tags": ["news"]
    })
    .to_string()
}

/// Runs one stage with a fresh continuation.
pub async fn run_stage<P: Pipe + ?Sized>(
    pipe: &P,
    payload: ContentPayload,
    ctx: &StageContext,
) -> Result<StageFlow> {
    pipe.handle(&payload, Next::new(), ctx).await
}

/// Every port wired to in-memory stores and mocks.
///
/// `news.test` URLs resolve to [`Harness::source`]; the active publish
/// channel is `mock`, served by [`Harness::publisher`]; the AI provider is
/// `mock`, served by [`Harness::ai`].
#[derive(Debug)]
pub struct Harness {
    /// Configuration used for contexts, ports and pipelines.
    pub config: ContentFlowConfig,
    /// Content store.
    pub store: Arc<InMemoryContentStore>,
    /// Publish log.
    pub publish_logs: Arc<InMemoryPublishLogStore>,
    /// Run store.
    pub runs: Arc<InMemoryRunStore>,
    /// Captured events.
    pub events: Arc<CollectingEventSink>,
    /// AI provider.
    pub ai: Arc<MockAiProvider>,
    /// Source behind `news.test`.
    pub source: Arc<MockContentSource>,
    /// Publisher behind the `mock` channel.
    pub publisher: Arc<MockPublisher>,
    /// Image generator.
    pub images: Arc<MockImageGenerator>,
    /// Image optimiser.
    pub optimizer: Arc<MockImageOptimizer>,
    /// Source resolver.
    pub sources: Arc<ContentSourceManager>,
    /// Publisher resolver.
    pub publishers: Arc<PublisherManager>,
    progress: Arc<Mutex<Vec<String>>>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Creates a harness.
    #[must_use]
    pub fn new() -> Self {
        let mut config = ContentFlowConfig::default();
        config.ai.provider = "mock".to_string();
        config.publishing.channels = vec!["mock".to_string()];

        let source = Arc::new(MockContentSource::new("mock").matching("news.test"));
        let sources = Arc::new(ContentSourceManager::new(config.sources.clone()));
        let shared_source = Arc::clone(&source);
        sources.extend("mock", move |_| Ok(shared_source.clone() as Arc<dyn ContentSource>));

        let publish_logs = Arc::new(InMemoryPublishLogStore::new());
        let publisher = Arc::new(MockPublisher::new("mock"));
        let publishers = Arc::new(PublisherManager::new(
            config.publishing.clone(),
            publish_logs.clone(),
        ));
        let shared_publisher = Arc::clone(&publisher);
        publishers.extend("mock", move |_| Ok(shared_publisher.clone() as Arc<dyn Publisher>));

        Self {
            config,
            store: Arc::new(InMemoryContentStore::new()),
            publish_logs,
            runs: Arc::new(InMemoryRunStore::new()),
            events: Arc::new(CollectingEventSink::new()),
            ai: Arc::new(MockAiProvider::new("mock")),
            source,
            publisher,
            images: Arc::new(MockImageGenerator::new()),
            optimizer: Arc::new(MockImageOptimizer::new()),
            sources,
            publishers,
            progress: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a category to the store.
    #[must_use]
    pub fn with_category(self, id: i64, name: &str) -> Self {
        self.store.insert_category(id, name);
        self
    }

    /// Builds ports over the harness services.
    #[must_use]
    pub fn ports(&self) -> StagePorts {
        let manager = AiProviderManager::new(self.config.ai.clone());
        let ai = Arc::clone(&self.ai);
        manager.extend("mock", move |_| Ok(ai.clone() as Arc<dyn AiProvider>));

        StagePorts {
            config: Arc::new(self.config.clone()),
            ai: Arc::new(AiService::new(Arc::new(manager))),
            sources: Arc::clone(&self.sources),
            publishers: Arc::clone(&self.publishers),
            image_generator: self.images.clone(),
            optimizer: self.optimizer.clone(),
            store: self.store.clone(),
        }
    }

    /// Builds a registry holding every built-in stage.
    #[must_use]
    pub fn registry(&self) -> StageRegistry {
        StageRegistry::builtin(&self.ports())
    }

    /// Builds a tracked pipeline over `registry`, recording progress lines.
    #[must_use]
    pub fn pipeline_with(&self, registry: StageRegistry) -> ContentPipeline {
        ContentPipeline::new(Arc::new(self.config.clone()), registry, self.store.clone())
            .with_run_store(self.runs.clone())
            .with_event_sink(self.events.clone())
            .on_progress(self.progress_callback())
    }

    /// Builds a tracked pipeline with the built-in stages.
    #[must_use]
    pub fn pipeline(&self) -> ContentPipeline {
        self.pipeline_with(self.registry())
    }

    /// A progress callback feeding [`Harness::progress_lines`].
    #[must_use]
    pub fn progress_callback(&self) -> ProgressCallback {
        let lines = Arc::clone(&self.progress);
        Arc::new(move |stage: &str, status: &str| {
            lines.lock().push(format!("{stage}: {status}"));
        })
    }

    /// A stage context reporting into [`Harness::progress_lines`].
    #[must_use]
    pub fn context(&self, label: &str) -> StageContext {
        StageContext::new(Arc::new(self.config.clone()), self.events.clone(), label)
            .with_progress(Some(self.progress_callback()))
    }

    /// Progress lines as `"<label>: <status>"`.
    #[must_use]
    pub fn progress_lines(&self) -> Vec<String> {
        self.progress.lock().clone()
    }

    /// Forgets recorded progress lines.
    pub fn clear_progress(&self) {
        self.progress.lock().clear();
    }
}
