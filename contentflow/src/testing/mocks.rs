//! Mock providers, sources, publishers and pipes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::fixtures::accepted_rewrite;
use crate::ai::{AiProvider, ChatRequest, ChatResponse, ImageGeneration, ImageRequest, TokenUsage};
use crate::errors::{ContentFlowError, Result};
use crate::media::ImageOptimization;
use crate::payload::{ContentPayload, PayloadPatch};
use crate::publishing::{PublishResult, Publisher};
use crate::sources::{ContentSource, FetchedContent};
use crate::stages::{Next, Pipe, StageContext, StageFlow};
use crate::store::Article;

/// An AI provider with scripted answers.
///
/// Responses are served in order; the last one repeats. With nothing
/// queued, every chat returns an accepted rewrite.
#[derive(Debug)]
pub struct MockAiProvider {
    name: String,
    responses: Mutex<VecDeque<String>>,
    failing_models: Mutex<HashMap<String, String>>,
    image: Option<std::result::Result<Vec<u8>, String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockAiProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            failing_models: Mutex::new(HashMap::new()),
            image: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a response.
    #[must_use]
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.push_response(content);
        self
    }

    /// Queues a response on a shared provider.
    pub fn push_response(&self, content: impl Into<String>) {
        self.responses.lock().push_back(content.into());
    }

    /// Makes every request for `model` fail.
    #[must_use]
    pub fn failing_model(self, model: impl Into<String>, error: impl Into<String>) -> Self {
        self.fail_model(model, error);
        self
    }

    /// Makes every request for `model` fail on a shared provider.
    pub fn fail_model(&self, model: impl Into<String>, error: impl Into<String>) {
        self.failing_models.lock().insert(model.into(), error.into());
    }

    /// Lets `model` answer again.
    pub fn recover_model(&self, model: &str) {
        self.failing_models.lock().remove(model);
    }

    /// Enables image generation with fixed bytes.
    #[must_use]
    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image = Some(Ok(bytes));
        self
    }

    /// Enables image generation that always fails.
    #[must_use]
    pub fn with_image_error(mut self, error: impl Into<String>) -> Self {
        self.image = Some(Err(error.into()));
        self
    }

    /// Models requested so far, in order.
    #[must_use]
    pub fn models_called(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.model.clone()).collect()
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(request.clone());

        if let Some(error) = self.failing_models.lock().get(&request.model) {
            return Err(ContentFlowError::provider(&self.name, error.clone()));
        }

        let content = {
            let mut responses = self.responses.lock();
            if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            }
        }
        .unwrap_or_else(|| accepted_rewrite("Mock Headline"));

        Ok(ChatResponse {
            content,
            model: request.model.clone(),
            provider: self.name.clone(),
            finish_reason: Some("stop".to_string()),
            usage: TokenUsage::new(10, 20),
        })
    }

    async fn generate_image(&self, _request: &ImageRequest) -> Result<Vec<u8>> {
        match &self.image {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(error)) => Err(ContentFlowError::provider(&self.name, error.clone())),
            None => Err(ContentFlowError::provider(&self.name, "image generation is not supported")),
        }
    }

    fn supports_image_generation(&self) -> bool {
        self.image.is_some()
    }
}

/// A content source with canned content.
#[derive(Debug)]
pub struct MockContentSource {
    name: String,
    pattern: Option<String>,
    content: String,
    title: Option<String>,
    error: Option<String>,
    fetched: Mutex<Vec<String>>,
}

impl MockContentSource {
    /// Creates a source that supports nothing until given a pattern.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
            content: "Mock article body with enough words to rewrite.".to_string(),
            title: None,
            error: None,
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Supports identifiers containing `pattern`.
    #[must_use]
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Sets the fetched body.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the fetched title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Makes every fetch fail.
    #[must_use]
    pub fn failing(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Identifiers fetched so far.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, identifier: &str) -> bool {
        self.pattern.as_deref().is_some_and(|p| identifier.contains(p))
    }

    async fn fetch(&self, identifier: &str) -> Result<FetchedContent> {
        self.fetched.lock().push(identifier.to_string());
        if let Some(error) = &self.error {
            return Err(ContentFlowError::source(&self.name, error.clone()));
        }
        Ok(FetchedContent::new(self.content.clone(), self.title.clone())
            .with_meta("source_driver", self.name.clone())
            .with_meta("url", identifier))
    }
}

/// A publisher that records calls.
#[derive(Debug)]
pub struct MockPublisher {
    channel: String,
    supported: bool,
    always_fail: Option<String>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MockPublisher {
    /// Creates a publisher that always succeeds.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            supported: true,
            always_fail: None,
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a publisher that always fails.
    #[must_use]
    pub fn failing(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            always_fail: Some(error.into()),
            ..Self::new(channel)
        }
    }

    /// Declines every article.
    #[must_use]
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Fails the first `times` calls.
    #[must_use]
    pub fn fail_times(self, times: usize) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    /// Number of publish calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn supports(&self, _article: &Article) -> bool {
        self.supported
    }

    async fn publish(&self, article: &Article) -> Result<PublishResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.always_fail {
            return Err(ContentFlowError::publish(&self.channel, error.clone()));
        }
        let transient = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(ContentFlowError::publish(&self.channel, "transient failure"));
        }
        Ok(PublishResult::success(&self.channel)
            .with_external_id(format!("{}-{}", self.channel, article.id)))
    }
}

/// An image generator that names files by call count.
#[derive(Debug, Default)]
pub struct MockImageGenerator {
    prompts: Mutex<Vec<String>>,
    error: Mutex<Option<String>>,
}

impl MockImageGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes generation fail until [`recover`](Self::recover).
    pub fn fail_with(&self, error: impl Into<String>) {
        *self.error.lock() = Some(error.into());
    }

    /// Lets generation succeed again.
    pub fn recover(&self) {
        *self.error.lock() = None;
    }

    /// Prompts of successful generations.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ImageGeneration for MockImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Some(error) = self.error.lock().clone() {
            return Err(ContentFlowError::Image(error));
        }
        let mut prompts = self.prompts.lock();
        prompts.push(prompt.to_string());
        Ok(format!("articles/generated-{}.png", prompts.len()))
    }
}

/// An optimiser that swaps the extension for `.webp`.
#[derive(Debug, Default)]
pub struct MockImageOptimizer {
    paths: Mutex<Vec<String>>,
}

impl MockImageOptimizer {
    /// Creates an optimiser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths optimised so far.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

#[async_trait]
impl ImageOptimization for MockImageOptimizer {
    async fn optimize(&self, path: &str) -> Result<String> {
        self.paths.lock().push(path.to_string());
        let stem = path.rsplit_once('.').map_or(path, |(stem, _)| stem);
        Ok(format!("{stem}.webp"))
    }
}

/// A pipe that fails a number of times, then passes the payload on.
#[derive(Debug)]
pub struct FailingPipe {
    name: String,
    error: String,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FailingPipe {
    /// Creates a pipe that always fails.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            failures_left: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails only the first `times` calls.
    #[must_use]
    pub fn times(self, times: usize) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    /// Number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pipe for FailingPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow::anyhow!("{}", self.error).into());
        }
        ctx.completed(None);
        Ok(next.call(payload.clone()))
    }
}

/// A pipe that records each payload it sees and tags it with its name.
#[derive(Debug)]
pub struct RecordingPipe {
    name: String,
    seen: Mutex<Vec<ContentPayload>>,
}

impl RecordingPipe {
    /// Creates a recording pipe.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Payloads received so far.
    #[must_use]
    pub fn seen(&self) -> Vec<ContentPayload> {
        self.seen.lock().clone()
    }

    /// Number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Pipe for RecordingPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, _ctx: &StageContext) -> Result<StageFlow> {
        self.seen.lock().push(payload.clone());
        Ok(next.call(payload.with(PayloadPatch::new().extra(self.name.clone(), true))))
    }
}

/// A pipe that rejects the payload and halts.
#[derive(Debug)]
pub struct RejectingPipe {
    name: String,
    reason: String,
}

impl RejectingPipe {
    /// Creates a rejecting pipe.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Pipe for RejectingPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, payload: &ContentPayload, _next: Next, ctx: &StageContext) -> Result<StageFlow> {
        ctx.rejected(&self.reason);
        Ok(StageFlow::halt(payload.with(PayloadPatch::new().reject(self.reason.clone()))))
    }
}

/// A pipe that sleeps before passing the payload on.
#[derive(Debug)]
pub struct SlowPipe {
    name: String,
    delay: Duration,
}

impl SlowPipe {
    /// Creates a slow pipe.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Pipe for SlowPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, _ctx: &StageContext) -> Result<StageFlow> {
        tokio::time::sleep(self.delay).await;
        Ok(next.call(payload.clone()))
    }
}
