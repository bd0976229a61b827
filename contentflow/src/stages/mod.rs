//! Pipe trait, built-in stages and the stage registry.
//!
//! A stage ("pipe") receives the current payload and a [`Next`]
//! continuation. Calling `next.call(payload)` hands the derived payload on;
//! returning [`StageFlow::Halt`] stops the run. Stages report progress and
//! emit business events through their [`StageContext`]; errors propagate to
//! the orchestrator.

mod context;
mod fetch;
mod generate_image;
mod optimize_image;
mod persist;
mod ports;
mod publish;
mod result;
mod rewrite;

pub use context::{ProgressCallback, StageContext};
pub use fetch::FetchStage;
pub use generate_image::GenerateImageStage;
pub use optimize_image::OptimizeImageStage;
pub use persist::PersistStage;
pub use ports::StagePorts;
pub use publish::PublishStage;
pub use result::StageFlow;
pub use rewrite::RewriteStage;

use crate::errors::{ContentFlowError, Result};
use crate::payload::ContentPayload;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;

/// Continuation handed to a stage.
///
/// Only the orchestrator can create one, so a stage cannot continue a run
/// it was not asked to continue.
#[derive(Debug)]
#[must_use]
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }

    /// Hands the payload to the next stage.
    pub fn call(self, payload: ContentPayload) -> StageFlow {
        StageFlow::Continue(payload)
    }
}

/// A unit of pipeline work.
#[async_trait]
pub trait Pipe: Send + Sync + Debug {
    /// Stable identifier used in stage lists and run records.
    fn name(&self) -> &str;

    /// Human-readable label used in progress lines.
    fn label(&self) -> &str {
        self.name()
    }

    /// Processes the payload.
    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow>;
}

/// The stages shipped with the crate, in default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinStage {
    /// Fetch raw content from the source.
    Fetch,
    /// Rewrite content with the AI.
    Rewrite,
    /// Generate a featured image.
    GenerateImage,
    /// Resize and convert the image.
    OptimizeImage,
    /// Create the article record.
    Persist,
    /// Publish to channels.
    Publish,
}

impl BuiltinStage {
    /// Every built-in stage, in default order.
    pub const ALL: [Self; 6] = [
        Self::Fetch,
        Self::Rewrite,
        Self::GenerateImage,
        Self::OptimizeImage,
        Self::Persist,
        Self::Publish,
    ];

    /// Returns the stage identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Rewrite => "rewrite",
            Self::GenerateImage => "generate_image",
            Self::OptimizeImage => "optimize_image",
            Self::Persist => "persist",
            Self::Publish => "publish",
        }
    }

    /// Returns the progress label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Fetch => "Fetch",
            Self::Rewrite => "AI Rewrite",
            Self::GenerateImage => "Generate Image",
            Self::OptimizeImage => "Optimise Image",
            Self::Persist => "Create Article",
            Self::Publish => "Publish",
        }
    }

    fn build(self, ports: &StagePorts) -> Arc<dyn Pipe> {
        match self {
            Self::Fetch => Arc::new(FetchStage::new(Arc::clone(&ports.sources))),
            Self::Rewrite => Arc::new(RewriteStage::new(Arc::clone(&ports.ai), Arc::clone(&ports.store))),
            Self::GenerateImage => Arc::new(GenerateImageStage::new(Arc::clone(&ports.image_generator))),
            Self::OptimizeImage => Arc::new(OptimizeImageStage::new(Arc::clone(&ports.optimizer))),
            Self::Persist => Arc::new(PersistStage::new(Arc::clone(&ports.store))),
            Self::Publish => Arc::new(PublishStage::new(Arc::clone(&ports.publishers))),
        }
    }
}

impl fmt::Display for BuiltinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinStage {
    type Err = ContentFlowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ContentFlowError::UnknownStage(s.to_string()))
    }
}

/// Maps stage identifiers to pipes.
#[derive(Debug, Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Pipe>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in stage.
    #[must_use]
    pub fn builtin(ports: &StagePorts) -> Self {
        let mut registry = Self::new();
        for stage in BuiltinStage::ALL {
            registry.register(stage.build(ports));
        }
        registry
    }

    /// Registers a pipe under its name, replacing any previous one.
    pub fn register(&mut self, pipe: Arc<dyn Pipe>) -> &mut Self {
        self.stages.insert(pipe.name().to_string(), pipe);
        self
    }

    /// Looks up a stage.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Pipe>> {
        self.stages
            .get(id)
            .cloned()
            .ok_or_else(|| ContentFlowError::UnknownStage(id.to_string()))
    }

    /// Resolves a stage list, failing on the first unknown identifier.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<dyn Pipe>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    /// Returns true if the stage is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.stages.contains_key(id)
    }

    /// Returns the registered identifiers, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stages.keys().cloned().collect();
        ids.sort();
        ids
    }
}
