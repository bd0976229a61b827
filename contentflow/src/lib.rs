//! # Contentflow
//!
//! A resumable, staged content pipeline.
//!
//! A source URL, free text or a staged input is carried through ordered
//! stages (fetch, AI rewrite, image generation, image optimisation,
//! persistence, multi-channel publishing) as an immutable
//! [`ContentPayload`](payload::ContentPayload). Contentflow provides:
//!
//! - **Checkpointed runs**: each run records its stage list and a payload
//!   snapshot after every successful stage, so a failed run resumes at the
//!   exact stage that failed
//! - **Two failure channels**: business rejections end a run cleanly, stage
//!   errors are recorded and then halt or continue per policy
//! - **Named resolvers**: AI providers, content sources and publish channels
//!   are picked by name from configuration and extensible at runtime
//! - **Injected collaborators**: stores, event sinks and configuration are
//!   passed in explicitly
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentflow::prelude::*;
//!
//! let config = Arc::new(ContentFlowConfig::from_file("contentflow.json")?.with_env_overrides());
//! let ports = StagePorts::from_config(config.clone(), store.clone(), publish_logs);
//!
//! let mut pipeline = ContentPipeline::new(config, StageRegistry::builtin(&ports), store)
//!     .with_run_store(Arc::new(JsonFileRunStore::open("runs").await?))
//!     .with_event_sink(Arc::new(LoggingEventSink::default()));
//!
//! let payload = pipeline.process(ContentPayload::from_url("https://example.com/post")).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod ai;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod media;
pub mod payload;
pub mod pipeline;
pub mod publishing;
pub mod runs;
pub mod sources;
pub mod stages;
pub mod store;
pub mod telemetry;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::ai::{
        AiProvider, AiProviderManager, AiService, ImageGeneration, ImageGenerator, SeoSuggester,
        SeoSuggestion,
    };
    pub use crate::config::ContentFlowConfig;
    pub use crate::core::{ArticleStatus, PipelineEvent, PublishStatus, RunStatus};
    pub use crate::errors::{ContentFlowError, Result};
    pub use crate::events::{
        ChannelEventSink, CollectingEventSink, EventSink, FanOutEventSink, LoggingEventSink,
        NoOpEventSink,
    };
    pub use crate::media::{ImageOptimization, ImageOptimizer};
    pub use crate::payload::{ContentPayload, PayloadPatch, PayloadSnapshot};
    pub use crate::pipeline::{
        ContentPipeline, ProcessContentJob, PublishArticleJob, PublishJobOutcome, RunLocks,
    };
    pub use crate::publishing::{PublishResult, Publisher, PublisherManager};
    pub use crate::runs::{InMemoryRunStore, JsonFileRunStore, PipelineRun, RunStore, RunUpdate};
    pub use crate::sources::{ContentSource, ContentSourceManager, FetchedContent};
    pub use crate::stages::{
        BuiltinStage, Next, Pipe, ProgressCallback, StageContext, StageFlow, StagePorts,
        StageRegistry,
    };
    pub use crate::store::{
        Article, ContentStore, InMemoryContentStore, InMemoryPublishLogStore, PublishLogStore,
        StagedContent,
    };
    pub use crate::telemetry::{init_tracing, TelemetryConfig};
}
