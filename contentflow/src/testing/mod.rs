//! Testing utilities for contentflow pipelines.
//!
//! This module provides:
//! - Mock AI providers, sources, publishers and image services
//! - Mock pipes for orchestrator tests
//! - A harness wiring every port to in-memory stores

mod fixtures;
mod mocks;

pub use fixtures::{accepted_rewrite, run_stage, sample_article, tiny_png, Harness};
pub use mocks::{
    FailingPipe, MockAiProvider, MockContentSource, MockImageGenerator, MockImageOptimizer,
    MockPublisher, RecordingPipe, RejectingPipe, SlowPipe,
};
