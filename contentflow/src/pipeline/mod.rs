//! Pipeline orchestration.
//!
//! This module provides:
//! - The [`ContentPipeline`] orchestrator with checkpointing and resume
//! - Per-input run locks
//! - The queued job entry points for processing and publishing

mod job;
mod lock;
mod orchestrator;
mod publish_job;

#[cfg(test)]
mod integration_tests;

pub use job::ProcessContentJob;
pub use lock::{RunLockGuard, RunLocks};
pub use orchestrator::ContentPipeline;
pub use publish_job::{PublishArticleJob, PublishJobOutcome};
