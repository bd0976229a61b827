//! Durable run records and checkpoints.
//!
//! A [`PipelineRun`] tracks one execution: which stages it was started
//! with, the index of the next stage to execute, the last good payload
//! snapshot and any error. Stores apply [`RunUpdate`]s, which are partial
//! and validated against the run status state machine.

mod file;
mod memory;

pub use file::JsonFileRunStore;
pub use memory::InMemoryRunStore;

use crate::core::RunStatus;
use crate::errors::{ContentFlowError, Result};
use crate::payload::{ContentPayload, PayloadSnapshot};
use crate::utils::Timestamp;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// One pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Run id.
    pub id: Uuid,
    /// Source locator of the input.
    pub source_url: Option<String>,
    /// Staged input, if the run came from one.
    pub staged_content_id: Option<i64>,
    /// Produced article.
    pub article_id: Option<i64>,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Next stage to execute (0-based).
    pub current_stage_index: usize,
    /// Label of the stage last started.
    pub current_stage_name: Option<String>,
    /// Stage identifiers frozen at creation.
    pub stages: Vec<String>,
    /// Last good payload.
    pub payload_snapshot: Option<PayloadSnapshot>,
    /// Stage that failed.
    pub error_stage: Option<String>,
    /// Failure message or rejection reason.
    pub error_message: Option<String>,
    /// When the first stage started.
    pub started_at: Option<Timestamp>,
    /// When the run completed or was rejected.
    pub completed_at: Option<Timestamp>,
    /// When the run last failed.
    pub failed_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl PipelineRun {
    /// Creates a pending run for a payload and a resolved stage list.
    #[must_use]
    pub fn new(stages: Vec<String>, payload: &ContentPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            source_url: payload.source_url().map(String::from),
            staged_content_id: payload.staged_content_id(),
            article_id: None,
            status: RunStatus::Pending,
            current_stage_index: 0,
            current_stage_name: None,
            stages,
            payload_snapshot: Some(payload.to_snapshot()),
            error_stage: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the run may be resumed.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        self.status.is_resumable()
    }

    /// Returns true if the run can never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Identifier of the stage at the current index, if any remain.
    #[must_use]
    pub fn stage_short_name(&self) -> Option<&str> {
        self.stages.get(self.current_stage_index).map(String::as_str)
    }

    /// Number of stages still to execute.
    #[must_use]
    pub fn remaining_stages(&self) -> &[String] {
        self.stages.get(self.current_stage_index..).unwrap_or_default()
    }

    /// Time from the first stage to completion or failure.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let ended = self.completed_at.or(self.failed_at)?;
        (ended - started).to_std().ok()
    }
}

/// A partial update to a run.
///
/// Only the fields that are set are written. `started_at` is written only
/// if the run has not started before.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunUpdate {
    /// New status.
    pub status: Option<RunStatus>,
    /// New stage index.
    pub current_stage_index: Option<usize>,
    /// New stage label.
    pub current_stage_name: Option<String>,
    /// Replacement stage list.
    pub stages: Option<Vec<String>>,
    /// New checkpoint.
    pub payload_snapshot: Option<PayloadSnapshot>,
    /// Produced article.
    pub article_id: Option<i64>,
    /// Failing stage.
    pub error_stage: Option<String>,
    /// Error message or rejection reason.
    pub error_message: Option<String>,
    /// Start time.
    pub started_at: Option<Timestamp>,
    /// Completion time.
    pub completed_at: Option<Timestamp>,
    /// Failure time.
    pub failed_at: Option<Timestamp>,
}

impl RunUpdate {
    /// A stage started.
    #[must_use]
    pub fn running(index: usize, stage_name: impl Into<String>) -> Self {
        Self {
            status: Some(RunStatus::Running),
            current_stage_index: Some(index),
            current_stage_name: Some(stage_name.into()),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// A stage succeeded; `next_index` is the stage to run next.
    #[must_use]
    pub fn stage_completed(next_index: usize, snapshot: PayloadSnapshot) -> Self {
        Self::default().with_checkpoint(next_index, snapshot)
    }

    /// A stage threw.
    #[must_use]
    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(RunStatus::Failed),
            error_stage: Some(stage.into()),
            error_message: Some(message.into()),
            failed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Content was refused.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: Some(RunStatus::Rejected),
            error_message: Some(reason.into()),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// All stages ran.
    #[must_use]
    pub fn completed(article_id: Option<i64>) -> Self {
        Self {
            status: Some(RunStatus::Completed),
            article_id,
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Adds a checkpoint.
    #[must_use]
    pub fn with_checkpoint(mut self, index: usize, snapshot: PayloadSnapshot) -> Self {
        self.current_stage_index = Some(index);
        self.payload_snapshot = Some(snapshot);
        self
    }

    /// Applies the update, validating any status change.
    pub fn apply(self, run: &mut PipelineRun) -> Result<()> {
        if let Some(next) = self.status {
            if !run.status.can_transition_to(next) {
                return Err(ContentFlowError::InvalidTransition {
                    from: run.status,
                    to: next,
                });
            }
            run.status = next;
        }

        if let Some(index) = self.current_stage_index {
            run.current_stage_index = index;
        }
        if let Some(name) = self.current_stage_name {
            run.current_stage_name = Some(name);
        }
        if let Some(stages) = self.stages {
            run.stages = stages;
        }
        if let Some(snapshot) = self.payload_snapshot {
            run.payload_snapshot = Some(snapshot);
        }
        if let Some(article_id) = self.article_id {
            run.article_id = Some(article_id);
        }
        if let Some(stage) = self.error_stage {
            run.error_stage = Some(stage);
        }
        if let Some(message) = self.error_message {
            run.error_message = Some(message);
        }
        if run.started_at.is_none() {
            run.started_at = self.started_at;
        }
        if let Some(at) = self.completed_at {
            run.completed_at = Some(at);
        }
        if let Some(at) = self.failed_at {
            run.failed_at = Some(at);
        }
        run.updated_at = Utc::now();
        Ok(())
    }
}

/// Durable storage for run records.
///
/// One orchestrator writes one run at a time; implementations only need
/// single-record atomicity.
#[async_trait]
pub trait RunStore: Send + Sync + fmt::Debug {
    /// Stores a new run.
    async fn create(&self, run: PipelineRun) -> Result<PipelineRun>;

    /// Looks up a run.
    async fn get(&self, id: Uuid) -> Result<Option<PipelineRun>>;

    /// Applies a partial update and returns the updated run.
    ///
    /// Fails with `RunNotFound` for an unknown id and `InvalidTransition`
    /// for an illegal status change, leaving the stored run untouched.
    async fn update(&self, id: Uuid, update: RunUpdate) -> Result<PipelineRun>;

    /// Lists runs, oldest first, optionally filtered by status.
    async fn list(&self, status: Option<RunStatus>) -> Result<Vec<PipelineRun>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run() -> PipelineRun {
        PipelineRun::new(
            vec!["fetch".to_string(), "rewrite".to_string()],
            &ContentPayload::from_url("https://example.com/a"),
        )
    }

    #[test]
    fn test_new_run_is_pending_with_initial_snapshot() {
        let run = run();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.source_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(run.stage_short_name(), Some("fetch"));
        assert!(run.payload_snapshot.is_some());
        assert!(!run.is_resumable());
    }

    #[test]
    fn test_started_at_is_set_once() {
        let mut run = run();
        RunUpdate::running(0, "Fetch").apply(&mut run).unwrap();
        let first = run.started_at;
        RunUpdate::running(1, "AI Rewrite").apply(&mut run).unwrap();
        assert_eq!(run.started_at, first);
        assert_eq!(run.current_stage_name.as_deref(), Some("AI Rewrite"));
    }

    #[test]
    fn test_failed_then_resumable() {
        let mut run = run();
        RunUpdate::running(1, "AI Rewrite").apply(&mut run).unwrap();
        RunUpdate::failed("rewrite", "timeout")
            .with_checkpoint(1, ContentPayload::from_text("x").to_snapshot())
            .apply(&mut run)
            .unwrap();

        assert!(run.is_resumable());
        assert_eq!(run.error_stage.as_deref(), Some("rewrite"));
        assert_eq!(run.remaining_stages(), ["rewrite".to_string()]);
        assert!(run.duration().is_some());
    }

    #[test]
    fn test_terminal_runs_reject_updates() {
        let mut run = run();
        RunUpdate::running(0, "Fetch").apply(&mut run).unwrap();
        RunUpdate::completed(Some(3)).apply(&mut run).unwrap();
        assert!(run.is_terminal());

        let err = RunUpdate::running(0, "Fetch").apply(&mut run).unwrap_err();
        assert!(matches!(err, ContentFlowError::InvalidTransition { .. }));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.article_id, Some(3));
    }

    #[test]
    fn test_pending_cannot_fail_directly() {
        let mut run = run();
        assert!(RunUpdate::failed("fetch", "boom").apply(&mut run).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let run = run();
        let json = serde_json::to_string(&run).unwrap();
        let back: PipelineRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back, run);
    }
}
