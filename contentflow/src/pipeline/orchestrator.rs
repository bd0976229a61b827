//! The run orchestrator.

use super::lock::{RunLockGuard, RunLocks};
use crate::config::ContentFlowConfig;
use crate::core::{PipelineEvent, RunStatus};
use crate::errors::{ContentFlowError, Result};
use crate::events::{EventSink, NoOpEventSink};
use crate::payload::{ContentPayload, PayloadPatch};
use crate::runs::{PipelineRun, RunStore, RunUpdate};
use crate::stages::{Next, Pipe, ProgressCallback, StageContext, StageRegistry};
use crate::store::ContentStore;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs payloads through an ordered list of stages.
///
/// Every run is optionally tracked by a [`RunStore`]: the stage list is
/// frozen at creation and a payload checkpoint is written after each
/// successful stage, so a `Failed` run can be resumed at the exact stage
/// that failed.
///
/// # Example
///
/// ```ignore
/// let mut pipeline = ContentPipeline::new(config, registry, store)
///     .with_run_store(runs)
///     .on_progress(Arc::new(|stage, status| println!("{stage}: {status}")));
///
/// let payload = pipeline.process(ContentPayload::from_url(url)).await?;
/// ```
pub struct ContentPipeline {
    config: Arc<ContentFlowConfig>,
    registry: StageRegistry,
    store: Arc<dyn ContentStore>,
    runs: Option<Arc<dyn RunStore>>,
    events: Arc<dyn EventSink>,
    locks: RunLocks,
    track_runs: bool,
    stage_override: Option<Vec<String>>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for ContentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPipeline")
            .field("stages", &self.config.pipeline.stages)
            .field("registry", &self.registry.ids())
            .field("tracking", &self.tracking_enabled())
            .field("stage_override", &self.stage_override)
            .field("has_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

/// Where a run starts and which record it writes to.
struct RunPlan {
    run_id: Option<Uuid>,
    stages: Vec<Arc<dyn Pipe>>,
    start: usize,
    progress: Option<ProgressCallback>,
}

impl ContentPipeline {
    /// Creates an orchestrator without a run store.
    ///
    /// Tracking follows `config.pipeline.track_runs`; when enabled a run
    /// store must be supplied with [`ContentPipeline::with_run_store`]
    /// before the first call.
    #[must_use]
    pub fn new(config: Arc<ContentFlowConfig>, registry: StageRegistry, store: Arc<dyn ContentStore>) -> Self {
        let track_runs = config.pipeline.track_runs;
        Self {
            config,
            registry,
            store,
            runs: None,
            events: Arc::new(NoOpEventSink),
            locks: RunLocks::new(),
            track_runs,
            stage_override: None,
            progress: None,
        }
    }

    /// Sets the run store.
    #[must_use]
    pub fn with_run_store(mut self, runs: Arc<dyn RunStore>) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Shares a lock set with other orchestrators.
    #[must_use]
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Disables run tracking for this orchestrator only.
    #[must_use]
    pub const fn without_tracking(mut self) -> Self {
        self.track_runs = false;
        self
    }

    /// Overrides the stage list for the next `process` call only.
    #[must_use]
    pub fn through<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage_override = Some(stages.into_iter().map(Into::into).collect());
        self
    }

    /// Registers a progress callback for the next `process` or `resume`
    /// call only.
    #[must_use]
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContentFlowConfig {
        &self.config
    }

    /// Returns the content store.
    #[must_use]
    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    /// Returns the lock set.
    #[must_use]
    pub const fn locks(&self) -> &RunLocks {
        &self.locks
    }

    /// Returns true if runs are recorded.
    #[must_use]
    pub fn tracking_enabled(&self) -> bool {
        self.track_runs && self.config.pipeline.track_runs
    }

    fn run_store(&self) -> Result<Option<Arc<dyn RunStore>>> {
        if !self.tracking_enabled() {
            return Ok(None);
        }
        self.runs
            .clone()
            .map(Some)
            .ok_or(ContentFlowError::TrackingNotProvisioned)
    }

    fn lock(&self, staged_content_id: Option<i64>, source_url: Option<&str>) -> Result<Option<RunLockGuard>> {
        RunLocks::key_for(staged_content_id, source_url)
            .map(|key| self.locks.acquire(&key))
            .transpose()
    }

    /// Runs `payload` through the stage list from the first stage.
    ///
    /// # Errors
    ///
    /// Precondition errors (`TrackingNotProvisioned`, `UnknownStage`,
    /// `AlreadyRunning`, ...) and `Timeout`. Stage failures are recorded
    /// on the run and handled by the halt policy instead.
    ///
    /// A precondition error raised inside a stage (a missing API key, an
    /// unknown channel) is recorded and then returned even when
    /// `halt_on_error` is off: the continue policy never applies to it, so
    /// later stages do not run.
    pub async fn process(&mut self, payload: ContentPayload) -> Result<ContentPayload> {
        let progress = self.progress.take();
        let stage_ids = self
            .stage_override
            .take()
            .unwrap_or_else(|| self.config.pipeline.stages.clone());

        let runs = self.run_store()?;
        let stages = self.registry.resolve(&stage_ids)?;
        let _guard = self.lock(payload.staged_content_id(), payload.source_url())?;

        let run_id = match runs {
            Some(runs) => Some(runs.create(PipelineRun::new(stage_ids.clone(), &payload)).await?.id),
            None => None,
        };
        info!(run_id = ?run_id, stages = ?stage_ids, "Pipeline run started");

        let plan = RunPlan {
            run_id,
            stages,
            start: 0,
            progress,
        };
        self.run_within_budget(plan, payload).await
    }

    /// Resumes a failed run by id.
    ///
    /// # Errors
    ///
    /// `RunNotFound` for an unknown id, plus everything
    /// [`ContentPipeline::resume_run`] returns.
    pub async fn resume(&mut self, run_id: Uuid) -> Result<ContentPayload> {
        let progress = self.progress.take();
        let runs = self.runs.clone().ok_or(ContentFlowError::TrackingNotProvisioned)?;
        let run = runs
            .get(run_id)
            .await?
            .ok_or_else(|| ContentFlowError::RunNotFound(run_id.to_string()))?;
        self.resume_with(run, progress).await
    }

    /// Resumes a failed run at its recorded stage, with the stage list
    /// frozen when it was created.
    ///
    /// # Errors
    ///
    /// `NotResumable` unless the run is `Failed`, `TrackingNotProvisioned`
    /// without a run store, `UnknownStage` if a frozen stage is no longer
    /// registered, `AlreadyRunning` and `Timeout`.
    pub async fn resume_run(&mut self, run: PipelineRun) -> Result<ContentPayload> {
        let progress = self.progress.take();
        self.resume_with(run, progress).await
    }

    async fn resume_with(&self, run: PipelineRun, progress: Option<ProgressCallback>) -> Result<ContentPayload> {
        if self.runs.is_none() {
            return Err(ContentFlowError::TrackingNotProvisioned);
        }
        if !run.is_resumable() {
            return Err(ContentFlowError::NotResumable {
                run_id: run.id.to_string(),
                status: run.status,
            });
        }

        let stages = self.registry.resolve(&run.stages)?;
        let _guard = self.lock(run.staged_content_id, run.source_url.as_deref())?;

        let payload = match run.payload_snapshot.clone() {
            Some(snapshot) => ContentPayload::from_snapshot(snapshot, self.store.as_ref()).await?,
            None => run
                .source_url
                .clone()
                .map_or_else(ContentPayload::new, |url| ContentPayload::from_url(url)),
        };
        info!(
            run_id = %run.id,
            index = run.current_stage_index,
            stage = run.stage_short_name().unwrap_or("-"),
            "Pipeline run resumed"
        );

        let plan = RunPlan {
            run_id: Some(run.id),
            stages,
            start: run.current_stage_index,
            progress,
        };
        self.run_within_budget(plan, payload).await
    }

    async fn run_within_budget(&self, plan: RunPlan, payload: ContentPayload) -> Result<ContentPayload> {
        let budget = self.config.pipeline.run_timeout();
        let run_id = plan.run_id;
        match tokio::time::timeout(budget, self.execute(plan, payload)).await {
            Ok(result) => result,
            Err(_) => {
                let seconds = budget.as_secs();
                self.record_timeout(run_id, seconds).await;
                Err(ContentFlowError::Timeout { seconds })
            }
        }
    }

    async fn execute(&self, plan: RunPlan, mut payload: ContentPayload) -> Result<ContentPayload> {
        let RunPlan {
            run_id,
            stages,
            start,
            progress,
        } = plan;

        self.events
            .emit_event(&PipelineEvent::Started {
                run_id,
                payload: payload.to_snapshot(),
            })
            .await;

        let mut failed = false;
        for (index, pipe) in stages.iter().enumerate().skip(start) {
            let label = pipe.label().to_string();
            self.record(run_id, RunUpdate::running(index, label.clone())).await?;

            let ctx = StageContext::new(Arc::clone(&self.config), Arc::clone(&self.events), label.clone())
                .with_run_id(run_id)
                .with_progress(progress.clone());
            ctx.started();
            let started = Instant::now();

            match pipe.handle(&payload, Next::new(), &ctx).await {
                Ok(flow) if flow.is_rejected() => {
                    let rejected = flow.into_payload();
                    let reason = rejected
                        .rejection_reason()
                        .unwrap_or("Content rejected")
                        .to_string();
                    if !ctx.has_reported_terminal() {
                        ctx.rejected(&reason);
                    }
                    info!(run_id = ?run_id, stage = %pipe.name(), index, reason = %reason, "Content rejected");

                    self.record(
                        run_id,
                        RunUpdate::rejected(reason.clone()).with_checkpoint(index, payload.to_snapshot()),
                    )
                    .await?;
                    self.events
                        .emit_event(&PipelineEvent::Failed {
                            run_id,
                            reason,
                            stage: Some(pipe.name().to_string()),
                            payload: rejected.to_snapshot(),
                        })
                        .await;
                    return Ok(rejected);
                }
                Ok(flow) => {
                    let halted = flow.is_halt();
                    payload = flow.into_payload();
                    self.record(run_id, RunUpdate::stage_completed(index + 1, payload.to_snapshot()))
                        .await?;
                    if !ctx.has_reported_terminal() {
                        ctx.completed(None);
                    }
                    info!(
                        run_id = ?run_id,
                        stage = %pipe.name(),
                        index,
                        duration_ms = %started.elapsed().as_millis(),
                        "Stage completed"
                    );
                    if halted {
                        info!(run_id = ?run_id, stage = %pipe.name(), "Stage halted the run");
                        break;
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    ctx.failed(&message);
                    error!(run_id = ?run_id, stage = %pipe.name(), index, error = %message, "Stage failed");

                    self.record(
                        run_id,
                        RunUpdate::failed(pipe.name(), message.clone()).with_checkpoint(index, payload.to_snapshot()),
                    )
                    .await?;
                    self.events
                        .emit_event(&PipelineEvent::Failed {
                            run_id,
                            reason: message.clone(),
                            stage: Some(pipe.name().to_string()),
                            payload: payload.to_snapshot(),
                        })
                        .await;

                    if err.is_precondition() {
                        return Err(err);
                    }
                    if self.config.pipeline.halt_on_error {
                        payload = payload.with(PayloadPatch::new().reject(format!("Stage '{label}' failed: {message}")));
                        failed = true;
                        break;
                    }
                    warn!(run_id = ?run_id, stage = %pipe.name(), "Continuing after stage failure");
                }
            }
        }

        if payload.is_rejected() {
            // A halted failure keeps the run Failed so it stays resumable.
            if !failed {
                let reason = payload.rejection_reason().unwrap_or("Content rejected").to_string();
                self.record(run_id, RunUpdate::rejected(reason.clone())).await?;
                self.events
                    .emit_event(&PipelineEvent::Failed {
                        run_id,
                        reason,
                        stage: None,
                        payload: payload.to_snapshot(),
                    })
                    .await;
            }
            info!(run_id = ?run_id, "Pipeline run finished without an article");
            return Ok(payload);
        }

        let article_id = payload.article_id();
        self.record(run_id, RunUpdate::completed(article_id)).await?;
        self.events
            .emit_event(&PipelineEvent::Completed {
                run_id,
                article_id,
                payload: payload.to_snapshot(),
            })
            .await;
        info!(run_id = ?run_id, article_id = ?article_id, "Pipeline run completed");
        Ok(payload)
    }

    async fn record(&self, run_id: Option<Uuid>, update: RunUpdate) -> Result<()> {
        if let (Some(id), Some(runs)) = (run_id, self.runs.as_ref()) {
            runs.update(id, update).await?;
        }
        Ok(())
    }

    async fn record_timeout(&self, run_id: Option<Uuid>, seconds: u64) {
        let message = format!("Pipeline run timed out after {seconds}s");
        error!(run_id = ?run_id, seconds, "Pipeline run timed out");

        let run = match (run_id, self.runs.as_ref()) {
            (Some(id), Some(runs)) => match runs.get(id).await {
                Ok(run) => run,
                Err(err) => {
                    warn!(run_id = %id, error = %err, "Could not load timed-out run");
                    None
                }
            },
            _ => None,
        };

        let payload = run
            .as_ref()
            .and_then(|r| r.payload_snapshot.clone())
            .unwrap_or_default();
        let stage = run
            .as_ref()
            .and_then(|r| r.stage_short_name().map(String::from))
            .unwrap_or_else(|| "pipeline".to_string());

        if let Some(run) = &run {
            if run.status == RunStatus::Pending {
                warn!(run_id = %run.id, "Run timed out before its first stage");
            } else if let Some(runs) = self.runs.as_ref() {
                if let Err(err) = runs.update(run.id, RunUpdate::failed(stage.clone(), message.clone())).await {
                    warn!(run_id = %run.id, error = %err, "Could not mark timed-out run as failed");
                }
            }
        }

        self.events
            .emit_event(&PipelineEvent::Failed {
                run_id,
                reason: message,
                stage: Some(stage),
                payload,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageFlow;
    use crate::testing::{FailingPipe, Harness, RecordingPipe, RejectingPipe};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct MisconfiguredPipe;

    #[async_trait]
    impl Pipe for MisconfiguredPipe {
        fn name(&self) -> &str {
            "publish"
        }

        async fn handle(&self, _payload: &ContentPayload, _next: Next, _ctx: &StageContext) -> Result<StageFlow> {
            Err(ContentFlowError::UnknownChannel("fax".to_string()))
        }
    }

    fn registry_of(pipes: Vec<Arc<dyn Pipe>>) -> StageRegistry {
        let mut registry = StageRegistry::new();
        for pipe in pipes {
            registry.register(pipe);
        }
        registry
    }

    #[tokio::test]
    async fn test_runs_stages_in_order_and_completes() {
        let harness = Harness::new();
        let a = Arc::new(RecordingPipe::new("a"));
        let b = Arc::new(RecordingPipe::new("b"));
        let mut pipeline = harness
            .pipeline_with(registry_of(vec![a.clone() as Arc<dyn Pipe>, b.clone()]))
            .through(["a", "b"]);

        let payload = pipeline.process(ContentPayload::from_text("body")).await.unwrap();

        assert_eq!(payload.extra().get("a"), Some(&serde_json::Value::Bool(true)));
        assert_eq!(payload.extra().get("b"), Some(&serde_json::Value::Bool(true)));
        assert_eq!(b.seen()[0].extra().get("a"), Some(&serde_json::Value::Bool(true)));

        let runs = harness.runs.list(None).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].current_stage_index, 2);
        assert_eq!(
            harness.events.event_types(),
            vec!["pipeline.started", "pipeline.completed"]
        );
    }

    #[tokio::test]
    async fn test_unknown_stage_fails_before_run_is_created() {
        let harness = Harness::new();
        let mut pipeline = harness.pipeline_with(StageRegistry::new()).through(["missing"]);

        let err = pipeline.process(ContentPayload::from_text("x")).await.unwrap_err();

        assert!(matches!(err, ContentFlowError::UnknownStage(ref id) if id == "missing"));
        assert!(harness.runs.is_empty());
        assert!(harness.events.event_types().is_empty());
    }

    #[tokio::test]
    async fn test_tracking_without_store_fails_loudly() {
        let harness = Harness::new();
        let mut pipeline = ContentPipeline::new(
            Arc::new(harness.config.clone()),
            registry_of(vec![Arc::new(RecordingPipe::new("a")) as Arc<dyn Pipe>]),
            harness.store.clone(),
        )
        .through(["a"]);

        let err = pipeline.process(ContentPayload::from_text("x")).await.unwrap_err();
        assert!(matches!(err, ContentFlowError::TrackingNotProvisioned));
    }

    #[tokio::test]
    async fn test_without_tracking_runs_untracked() {
        let harness = Harness::new();
        let a = Arc::new(RecordingPipe::new("a"));
        let mut pipeline = ContentPipeline::new(
            Arc::new(harness.config.clone()),
            registry_of(vec![a.clone() as Arc<dyn Pipe>]),
            harness.store.clone(),
        )
        .without_tracking()
        .through(["a"]);

        pipeline.process(ContentPayload::from_text("x")).await.unwrap();

        assert_eq!(a.calls(), 1);
        assert!(!pipeline.tracking_enabled());
    }

    #[tokio::test]
    async fn test_rejection_stops_and_checkpoints_pre_stage_payload() {
        let harness = Harness::new();
        let after = Arc::new(RecordingPipe::new("after"));
        let mut pipeline = harness
            .pipeline_with(registry_of(vec![
                Arc::new(RecordingPipe::new("before")) as Arc<dyn Pipe>,
                Arc::new(RejectingPipe::new("gate", "low quality")),
                after.clone(),
            ]))
            .through(["before", "gate", "after"]);

        let payload = pipeline.process(ContentPayload::from_text("x")).await.unwrap();

        assert!(payload.is_rejected());
        assert_eq!(payload.rejection_reason(), Some("low quality"));
        assert_eq!(after.calls(), 0);

        let run = &harness.runs.list(None).await.unwrap()[0];
        assert_eq!(run.status, RunStatus::Rejected);
        assert_eq!(run.current_stage_index, 1);
        assert!(!run.payload_snapshot.as_ref().unwrap().rejected);
        assert_eq!(
            harness.events.event_types(),
            vec!["pipeline.started", "pipeline.failed"]
        );
    }

    #[tokio::test]
    async fn test_precondition_error_in_stage_escapes_after_recording() {
        let harness = Harness::new();
        let mut pipeline = harness
            .pipeline_with(registry_of(vec![Arc::new(MisconfiguredPipe) as Arc<dyn Pipe>]))
            .through(["publish"]);

        let err = pipeline.process(ContentPayload::from_text("x")).await.unwrap_err();

        assert!(matches!(err, ContentFlowError::UnknownChannel(_)));
        let run = &harness.runs.list(None).await.unwrap()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_stage.as_deref(), Some("publish"));
    }

    #[tokio::test]
    async fn test_precondition_error_ignores_continue_policy() {
        let mut harness = Harness::new();
        harness.config.pipeline.halt_on_error = false;
        let after = Arc::new(RecordingPipe::new("after"));
        let mut pipeline = harness
            .pipeline_with(registry_of(vec![Arc::new(MisconfiguredPipe) as Arc<dyn Pipe>, after.clone()]))
            .through(["publish", "after"]);

        let err = pipeline.process(ContentPayload::from_text("x")).await.unwrap_err();

        assert!(err.is_precondition());
        assert_eq!(after.calls(), 0);
        let run = &harness.runs.list(None).await.unwrap()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.current_stage_index, 0);
        assert!(run.is_resumable());
    }

    #[tokio::test]
    async fn test_failure_reports_terminal_progress_line() {
        let harness = Harness::new();
        let mut pipeline = harness
            .pipeline_with(registry_of(vec![Arc::new(FailingPipe::new("boom", "kaput")) as Arc<dyn Pipe>]))
            .through(["boom"]);

        let payload = pipeline.process(ContentPayload::from_text("x")).await.unwrap();

        assert_eq!(payload.rejection_reason(), Some("Stage 'boom' failed: kaput"));
        assert_eq!(harness.progress_lines(), vec!["boom: started", "boom: failed — kaput"]);
    }

    #[tokio::test]
    async fn test_progress_callback_is_one_shot() {
        let harness = Harness::new();
        let mut pipeline = harness
            .pipeline_with(registry_of(vec![Arc::new(RecordingPipe::new("a")) as Arc<dyn Pipe>]))
            .through(["a"]);

        pipeline.process(ContentPayload::from_text("x")).await.unwrap();
        assert_eq!(harness.progress_lines(), vec!["a: started", "a: completed"]);

        harness.clear_progress();
        let mut pipeline = pipeline.through(["a"]);
        pipeline.process(ContentPayload::from_text("y")).await.unwrap();
        assert!(harness.progress_lines().is_empty());
    }
}
