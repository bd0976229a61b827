//! Per-stage execution context.

use crate::config::ContentFlowConfig;
use crate::core::PipelineEvent;
use crate::events::EventSink;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Receives `(stage label, status text)` progress lines.
pub type ProgressCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// What a stage can see of the run it belongs to.
///
/// Status texts are `started`, then exactly one of `completed`,
/// `skipped — <reason>`, `rejected — <reason>` or `failed — <message>`.
pub struct StageContext {
    config: Arc<ContentFlowConfig>,
    events: Arc<dyn EventSink>,
    run_id: Option<Uuid>,
    stage: String,
    progress: Option<ProgressCallback>,
    terminal_reported: AtomicBool,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("stage", &self.stage)
            .field("run_id", &self.run_id)
            .field("has_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl StageContext {
    /// Creates a context for one stage.
    #[must_use]
    pub fn new(
        config: Arc<ContentFlowConfig>,
        events: Arc<dyn EventSink>,
        stage: impl Into<String>,
    ) -> Self {
        Self {
            config,
            events,
            run_id: None,
            stage: stage.into(),
            progress: None,
            terminal_reported: AtomicBool::new(false),
        }
    }

    /// Sets the run id.
    #[must_use]
    pub const fn with_run_id(mut self, run_id: Option<Uuid>) -> Self {
        self.run_id = run_id;
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContentFlowConfig {
        &self.config
    }

    /// Returns the run id, if the run is tracked.
    #[must_use]
    pub const fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Returns the stage label.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    fn report(&self, status: &str) {
        debug!(stage = %self.stage, status = %status, "Stage progress");
        if let Some(progress) = &self.progress {
            progress(&self.stage, status);
        }
    }

    fn report_terminal(&self, status: &str) {
        self.terminal_reported.store(true, Ordering::SeqCst);
        self.report(status);
    }

    /// Reports that the stage started.
    pub fn started(&self) {
        self.report("started");
    }

    /// Reports success, with optional detail.
    pub fn completed(&self, detail: Option<&str>) {
        match detail {
            Some(detail) => self.report_terminal(&format!("completed — {detail}")),
            None => self.report_terminal("completed"),
        }
    }

    /// Reports a business skip.
    pub fn skipped(&self, reason: &str) {
        self.report_terminal(&format!("skipped — {reason}"));
    }

    /// Reports a rejection.
    pub fn rejected(&self, reason: &str) {
        self.report_terminal(&format!("rejected — {reason}"));
    }

    /// Reports a failure.
    pub fn failed(&self, message: &str) {
        self.report_terminal(&format!("failed — {message}"));
    }

    /// Returns true once a terminal status has been reported.
    #[must_use]
    pub fn has_reported_terminal(&self) -> bool {
        self.terminal_reported.load(Ordering::SeqCst)
    }

    /// Emits a business event.
    pub async fn emit(&self, event: PipelineEvent) {
        self.events.emit_event(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::payload::ContentPayload;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_progress_lines_and_terminal_flag() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let ctx = StageContext::new(
            Arc::new(ContentFlowConfig::default()),
            Arc::new(CollectingEventSink::new()),
            "Fetch",
        )
        .with_progress(Some(Arc::new(move |stage: &str, status: &str| {
            sink.lock().push(format!("{stage}: {status}"));
        })));

        ctx.started();
        assert!(!ctx.has_reported_terminal());
        ctx.skipped("content already present");
        assert!(ctx.has_reported_terminal());

        assert_eq!(
            *lines.lock(),
            vec![
                "Fetch: started".to_string(),
                "Fetch: skipped — content already present".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_emit_goes_to_sink() {
        let events = Arc::new(CollectingEventSink::new());
        let ctx = StageContext::new(
            Arc::new(ContentFlowConfig::default()),
            events.clone(),
            "Create Article",
        );

        ctx.emit(PipelineEvent::ArticleCreated {
            article_id: 1,
            payload: ContentPayload::new().to_snapshot(),
        })
        .await;

        assert_eq!(events.event_types(), vec!["article.created"]);
    }
}
