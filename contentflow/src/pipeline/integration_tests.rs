//! End-to-end tests for pipeline execution, resume and run tracking.

#[cfg(test)]
mod tests {
    use crate::core::RunStatus;
    use crate::errors::{ContentFlowError, Result};
    use crate::payload::{ContentPayload, PayloadPatch};
    use crate::pipeline::{ContentPipeline, RunLocks};
    use crate::runs::{InMemoryRunStore, JsonFileRunStore, PipelineRun, RunStore};
    use crate::stages::{Next, PersistStage, Pipe, StageContext, StageFlow, StageRegistry};
    use crate::store::{
        Article, ContentStore, InMemoryContentStore, NewArticle, PublishLogStore, StagedContent, Tag,
    };
    use crate::testing::{FailingPipe, Harness, RecordingPipe, SlowPipe};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const URL: &str = "https://news.test/story";

    fn reject_json(reason: &str) -> String {
        serde_json::json!({ "status": "reject", "reject_reasons": [reason] }).to_string()
    }

    async fn only_run(harness: &Harness) -> PipelineRun {
        let runs = harness.runs.list(None).await.unwrap();
        assert_eq!(runs.len(), 1);
        runs.into_iter().next().unwrap()
    }

    /// Reads the run record while it is executing.
    #[derive(Debug)]
    struct CheckpointWatcherPipe {
        name: String,
        runs: Arc<InMemoryRunStore>,
        seen: Arc<Mutex<Vec<(usize, Vec<String>)>>>,
    }

    #[async_trait]
    impl Pipe for CheckpointWatcherPipe {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
            let run = self.runs.get(ctx.run_id().unwrap()).await?.unwrap();
            let snapshot_keys: Vec<String> = run
                .payload_snapshot
                .map(|s| s.extra.keys().cloned().collect())
                .unwrap_or_default();
            self.seen.lock().push((run.current_stage_index, snapshot_keys));
            Ok(next.call(payload.with(PayloadPatch::new().extra(self.name.clone(), true))))
        }
    }

    /// Delegates to an in-memory store; the first tag lookup fails.
    #[derive(Debug)]
    struct FlakyTagStore {
        inner: Arc<InMemoryContentStore>,
        tripped: AtomicBool,
    }

    impl FlakyTagStore {
        fn new(inner: Arc<InMemoryContentStore>) -> Self {
            Self { inner, tripped: AtomicBool::new(false) }
        }
    }

    #[async_trait]
    impl ContentStore for FlakyTagStore {
        async fn create_article(&self, article: NewArticle) -> Result<Article> {
            self.inner.create_article(article).await
        }

        async fn find_article(&self, id: i64) -> Result<Option<Article>> {
            self.inner.find_article(id).await
        }

        async fn first_or_create_tag(&self, name: &str) -> Result<Tag> {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                return Err(ContentFlowError::store("db blip"));
            }
            self.inner.first_or_create_tag(name).await
        }

        async fn categories(&self) -> Result<BTreeMap<i64, String>> {
            self.inner.categories().await
        }

        async fn find_staged_content(&self, id: i64) -> Result<Option<StagedContent>> {
            self.inner.find_staged_content(id).await
        }
    }

    // Scenario A
    #[tokio::test]
    async fn test_ai_rejection_rejects_run_without_article() {
        let harness = Harness::new();
        harness.ai.push_response(reject_json("low quality"));
        let mut pipeline = harness.pipeline().through(["fetch", "rewrite"]);

        let payload = pipeline.process(ContentPayload::from_url(URL)).await.unwrap();

        assert!(payload.is_rejected());
        assert!(payload.rejection_reason().unwrap().contains("low quality"));
        assert_eq!(harness.store.article_count(), 0);

        let run = only_run(&harness).await;
        assert_eq!(run.status, RunStatus::Rejected);
        assert_eq!(run.error_message.as_deref(), Some("low quality"));
        assert!(run.payload_snapshot.unwrap().cleaned_content.is_some());
        assert_eq!(
            harness.progress_lines()[3],
            "AI Rewrite: rejected — low quality".to_string()
        );
    }

    // Scenario B
    #[tokio::test]
    async fn test_stage_failure_with_halt_leaves_run_resumable() {
        let harness = Harness::new();
        harness.images.fail_with("quota exceeded");
        let mut pipeline = harness.pipeline();

        let payload = pipeline.process(ContentPayload::from_url(URL)).await.unwrap();

        assert!(payload.is_rejected());
        let reason = payload.rejection_reason().unwrap();
        assert!(reason.contains("quota exceeded"));
        assert!(reason.starts_with("Stage 'Generate Image' failed"));
        assert_eq!(harness.store.article_count(), 0);

        let run = only_run(&harness).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.is_resumable());
        assert_eq!(run.error_stage.as_deref(), Some("generate_image"));
        assert_eq!(run.current_stage_index, 2);
        assert_eq!(run.stage_short_name(), Some("generate_image"));

        let snapshot = run.payload_snapshot.unwrap();
        assert!(!snapshot.rejected);
        assert_eq!(snapshot.title.as_deref(), Some("Mock Headline"));
        assert!(snapshot.image_path.is_none());

        let failures = harness.events.events_of_type("pipeline.failed");
        assert_eq!(failures.len(), 1);
    }

    // Scenario C
    #[tokio::test]
    async fn test_stage_failure_without_halt_continues_with_last_good_payload() {
        let mut harness = Harness::new();
        harness.config.pipeline.halt_on_error = false;
        harness.images.fail_with("quota exceeded");
        let mut pipeline = harness.pipeline();

        let payload = pipeline.process(ContentPayload::from_url(URL)).await.unwrap();

        assert!(!payload.is_rejected());
        let article = payload.article().unwrap();
        assert!(article.featured_image.is_none());
        assert_eq!(article.title, "Mock Headline");
        assert!(payload.publish_results()["mock"].success);

        let run = only_run(&harness).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.article_id, Some(article.id));
        assert_eq!(run.current_stage_index, 6);
        assert!(harness.optimizer.paths().is_empty());
    }

    // Scenario D
    #[tokio::test]
    async fn test_resume_after_fix_completes_from_failed_stage() {
        let harness = Harness::new();
        harness.images.fail_with("quota exceeded");
        harness.pipeline().process(ContentPayload::from_url(URL)).await.unwrap();
        let failed = only_run(&harness).await;

        harness.images.recover();
        harness.clear_progress();
        let mut pipeline = harness.pipeline();
        let payload = pipeline.resume(failed.id).await.unwrap();

        let article = payload.article().unwrap();
        assert_eq!(article.featured_image.as_deref(), Some("articles/generated-1.webp"));
        assert_eq!(harness.store.article_count(), 1);
        assert_eq!(harness.source.fetched().len(), 1);
        assert_eq!(harness.ai.requests().len(), 1);

        let run = harness.runs.get(failed.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.article_id, Some(article.id));
        assert_eq!(run.error_stage.as_deref(), Some("generate_image"));
        assert_eq!(harness.progress_lines()[0], "Generate Image: started");
    }

    #[tokio::test]
    async fn test_resume_uses_replacement_stage_under_same_id() {
        let harness = Harness::new();
        let mut broken = harness.registry();
        broken.register(Arc::new(FailingPipe::new("generate_image", "quota exceeded")));
        harness
            .pipeline_with(broken)
            .process(ContentPayload::from_url(URL))
            .await
            .unwrap();
        let failed = only_run(&harness).await;
        assert_eq!(failed.status, RunStatus::Failed);

        let payload = harness.pipeline().resume_run(failed).await.unwrap();

        assert!(payload.article().is_some());
        assert_eq!(harness.images.prompts(), vec!["an editorial illustration".to_string()]);
    }

    #[tokio::test]
    async fn test_resume_uses_frozen_stage_list() {
        let mut harness = Harness::new();
        harness.images.fail_with("quota exceeded");
        harness
            .pipeline()
            .through(["fetch", "rewrite", "generate_image"])
            .process(ContentPayload::from_url(URL))
            .await
            .unwrap();
        let failed = only_run(&harness).await;

        harness.images.recover();
        harness.config.pipeline.stages = vec!["fetch".to_string(), "persist".to_string()];
        let payload = harness.pipeline().resume(failed.id).await.unwrap();

        assert_eq!(payload.image_path(), Some("articles/generated-1.png"));
        assert!(payload.article().is_none());
        assert_eq!(harness.store.article_count(), 0);

        let run = harness.runs.get(failed.id).await.unwrap().unwrap();
        assert_eq!(run.stages, vec!["fetch", "rewrite", "generate_image"]);
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminal_runs_are_not_resumable() {
        let harness = Harness::new();
        harness.pipeline().process(ContentPayload::from_url(URL)).await.unwrap();
        let completed = only_run(&harness).await;
        assert_eq!(completed.status, RunStatus::Completed);

        let err = harness.pipeline().resume(completed.id).await.unwrap_err();
        assert!(matches!(
            err,
            ContentFlowError::NotResumable { status: RunStatus::Completed, .. }
        ));
        assert!(err.is_precondition());

        let rejected = Harness::new();
        rejected.ai.push_response(reject_json("duplicate"));
        rejected.pipeline().process(ContentPayload::from_url(URL)).await.unwrap();
        let run = only_run(&rejected).await;

        let err = rejected.pipeline().resume_run(run).await.unwrap_err();
        assert!(matches!(
            err,
            ContentFlowError::NotResumable { status: RunStatus::Rejected, .. }
        ));
    }

    #[tokio::test]
    async fn test_resume_unknown_run() {
        let harness = Harness::new();
        let err = harness.pipeline().resume(uuid::Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, ContentFlowError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn test_every_executed_stage_reports_a_started_and_terminal_pair() {
        let harness = Harness::new();
        harness.pipeline().process(ContentPayload::from_url(URL)).await.unwrap();

        let lines = harness.progress_lines();
        let labels = [
            "Fetch",
            "AI Rewrite",
            "Generate Image",
            "Optimise Image",
            "Create Article",
            "Publish",
        ];
        assert_eq!(lines.len(), labels.len() * 2);
        for (pair, label) in lines.chunks(2).zip(labels) {
            assert_eq!(pair[0], format!("{label}: started"));
            assert!(pair[1].starts_with(&format!("{label}: completed")), "{}", pair[1]);
        }
    }

    #[tokio::test]
    async fn test_skipped_stages_report_skipped() {
        let harness = Harness::new();
        let mut pipeline = harness.pipeline().through(["fetch", "publish"]);

        pipeline.process(ContentPayload::from_text("Body text")).await.unwrap();

        assert_eq!(
            harness.progress_lines(),
            vec![
                "Fetch: started",
                "Fetch: skipped — content already present",
                "Publish: started",
                "Publish: skipped — no article to publish",
            ]
        );
    }

    #[tokio::test]
    async fn test_through_applies_to_one_call_only() {
        let harness = Harness::new();
        let mut pipeline = harness.pipeline().through(["fetch"]);

        pipeline.process(ContentPayload::from_url(URL)).await.unwrap();
        pipeline.process(ContentPayload::from_url("https://news.test/other")).await.unwrap();

        let mut stage_lists: Vec<Vec<String>> = harness
            .runs
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|run| run.stages)
            .collect();
        stage_lists.sort_by_key(Vec::len);
        assert_eq!(stage_lists, vec![vec!["fetch".to_string()], harness.config.pipeline.stages.clone()]);
        assert_eq!(harness.store.article_count(), 1);
    }

    #[tokio::test]
    async fn test_checkpoints_advance_monotonically() {
        let harness = Harness::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = StageRegistry::new();
        for name in ["one", "two", "three"] {
            registry.register(Arc::new(CheckpointWatcherPipe {
                name: name.to_string(),
                runs: harness.runs.clone(),
                seen: Arc::clone(&seen),
            }));
        }

        harness
            .pipeline_with(registry)
            .through(["one", "two", "three"])
            .process(ContentPayload::from_text("x"))
            .await
            .unwrap();

        let seen = seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                (0, vec![]),
                (1, vec!["one".to_string()]),
                (2, vec!["one".to_string(), "two".to_string()]),
            ]
        );
        assert_eq!(only_run(&harness).await.current_stage_index, 3);
    }

    #[tokio::test]
    async fn test_publishing_twice_logs_one_success() {
        let harness = Harness::new();
        let payload = harness.pipeline().process(ContentPayload::from_url(URL)).await.unwrap();
        let article = payload.article().unwrap();

        let again = harness.publishers.publish_to_channels(article, None).await;

        assert!(again.is_empty());
        assert_eq!(harness.publisher.calls(), 1);
        let logs = harness.publish_logs.logs_for(article.id).await.unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_same_input_cannot_run_twice_concurrently() {
        let harness = Harness::new();
        let locks = RunLocks::new();
        let key = RunLocks::key_for(None, Some(URL)).unwrap();
        let held = locks.acquire(&key).unwrap();

        let mut pipeline = harness.pipeline().with_locks(locks.clone());
        let err = pipeline.process(ContentPayload::from_url(URL)).await.unwrap_err();
        assert!(matches!(err, ContentFlowError::AlreadyRunning { .. }));
        assert!(harness.runs.is_empty());

        drop(held);
        pipeline.process(ContentPayload::from_url(URL)).await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_run_budget_marks_run_failed() {
        let mut harness = Harness::new();
        harness.config.pipeline.run_timeout_seconds = 1;
        let mut registry = StageRegistry::new();
        registry
            .register(Arc::new(RecordingPipe::new("quick")))
            .register(Arc::new(SlowPipe::new("slow", Duration::from_secs(30))));

        let err = harness
            .pipeline_with(registry)
            .through(["quick", "slow"])
            .process(ContentPayload::from_url(URL))
            .await
            .unwrap_err();

        assert!(matches!(err, ContentFlowError::Timeout { seconds: 1 }));
        let run = only_run(&harness).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_stage.as_deref(), Some("slow"));
        assert_eq!(run.current_stage_index, 1);
        assert!(run.is_resumable());
    }

    #[tokio::test]
    async fn test_file_run_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new();
        harness.images.fail_with("quota exceeded");

        let first_store = Arc::new(JsonFileRunStore::open(dir.path()).await.unwrap());
        ContentPipeline::new(Arc::new(harness.config.clone()), harness.registry(), harness.store.clone())
            .with_run_store(first_store.clone())
            .process(ContentPayload::from_url(URL))
            .await
            .unwrap();
        let failed = first_store.list(Some(RunStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);

        harness.images.recover();
        let reopened = Arc::new(JsonFileRunStore::open(dir.path()).await.unwrap());
        let payload = ContentPipeline::new(Arc::new(harness.config.clone()), harness.registry(), harness.store.clone())
            .with_run_store(reopened.clone())
            .resume(failed[0].id)
            .await
            .unwrap();

        assert!(payload.article().is_some());
        let run = reopened.get(failed[0].id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_staged_input_is_flagged_published() {
        let harness = Harness::new();
        let staged = StagedContent::new(12, "Breaking", URL);
        harness.store.insert_staged(staged.clone());

        let payload = harness
            .pipeline()
            .process(ContentPayload::from_staged_content(&staged))
            .await
            .unwrap();

        assert!(payload.staged_content().unwrap().published);
        assert_eq!(only_run(&harness).await.staged_content_id, Some(12));
    }

    #[tokio::test]
    async fn test_resumed_persist_after_store_error_creates_one_article() {
        let harness = Harness::new();
        let staged = StagedContent::new(21, "Tagged story", URL);
        harness.store.insert_staged(staged.clone());
        let flaky = Arc::new(FlakyTagStore::new(harness.store.clone()));
        let registry = || {
            let mut registry = harness.registry();
            registry.register(Arc::new(PersistStage::new(flaky.clone())));
            registry
        };
        let payload = ContentPayload::from_staged_content(&staged)
            .with(PayloadPatch::new().title("Tagged story").tags(["rust"]));

        let first = harness
            .pipeline_with(registry())
            .through(["persist"])
            .process(payload)
            .await
            .unwrap();

        assert!(first.rejection_reason().unwrap().contains("db blip"));
        assert_eq!(harness.store.article_count(), 0);
        let failed = only_run(&harness).await;
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(!harness.store.find_staged_content(21).await.unwrap().unwrap().published);

        let resumed = harness.pipeline_with(registry()).resume(failed.id).await.unwrap();

        let article = resumed.article().unwrap();
        assert_eq!(harness.store.article_count(), 1);
        assert_eq!(article.tags.len(), 1);
        assert_eq!(article.tags[0].slug, "rust");
        assert!(harness.store.find_staged_content(21).await.unwrap().unwrap().published);
    }
}
