//! In-memory run store.

use super::{PipelineRun, RunStore, RunUpdate};
use crate::core::RunStatus;
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Keeps runs in a map; lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<Uuid, PipelineRun>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    /// Returns true if no runs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, run: PipelineRun) -> Result<PipelineRun> {
        self.runs.write().insert(run.id, run.clone());
        Ok(run)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PipelineRun>> {
        Ok(self.runs.read().get(&id).cloned())
    }

    async fn update(&self, id: Uuid, update: RunUpdate) -> Result<PipelineRun> {
        let mut runs = self.runs.write();
        let stored = runs
            .get_mut(&id)
            .ok_or_else(|| ContentFlowError::RunNotFound(id.to_string()))?;

        let mut next = stored.clone();
        update.apply(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn list(&self, status: Option<RunStatus>) -> Result<Vec<PipelineRun>> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .read()
            .values()
            .filter(|run| status.map_or(true, |s| run.status == s))
            .cloned()
            .collect();
        runs.sort_by_key(|run| (run.created_at, run.id));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ContentPayload;

    fn run() -> PipelineRun {
        PipelineRun::new(vec!["fetch".to_string()], &ContentPayload::from_text("x"))
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let store = InMemoryRunStore::new();
        let created = store.create(run()).await.unwrap();

        let updated = store
            .update(created.id, RunUpdate::running(0, "Fetch"))
            .await
            .unwrap();
        assert_eq!(updated.status, RunStatus::Running);
        assert_eq!(store.get(created.id).await.unwrap().unwrap(), updated);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_run_untouched() {
        let store = InMemoryRunStore::new();
        let created = store.create(run()).await.unwrap();

        let err = store
            .update(
                created.id,
                RunUpdate::failed("fetch", "boom").with_checkpoint(
                    4,
                    ContentPayload::from_text("y").to_snapshot(),
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ContentFlowError::InvalidTransition { .. }));
        assert_eq!(store.get(created.id).await.unwrap().unwrap(), created);
    }

    #[tokio::test]
    async fn test_update_unknown_run() {
        let store = InMemoryRunStore::new();
        let err = store
            .update(Uuid::now_v7(), RunUpdate::completed(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentFlowError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = InMemoryRunStore::new();
        let a = store.create(run()).await.unwrap();
        store.create(run()).await.unwrap();
        store.update(a.id, RunUpdate::running(0, "Fetch")).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        assert_eq!(store.list(Some(RunStatus::Running)).await.unwrap().len(), 1);
        assert!(store.list(Some(RunStatus::Failed)).await.unwrap().is_empty());
    }
}
