//! One JSON document per run on disk.

use super::{PipelineRun, RunStore, RunUpdate};
use crate::core::RunStatus;
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stores each run as `<dir>/<id>.json`.
///
/// Writes go to a temporary file that is then renamed over the record, so
/// a crash mid-checkpoint leaves the previous checkpoint intact.
#[derive(Debug)]
pub struct JsonFileRunStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRunStore {
    /// Opens a store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> Result<Option<PipelineRun>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, run: &PipelineRun) -> Result<()> {
        let path = self.path_for(run.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(run)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(run_id = %run.id, status = %run.status, "Wrote run record");
        Ok(())
    }
}

#[async_trait]
impl RunStore for JsonFileRunStore {
    async fn create(&self, run: PipelineRun) -> Result<PipelineRun> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(self.path_for(run.id)).await? {
            return Err(ContentFlowError::store(format!("run {} already exists", run.id)));
        }
        self.write(&run).await?;
        Ok(run)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PipelineRun>> {
        self.read(id).await
    }

    async fn update(&self, id: Uuid, update: RunUpdate) -> Result<PipelineRun> {
        let _guard = self.write_lock.lock().await;
        let mut run = self
            .read(id)
            .await?
            .ok_or_else(|| ContentFlowError::RunNotFound(id.to_string()))?;
        update.apply(&mut run)?;
        self.write(&run).await?;
        Ok(run)
    }

    async fn list(&self, status: Option<RunStatus>) -> Result<Vec<PipelineRun>> {
        let mut runs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<PipelineRun>(&bytes) {
                Ok(run) if status.map_or(true, |s| run.status == s) => runs.push(run),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable run record"),
            }
        }
        runs.sort_by_key(|run| (run.created_at, run.id));
        Ok(runs)
    }
}
