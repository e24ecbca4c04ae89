use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use genq_core::Job;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::JobStore;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    jobs: Vec<Job>,
}

/// JSON snapshot of the job store on local disk.
#[derive(Debug, Clone)]
pub struct JobRepository {
    path: PathBuf,
}

impl JobRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read every persisted job. A missing file is an empty history.
    pub async fn load(&self) -> Result<Vec<Job>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };

        let snapshot: Snapshot = serde_json::from_slice(&data)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!("unsupported job snapshot version {}", snapshot.version);
        }
        Ok(snapshot.jobs)
    }

    /// Replace the snapshot. Written to a sibling temp file then renamed so a
    /// crash never leaves a half-written file behind.
    pub async fn save(&self, jobs: Vec<Job>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            jobs,
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Load the persisted jobs into a fresh store, dropping terminal jobs older
/// than `retention`. Jobs left active are kept as-is for the reconciler.
pub async fn restore_store(repo: &JobRepository, retention: Duration) -> Result<Arc<JobStore>> {
    let jobs = repo.load().await?;
    info!("Loaded {} jobs from {}", jobs.len(), repo.path().display());

    let store = Arc::new(JobStore::from_jobs(jobs));
    let pruned = store.prune_terminal_older_than(retention, Utc::now());
    if pruned > 0 {
        info!("Pruned {pruned} expired jobs");
        repo.save(store.all_jobs()).await?;
    }

    let stale = store.list_active_jobs().len();
    if stale > 0 {
        info!("{stale} jobs were left in flight by the previous run");
    }

    Ok(store)
}

/// Write the store back to disk whenever a durable event happens.
///
/// Progress ticks are not persisted; the first `processing` transition and
/// every terminal transition are.
pub fn spawn_persister(store: Arc<JobStore>, repo: JobRepository) -> JoinHandle<()> {
    let mut rx = store.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.is_durable() => {
                    debug!(job_id = event.job_id(), "persisting job store");
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("persister lagged by {skipped} events, saving full snapshot");
                }
                Err(RecvError::Closed) => break,
            }

            if let Err(e) = repo.save(store.all_jobs()).await {
                warn!("failed to persist job store: {e:#}");
            }
        }
    })
}
