use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use genq_core::progress::estimate_progress;
use genq_core::{Artifact, JobPatch};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{JobError, ProviderError};
use crate::provider::{GenerationProvider, ProviderStatus, StatusResponse};
use crate::store::JobStore;

/// Source of the delay between poll attempts.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn delay(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub progress_step: u8,
    pub progress_cap: u8,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
            progress_step: 2,
            progress_cap: 90,
        }
    }
}

/// What the poller does after one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Wait(Duration),
    Complete(Vec<Artifact>),
    Fail(JobError),
}

impl PollPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.max_attempts,
            ..Self::default()
        }
    }

    pub fn progress_for(&self, attempt: u32) -> u8 {
        estimate_progress(attempt, self.progress_step, self.progress_cap)
    }

    /// Decide the next step from the 1-based `attempt` and what the provider
    /// said on that attempt.
    pub fn decide(&self, attempt: u32, observation: Result<StatusResponse, ProviderError>) -> PollStep {
        let status = match observation {
            Ok(status) => status,
            Err(e) => return PollStep::Fail(e.into()),
        };

        match status.status {
            ProviderStatus::Completed if !status.results.is_empty() => PollStep::Complete(status.results),
            ProviderStatus::Failed => PollStep::Fail(JobError::Provider(
                status
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "generation failed".to_string()),
            )),
            _ if attempt >= self.max_attempts => PollStep::Fail(JobError::TimedOut),
            _ => PollStep::Wait(self.interval),
        }
    }
}

/// Job ids with a poll loop running in this process.
#[derive(Debug, Clone, Default)]
pub struct LivePollers {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl LivePollers {
    pub fn contains(&self, job_id: &str) -> bool {
        self.ids.lock().contains(job_id)
    }

    /// Mark `job_id` live until the returned guard drops. `None` if another
    /// loop already owns it.
    pub fn claim(&self, job_id: &str) -> Option<LiveGuard> {
        if !self.ids.lock().insert(job_id.to_string()) {
            return None;
        }
        Some(LiveGuard {
            ids: self.ids.clone(),
            job_id: job_id.to_string(),
        })
    }
}

pub struct LiveGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    job_id: String,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.job_id);
    }
}

/// Drives one job to a terminal state by polling the provider.
#[derive(Clone)]
pub struct Poller {
    store: Arc<JobStore>,
    provider: Arc<dyn GenerationProvider>,
    scheduler: Arc<dyn Scheduler>,
    policy: PollPolicy,
    live: LivePollers,
}

impl Poller {
    pub fn new(
        store: Arc<JobStore>,
        provider: Arc<dyn GenerationProvider>,
        scheduler: Arc<dyn Scheduler>,
        policy: PollPolicy,
        live: LivePollers,
    ) -> Self {
        Self {
            store,
            provider,
            scheduler,
            policy,
            live,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn live(&self) -> &LivePollers {
        &self.live
    }

    /// Run [`Poller::poll`] on the runtime. Dropping the handle detaches the
    /// loop; it keeps writing into the store until the job is terminal.
    ///
    /// The job counts as live from the moment this returns.
    pub fn spawn(&self, task_id: String, job_id: String) -> JoinHandle<Result<Vec<Artifact>, JobError>> {
        let claim = self.live.claim(&job_id);
        let poller = self.clone();
        tokio::spawn(async move {
            let Some(guard) = claim else {
                return Err(already_polled(&job_id));
            };
            poller.run(guard, &task_id, &job_id).await
        })
    }

    /// Poll `task_id` until `job_id` is terminal.
    ///
    /// The store is patched with the terminal state before this returns, so
    /// the result never runs ahead of what readers see.
    pub async fn poll(&self, task_id: &str, job_id: &str) -> Result<Vec<Artifact>, JobError> {
        let Some(guard) = self.live.claim(job_id) else {
            return Err(already_polled(job_id));
        };
        self.run(guard, task_id, job_id).await
    }

    async fn run(&self, _guard: LiveGuard, task_id: &str, job_id: &str) -> Result<Vec<Artifact>, JobError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let elapsed = started.elapsed().as_secs();
            let tick = JobPatch::tick(
                self.policy.progress_for(attempt),
                format!("Generating... ({elapsed}s)"),
                elapsed,
            );
            if self.store.update_job(job_id, tick).is_none() {
                debug!(job_id, "job left the store, stopping poll");
                return Err(JobError::Aborted(format!("job {job_id} is no longer tracked")));
            }

            let observation = self.provider.status(task_id).await;
            match self.policy.decide(attempt, observation) {
                PollStep::Wait(delay) => {
                    debug!(job_id, task_id, attempt, "still running");
                    self.scheduler.delay(delay).await;
                }
                PollStep::Complete(results) => {
                    self.store.update_job(job_id, JobPatch::completed(results.clone(), Utc::now()));
                    info!(job_id, task_id, attempt, "generation complete with {} results", results.len());
                    return Ok(results);
                }
                PollStep::Fail(err) => {
                    self.store.update_job(job_id, JobPatch::failed(err.to_string(), Utc::now()));
                    warn!(job_id, task_id, attempt, "generation failed: {err}");
                    return Err(err);
                }
            }
        }
    }
}

fn already_polled(job_id: &str) -> JobError {
    JobError::Aborted(format!("job {job_id} is already being polled"))
}
