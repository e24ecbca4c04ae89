pub mod persist;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use genq_core::{GenerationType, Job, JobPatch, JobStatus};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::events::JobEvent;

const EVENT_CAPACITY: usize = 256;

/// Process-wide registry of generation jobs.
///
/// Every operation is one short critical section with no `.await` inside, so
/// each call is atomic with respect to every other call. Mutations hand back
/// a snapshot of the affected job and are broadcast as [`JobEvent`]s.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::from_jobs(Vec::new())
    }

    /// Rebuild a store from persisted jobs, whatever state they were left in.
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let jobs = jobs.into_iter().map(|job| (job.job_id.clone(), job)).collect();

        Self {
            jobs: RwLock::new(jobs),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: JobEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Insert a new job in `pending` status. Run state carried by the
    /// caller's value is reset; identity, type, start time and metadata stay.
    pub fn add_job(&self, mut job: Job) -> Result<Job, StoreError> {
        job.status = JobStatus::Pending;
        job.progress = 0;
        job.message = Some(JobStatus::Pending.label().to_string());
        job.task_id = None;
        job.elapsed_secs = 0;
        job.completed_at = None;
        job.results.clear();
        job.error = None;

        {
            let mut jobs = self.jobs.write();
            if jobs.contains_key(&job.job_id) {
                warn!(job_id = %job.job_id, "refusing to add duplicate job");
                return Err(StoreError::DuplicateJob(job.job_id));
            }
            jobs.insert(job.job_id.clone(), job.clone());
        }

        debug!(job_id = %job.job_id, generation_type = %job.generation_type, "job queued");
        self.emit(JobEvent::Queued(job.clone()));
        Ok(job)
    }

    /// Merge `patch` into an existing job and return the new snapshot.
    ///
    /// Unknown and terminal jobs are left untouched and yield `None`.
    pub fn update_job(&self, job_id: &str, patch: JobPatch) -> Option<Job> {
        let (before, after) = {
            let mut jobs = self.jobs.write();
            let job = jobs.get_mut(job_id)?;
            let before = job.status;

            if let Err(e) = job.apply(patch) {
                debug!(job_id, "patch ignored: {e}");
                return None;
            }
            (before, job.clone())
        };

        let event = match after.status {
            JobStatus::Completed => JobEvent::Completed(after.clone()),
            JobStatus::Failed => JobEvent::Failed(after.clone()),
            JobStatus::Processing if before == JobStatus::Pending => JobEvent::Started(after.clone()),
            JobStatus::Pending | JobStatus::Processing => JobEvent::Progress {
                job_id: after.job_id.clone(),
                generation_type: after.generation_type,
                progress: after.progress,
                message: after.message.clone(),
            },
        };
        self.emit(event);

        Some(after)
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn has_active_generation_for_type(&self, generation_type: GenerationType) -> bool {
        self.jobs
            .read()
            .values()
            .any(|job| job.generation_type == generation_type && job.is_active())
    }

    /// The current active job of a type, if any
    pub fn active_job_for_type(&self, generation_type: GenerationType) -> Option<Job> {
        self.jobs
            .read()
            .values()
            .filter(|job| job.generation_type == generation_type && job.is_active())
            .max_by_key(|job| job.started_at)
            .cloned()
    }

    pub fn get_last_completed_job_for_type(&self, generation_type: GenerationType) -> Option<Job> {
        self.jobs
            .read()
            .values()
            .filter(|job| job.generation_type == generation_type && job.is_terminal())
            .max_by_key(|job| (job.completed_at, job.started_at))
            .cloned()
    }

    /// Drop every terminal job of a type. Returns how many were removed.
    pub fn clear_completed_jobs_for_type(&self, generation_type: GenerationType) -> usize {
        let removed: Vec<String> = {
            let mut jobs = self.jobs.write();
            let ids: Vec<String> = jobs
                .values()
                .filter(|job| job.generation_type == generation_type && job.is_terminal())
                .map(|job| job.job_id.clone())
                .collect();
            for id in &ids {
                jobs.remove(id);
            }
            ids
        };

        for job_id in &removed {
            self.emit(JobEvent::Removed {
                job_id: job_id.clone(),
                generation_type,
            });
        }
        removed.len()
    }

    /// Non-terminal jobs across all types, oldest first.
    pub fn list_active_jobs(&self) -> Vec<Job> {
        let mut active: Vec<Job> = self.jobs.read().values().filter(|j| j.is_active()).cloned().collect();
        active.sort_by_key(|job| job.started_at);
        active
    }

    /// Jobs of one type, newest first
    pub fn jobs_for_type(&self, generation_type: GenerationType) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .values()
            .filter(|job| job.generation_type == generation_type)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    /// All jobs, newest first
    pub fn all_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    pub fn remove_job(&self, job_id: &str) -> Option<Job> {
        let removed = self.jobs.write().remove(job_id)?;
        self.emit(JobEvent::Removed {
            job_id: removed.job_id.clone(),
            generation_type: removed.generation_type,
        });
        Some(removed)
    }

    /// Drop terminal jobs that finished more than `retention` before `now`.
    pub fn prune_terminal_older_than(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = now - retention;

        let removed: Vec<Job> = {
            let mut jobs = self.jobs.write();
            let ids: Vec<String> = jobs
                .values()
                .filter(|job| job.is_terminal() && job.completed_at.is_some_and(|at| at < cutoff))
                .map(|job| job.job_id.clone())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &removed {
            self.emit(JobEvent::Removed {
                job_id: job.job_id.clone(),
                generation_type: job.generation_type,
            });
        }
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
