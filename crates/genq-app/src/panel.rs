use std::sync::Arc;

use chrono::Utc;
use genq_core::{Artifact, GenerationType, Job, JobPatch, Metadata};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{JobError, SubmitError};
use crate::handoff::HandoffSlot;
use crate::poller::Poller;
use crate::provider::{GenerationProvider, SubmitOutcome, SubmitRequest};
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::store::JobStore;

const PROMPT_KEY: &str = "prompt";
const DESTINATION_KEY: &str = "destination";
const PAYLOAD_KEY: &str = "payload";

/// What a panel collects from the user before submitting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Folder the results are filed under
    #[serde(default)]
    pub destination: Option<String>,
    /// Provider parameters, opaque to the orchestrator
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub metadata: Metadata,
}

impl TaskInput {
    /// Rebuild the input a job was submitted with.
    pub fn from_job(job: &Job) -> Self {
        let mut metadata = job.metadata.clone();
        let prompt = match metadata.remove(PROMPT_KEY) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let destination = match metadata.remove(DESTINATION_KEY) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let payload = metadata.remove(PAYLOAD_KEY).unwrap_or(Value::Null);

        Self {
            prompt,
            destination,
            payload,
            metadata,
        }
    }

    /// Metadata stored on the job: caller metadata plus the input fields.
    pub fn job_metadata(&self) -> Metadata {
        let mut metadata = self.metadata.clone();
        if let Some(prompt) = &self.prompt {
            metadata.insert(PROMPT_KEY.into(), Value::String(prompt.clone()));
        }
        if let Some(destination) = &self.destination {
            metadata.insert(DESTINATION_KEY.into(), Value::String(destination.clone()));
        }
        if !self.payload.is_null() {
            metadata.insert(PAYLOAD_KEY.into(), self.payload.clone());
        }
        metadata
    }

    pub fn validate(&self, generation_type: GenerationType) -> Result<(), SubmitError> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());

        if generation_type.requires_prompt() && blank(&self.prompt) {
            return Err(SubmitError::MissingField(PROMPT_KEY));
        }
        if generation_type.requires_destination() && blank(&self.destination) {
            return Err(SubmitError::MissingField(DESTINATION_KEY));
        }
        Ok(())
    }
}

/// Result of [`PanelController::activate`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub reconciled: ReconcileReport,
    /// Input of a submission that is still in flight
    pub restored_input: Option<TaskInput>,
}

enum Pending {
    Ready(Result<Vec<Artifact>, JobError>),
    Polling(JoinHandle<Result<Vec<Artifact>, JobError>>),
}

/// Handle to an accepted submission. Dropping it stops observing; the job
/// still runs to completion in the store.
pub struct Submission {
    job: Job,
    pending: Pending,
}

impl Submission {
    /// Snapshot of the job right after submission
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn job_id(&self) -> &str {
        &self.job.job_id
    }

    /// Wait for the terminal outcome. The store already reflects it when
    /// this resolves.
    pub async fn outcome(self) -> Result<Vec<Artifact>, JobError> {
        match self.pending {
            Pending::Ready(result) => result,
            Pending::Polling(handle) => handle
                .await
                .unwrap_or_else(|e| Err(JobError::Aborted(e.to_string()))),
        }
    }
}

/// The contract a generation panel is written against. One per type.
pub struct PanelController {
    generation_type: GenerationType,
    store: Arc<JobStore>,
    provider: Arc<dyn GenerationProvider>,
    poller: Poller,
    reconciler: Reconciler,
    handoff: Arc<dyn HandoffSlot>,
    staged: Mutex<Option<TaskInput>>,
    submit_gate: Mutex<()>,
}

impl PanelController {
    pub fn new(
        generation_type: GenerationType,
        store: Arc<JobStore>,
        provider: Arc<dyn GenerationProvider>,
        poller: Poller,
        reconciler: Reconciler,
        handoff: Arc<dyn HandoffSlot>,
    ) -> Self {
        Self {
            generation_type,
            store,
            provider,
            poller,
            reconciler,
            handoff,
            staged: Mutex::new(None),
            submit_gate: Mutex::new(()),
        }
    }

    pub fn generation_type(&self) -> GenerationType {
        self.generation_type
    }

    /// Reconcile stale jobs of this type and pick up the input handed over
    /// from before a reload. Safe to repeat: live and terminal jobs are left
    /// alone.
    pub async fn activate(&self) -> Activation {
        let reconciled = self.reconciler.reconcile_type(self.generation_type).await;

        let restored_input = match self.handoff.take(self.generation_type.id()).await {
            // The submission it belonged to has finished.
            Ok(Some(_)) if !self.store.has_active_generation_for_type(self.generation_type) => None,
            Ok(Some(value)) => match serde_json::from_value::<TaskInput>(value) {
                Ok(input) => Some(input),
                Err(e) => {
                    warn!(generation_type = %self.generation_type, "dropping malformed handoff: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(generation_type = %self.generation_type, "handoff read failed: {e:#}");
                None
            }
        };
        if let Some(input) = &restored_input {
            *self.staged.lock() = Some(input.clone());
        }

        Activation {
            reconciled,
            restored_input,
        }
    }

    /// Submit a new generation for this panel's type.
    ///
    /// Rejected without touching the store while another job of the type is
    /// active or a required field is missing.
    pub async fn submit(&self, input: TaskInput) -> Result<Submission, SubmitError> {
        let job = {
            let _gate = self.submit_gate.lock();
            if self.store.has_active_generation_for_type(self.generation_type) {
                return Err(SubmitError::AlreadyActive(self.generation_type));
            }
            input.validate(self.generation_type)?;

            self.store.clear_completed_jobs_for_type(self.generation_type);
            self.store.add_job(Job::new(self.generation_type, input.job_metadata()))?
        };
        let job_id = job.job_id.clone();
        info!(job_id = %job_id, generation_type = %self.generation_type, "submitting generation");

        match serde_json::to_value(&input) {
            Ok(value) => {
                if let Err(e) = self.handoff.put(self.generation_type.id(), value).await {
                    warn!(job_id = %job_id, "handoff write failed: {e:#}");
                }
            }
            Err(e) => warn!(job_id = %job_id, "input not serializable for handoff: {e}"),
        }

        let request = SubmitRequest {
            generation_type: self.generation_type,
            payload: input.payload,
            metadata: job.metadata.clone(),
        };

        let outcome = match self.provider.submit(&request).await {
            Ok(response) => response.outcome(),
            Err(e) => {
                let err = JobError::from(e);
                self.store.update_job(&job_id, JobPatch::failed(err.to_string(), Utc::now()));
                warn!(job_id = %job_id, "submission failed: {err}");
                return Err(err.into());
            }
        };

        match outcome {
            SubmitOutcome::Completed(results) => {
                let job = self
                    .store
                    .update_job(&job_id, JobPatch::completed(results.clone(), Utc::now()))
                    .unwrap_or(job);
                info!(job_id = %job_id, "provider completed inline");
                Ok(Submission {
                    job,
                    pending: Pending::Ready(Ok(results)),
                })
            }
            SubmitOutcome::Accepted(task_id) => {
                let job = self
                    .store
                    .update_job(&job_id, JobPatch::task_accepted(task_id.clone()))
                    .unwrap_or(job);
                let handle = self.poller.spawn(task_id, job_id);
                Ok(Submission {
                    job,
                    pending: Pending::Polling(handle),
                })
            }
            SubmitOutcome::Rejected(reason) => {
                self.store.update_job(&job_id, JobPatch::failed(reason.clone(), Utc::now()));
                warn!(job_id = %job_id, "provider rejected submission: {reason}");
                Err(JobError::Provider(reason).into())
            }
        }
    }

    /// Clear finished jobs, staged input, and active jobs no poll loop in
    /// this process owns. A job with a live poll loop is kept; the provider
    /// has no way to cancel its task.
    pub async fn reset(&self) -> usize {
        self.staged.lock().take();
        if let Err(e) = self.handoff.take(self.generation_type.id()).await {
            warn!(generation_type = %self.generation_type, "handoff clear failed: {e:#}");
        }

        let live = self.poller.live();
        let orphaned: Vec<Job> = self
            .store
            .list_active_jobs()
            .into_iter()
            .filter(|job| job.generation_type == self.generation_type && !live.contains(&job.job_id))
            .collect();
        let mut cleared = 0;
        for job in orphaned {
            if self.store.remove_job(&job.job_id).is_some() {
                info!(job_id = %job.job_id, "dropped stale job on reset");
                cleared += 1;
            }
        }

        cleared + self.store.clear_completed_jobs_for_type(self.generation_type)
    }

    pub async fn cancel(&self) -> usize {
        self.reset().await
    }

    /// Stage the inputs of a past job for another run.
    pub fn reuse(&self, past_job: &Job) -> TaskInput {
        let input = TaskInput::from_job(past_job);
        *self.staged.lock() = Some(input.clone());
        input
    }

    pub fn stage(&self, input: TaskInput) {
        *self.staged.lock() = Some(input);
    }

    pub fn staged_input(&self) -> Option<TaskInput> {
        self.staged.lock().clone()
    }

    pub fn active_job(&self) -> Option<Job> {
        self.store.active_job_for_type(self.generation_type)
    }

    pub fn last_completed_job(&self) -> Option<Job> {
        self.store.get_last_completed_job_for_type(self.generation_type)
    }
}
