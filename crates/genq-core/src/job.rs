use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::model_types::GenerationType;

/// Caller-supplied context carried through for display and history matching.
pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Queued",
            Self::Processing => "Generating",
            Self::Completed => "Complete",
            Self::Failed => "Failed",
        }
    }
}

/// One produced media item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            thumbnail_url: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub generation_type: GenerationType,
    pub status: JobStatus,
    pub progress: u8,
    pub message: Option<String>,
    /// Provider task id once the submission was accepted
    pub task_id: Option<String>,
    pub elapsed_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Vec<Artifact>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Job {
    /// New pending job with a fresh v4 id.
    pub fn new(generation_type: GenerationType, metadata: Metadata) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), generation_type, metadata)
    }

    pub fn with_id(job_id: impl Into<String>, generation_type: GenerationType, metadata: Metadata) -> Self {
        Self {
            job_id: job_id.into(),
            generation_type,
            status: JobStatus::Pending,
            progress: 0,
            message: Some("Queued".to_string()),
            task_id: None,
            elapsed_secs: 0,
            started_at: Utc::now(),
            completed_at: None,
            results: Vec::new(),
            error: None,
            metadata,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Terminal ⇔ `completed_at` set ⇔ exactly one of results / error.
    pub fn is_consistent(&self) -> bool {
        let has_results = !self.results.is_empty();
        let has_error = self.error.as_deref().is_some_and(|e| !e.is_empty());

        match self.status {
            JobStatus::Completed => self.completed_at.is_some() && has_results && !has_error,
            JobStatus::Failed => self.completed_at.is_some() && has_error && !has_results,
            JobStatus::Pending | JobStatus::Processing => {
                self.completed_at.is_none() && !has_results && !has_error
            }
        }
    }

    /// Merge `patch` into the job.
    ///
    /// Terminal jobs are frozen, progress never moves backwards, and a patch
    /// that would leave the job inconsistent is refused as a whole.
    pub fn apply(&mut self, patch: JobPatch) -> Result<(), PatchError> {
        if self.is_terminal() {
            return Err(PatchError::Terminal(self.job_id.clone()));
        }

        let mut next = self.clone();
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(progress) = patch.progress {
            next.progress = next.progress.max(progress).min(100);
        }
        if let Some(message) = patch.message {
            next.message = Some(message);
        }
        if let Some(task_id) = patch.task_id {
            next.task_id = Some(task_id);
        }
        if let Some(elapsed) = patch.elapsed_secs {
            next.elapsed_secs = next.elapsed_secs.max(elapsed);
        }
        if let Some(completed_at) = patch.completed_at {
            next.completed_at = Some(completed_at);
        }
        if let Some(results) = patch.results {
            next.results = results;
        }
        if let Some(error) = patch.error {
            next.error = Some(error);
        }

        if !next.is_consistent() {
            return Err(PatchError::Inconsistent(self.job_id.clone()));
        }

        *self = next;
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("job {0} is already terminal")]
    Terminal(String),
    #[error("patch would leave job {0} inconsistent")]
    Inconsistent(String),
}

/// Partial update applied with [`Job::apply`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub task_id: Option<String>,
    pub elapsed_secs: Option<u64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Option<Vec<Artifact>>,
    pub error: Option<String>,
}

impl JobPatch {
    /// Per-tick update while the provider is still working
    pub fn tick(progress: u8, message: impl Into<String>, elapsed_secs: u64) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            message: Some(message.into()),
            elapsed_secs: Some(elapsed_secs),
            ..Default::default()
        }
    }

    pub fn task_accepted(task_id: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            task_id: Some(task_id.into()),
            message: Some("Submitted to provider".to_string()),
            ..Default::default()
        }
    }

    pub fn completed(results: Vec<Artifact>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            message: Some("Complete".to_string()),
            completed_at: Some(at),
            results: Some(results),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            message: Some("Failed".to_string()),
            completed_at: Some(at),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
