use chrono::{DateTime, Utc};
use genq_core::{Artifact, GenerationType, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status vocabulary of the provider. Anything it invents later is `Unknown`
/// and treated as still running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Pending,
    Submitted,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub generation_type: GenerationType,
    /// Feature-specific provider parameters, passed through untouched
    pub payload: Value,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: Option<ProviderStatus>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub results: Vec<Artifact>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The provider finished inline
    Completed(Vec<Artifact>),
    /// Work continues under this task id
    Accepted(String),
    Rejected(String),
}

impl SubmitResponse {
    pub fn outcome(self) -> SubmitOutcome {
        if self.status == Some(ProviderStatus::Completed) && !self.results.is_empty() {
            return SubmitOutcome::Completed(self.results);
        }
        if let Some(task_id) = self.task_id.filter(|id| !id.is_empty()) {
            return SubmitOutcome::Accepted(task_id);
        }
        match self.status {
            Some(ProviderStatus::Failed) => SubmitOutcome::Rejected(
                self.error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "generation failed".to_string()),
            ),
            _ => SubmitOutcome::Rejected("provider returned neither results nor a task id".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: ProviderStatus,
    #[serde(default)]
    pub results: Vec<Artifact>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn processing() -> Self {
        Self {
            status: ProviderStatus::Processing,
            results: Vec::new(),
            error: None,
        }
    }

    pub fn completed(results: Vec<Artifact>) -> Self {
        Self {
            status: ProviderStatus::Completed,
            results,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Failed,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Scope of the listing, e.g. the profile the job was submitted for
    pub context: Option<String>,
    pub generation_type: Option<GenerationType>,
}

/// One previously produced artifact as listed by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub generation_type: Option<String>,
}

impl HistoryItem {
    pub fn to_artifact(&self) -> Artifact {
        Artifact {
            id: self.id.clone(),
            url: self.url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            created_at: Some(self.created_at),
        }
    }
}
