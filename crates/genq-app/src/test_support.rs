use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genq_core::Artifact;
use parking_lot::Mutex;

use crate::error::ProviderError;
use crate::provider::{
    GenerationProvider, HistoryItem, HistoryQuery, StatusResponse, SubmitRequest, SubmitResponse,
};

pub fn artifact(id: &str) -> Artifact {
    Artifact::new(id, format!("https://cdn.example.com/{id}.mp4"))
}

pub fn history_item(id: &str, created_at: DateTime<Utc>) -> HistoryItem {
    HistoryItem {
        id: id.to_string(),
        url: format!("https://cdn.example.com/{id}.mp4"),
        thumbnail_url: None,
        created_at,
        generation_type: None,
    }
}

/// Provider that replays queued answers. Once the status script runs dry it
/// reports `processing` forever.
#[derive(Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<Result<SubmitResponse, ProviderError>>>,
    statuses: Mutex<VecDeque<Result<StatusResponse, ProviderError>>>,
    history: Mutex<Vec<HistoryItem>>,
    history_error: Mutex<Option<ProviderError>>,
    submitted: Mutex<Vec<SubmitRequest>>,
    history_queries: Mutex<Vec<HistoryQuery>>,
    status_calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn push_submit(&self, response: Result<SubmitResponse, ProviderError>) {
        self.submits.lock().push_back(response);
    }

    pub fn accept_with_task(&self, task_id: &str) {
        self.push_submit(Ok(SubmitResponse {
            task_id: Some(task_id.to_string()),
            ..Default::default()
        }));
    }

    pub fn push_statuses(&self, statuses: impl IntoIterator<Item = Result<StatusResponse, ProviderError>>) {
        self.statuses.lock().extend(statuses);
    }

    pub fn set_history(&self, history: Vec<HistoryItem>) {
        *self.history.lock() = history;
    }

    pub fn fail_history(&self, error: ProviderError) {
        *self.history_error.lock() = Some(error);
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().clone()
    }

    pub fn history_queries(&self) -> Vec<HistoryQuery> {
        self.history_queries.lock().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        self.submitted.lock().push(request.clone());
        self.submits
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("no scripted submit response".into())))
    }

    async fn status(&self, _task_id: &str) -> Result<StatusResponse, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusResponse::processing()))
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, ProviderError> {
        self.history_queries.lock().push(query.clone());
        if let Some(e) = self.history_error.lock().clone() {
            return Err(e);
        }
        Ok(self.history.lock().clone())
    }
}
