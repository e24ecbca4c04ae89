pub mod http;
pub mod schemas;

use async_trait::async_trait;

use crate::error::ProviderError;
pub use http::HttpProvider;
pub use schemas::{
    HistoryItem, HistoryQuery, ProviderStatus, StatusResponse, SubmitOutcome, SubmitRequest, SubmitResponse,
};

/// The generative-media provider, as seen by the orchestrator.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Start a generation
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError>;

    /// Current state of a task started by [`GenerationProvider::submit`]
    async fn status(&self, task_id: &str) -> Result<StatusResponse, ProviderError>;

    /// Artifacts produced for a context, independent of any task id
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, ProviderError>;
}
