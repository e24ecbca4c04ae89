use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use genq_core::Job;

use crate::backend::schemas::ApiError;
use crate::backend::state::ApiState;

pub async fn list_jobs(State(state): State<Arc<ApiState>>) -> Json<Vec<Job>> {
    Json(state.orchestrator().jobs())
}

pub async fn remove_job(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.orchestrator().remove_job(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::JobNotFound(id)),
    }
}
