use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use genq_core::Job;

use crate::backend::schemas::{ApiError, PanelView, ResetResponse};
use crate::backend::state::ApiState;
use crate::panel::{Activation, TaskInput};

pub async fn get_panel(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> Result<Json<PanelView>, ApiError> {
    let panel = state.panel(&kind)?;
    Ok(Json(PanelView::of(&panel)))
}

pub async fn activate_panel(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> Result<Json<Activation>, ApiError> {
    let panel = state.panel(&kind)?;
    Ok(Json(panel.activate().await))
}

/// The poll loop outlives the request; clients follow up via `GET /jobs`.
pub async fn submit_panel(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
    Json(input): Json<TaskInput>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let panel = state.panel(&kind)?;
    let submission = panel.submit(input).await?;
    Ok((StatusCode::ACCEPTED, Json(submission.job().clone())))
}

pub async fn reset_panel(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let panel = state.panel(&kind)?;
    let cleared = panel.reset().await;
    Ok(Json(ResetResponse { cleared }))
}
