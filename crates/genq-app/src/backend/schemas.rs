use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use genq_core::{GenerationType, Job, UnknownGenerationType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SubmitError;
use crate::panel::{PanelController, TaskInput};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub generation_type: GenerationType,
    pub name: String,
    pub active_job: Option<Job>,
    pub last_completed_job: Option<Job>,
    pub staged_input: Option<TaskInput>,
}

impl PanelView {
    pub fn of(panel: &PanelController) -> Self {
        let generation_type = panel.generation_type();
        Self {
            generation_type,
            name: generation_type.name().to_string(),
            active_job: panel.active_job(),
            last_completed_job: panel.last_completed_job(),
            staged_input: panel.staged_input(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetResponse {
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    UnknownType(#[from] UnknownGenerationType),
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownType(_) | Self::JobNotFound(_) => StatusCode::NOT_FOUND,
            Self::Submit(SubmitError::AlreadyActive(_)) => StatusCode::CONFLICT,
            Self::Submit(SubmitError::MissingField(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Submit(SubmitError::Job(_)) => StatusCode::BAD_GATEWAY,
            Self::Submit(SubmitError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
