use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::backend::routes::job::{list_jobs, remove_job};
use crate::backend::routes::panel::{activate_panel, get_panel, reset_panel, submit_panel};
use crate::backend::state::ApiState;

mod job;
mod panel;

pub fn api_routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", delete(remove_job))
        .route("/panels/{kind}", get(get_panel))
        .route("/panels/{kind}/activate", post(activate_panel))
        .route("/panels/{kind}/submit", post(submit_panel))
        .route("/panels/{kind}/reset", post(reset_panel))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use genq_core::{GenerationType, Job, JobStatus};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::backend::router;
    use crate::backend::schemas::{ErrorBody, PanelView, ResetResponse};
    use crate::config::OrchestratorConfig;
    use crate::handoff::MemoryHandoff;
    use crate::orchestrator::Orchestrator;
    use crate::poller::TokioScheduler;
    use crate::provider::{ProviderStatus, SubmitResponse};
    use crate::store::JobStore;
    use crate::test_support::{ScriptedProvider, artifact};

    use super::*;

    fn app() -> (Arc<Orchestrator>, Arc<ScriptedProvider>, Router) {
        let provider = Arc::new(ScriptedProvider::default());
        let orchestrator = Arc::new(Orchestrator::new(
            &OrchestratorConfig::default(),
            Arc::new(JobStore::new()),
            provider.clone(),
            Arc::new(TokioScheduler),
            Arc::new(MemoryHandoff::new(Duration::from_secs(60))),
        ));
        let router = router(orchestrator.clone());
        (orchestrator, provider, router)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_accepted_job() {
        let (_orchestrator, provider, router) = app();
        provider.push_submit(Ok(SubmitResponse {
            status: Some(ProviderStatus::Completed),
            results: vec![artifact("img")],
            ..Default::default()
        }));

        let response = router
            .oneshot(post_json(
                "/panels/text-to-image/submit",
                json!({"prompt": "a fox", "destination": "shorts"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let job: Job = read(response).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.metadata["prompt"], "a fox");
    }

    #[tokio::test]
    async fn test_missing_field_is_unprocessable() {
        let (orchestrator, _provider, router) = app();

        let response = router
            .oneshot(post_json("/panels/text-to-video/submit", json!({"destination": "shorts"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = read(response).await;
        assert_eq!(body.error, "missing required field: prompt");
        assert!(orchestrator.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_active_type_conflicts() {
        let (orchestrator, _provider, router) = app();
        orchestrator
            .store()
            .add_job(Job::new(GenerationType::ImageToVideo, Default::default()))
            .unwrap();

        let response = router
            .oneshot(post_json("/panels/image-to-video/submit", json!({"destination": "reels"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(orchestrator.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_type_is_not_found() {
        let (_orchestrator, _provider, router) = app();

        let response = router
            .oneshot(Request::get("/panels/text-to-3d").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_panel_view_and_reset() {
        let (orchestrator, provider, router) = app();
        provider.push_submit(Ok(SubmitResponse {
            status: Some(ProviderStatus::Completed),
            results: vec![artifact("img")],
            ..Default::default()
        }));
        let submission = orchestrator
            .panel(GenerationType::TextToImage)
            .submit(crate::panel::TaskInput {
                prompt: Some("a fox".into()),
                destination: Some("shorts".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(Request::get("/panels/text-to-image").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let view: PanelView = read(response).await;
        assert!(view.active_job.is_none());
        assert_eq!(view.last_completed_job.unwrap().job_id, submission.job_id());

        let response = router
            .oneshot(post_json("/panels/text-to-image/reset", json!({})))
            .await
            .unwrap();
        let reset: ResetResponse = read(response).await;
        assert_eq!(reset.cleared, 1);
        assert!(orchestrator.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_remove_job() {
        let (orchestrator, _provider, router) = app();
        let job = orchestrator
            .store()
            .add_job(Job::new(GenerationType::TextToImage, Default::default()))
            .unwrap();

        let uri = format!("/jobs/{}", job.job_id);
        let response = router
            .clone()
            .oneshot(Request::delete(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(Request::delete(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
