pub mod routes;
pub mod schemas;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::backend::routes::api_routes;
use crate::backend::state::ApiState;
use crate::orchestrator::Orchestrator;

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .merge(api_routes())
        .with_state(Arc::new(ApiState::new(orchestrator)))
}

/// Serve the dashboard API until the listener fails.
pub async fn serve(app: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!("dashboard API listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
