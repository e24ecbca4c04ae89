use std::sync::Arc;

use genq_app::backend;
use genq_app::config::OrchestratorConfig;
use genq_app::handoff::FileHandoff;
use genq_app::orchestrator::Orchestrator;
use genq_app::poller::TokioScheduler;
use genq_app::provider::HttpProvider;
use genq_app::store::persist::{JobRepository, restore_store, spawn_persister};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OrchestratorConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let repo = JobRepository::new(config.jobs_path());
    let store = restore_store(&repo, config.retention).await?;
    spawn_persister(store.clone(), repo);

    let provider = HttpProvider::from_config(&config)?;
    info!("using provider at {}", config.provider_url);

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        store,
        Arc::new(provider),
        Arc::new(TokioScheduler),
        Arc::new(FileHandoff::new(config.handoff_dir(), config.handoff_ttl)),
    ));

    backend::serve(backend::router(orchestrator), config.port).await
}
