pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod handoff;
pub mod orchestrator;
pub mod panel;
pub mod poller;
pub mod provider;
pub mod reconciler;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::OrchestratorConfig;
pub use error::{JobError, ProviderError, StoreError, SubmitError};
pub use orchestrator::Orchestrator;
pub use panel::{PanelController, Submission, TaskInput};
pub use store::JobStore;
