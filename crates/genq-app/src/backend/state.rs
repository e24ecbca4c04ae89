use std::sync::Arc;

use genq_core::GenerationType;

use crate::backend::schemas::ApiError;
use crate::orchestrator::Orchestrator;
use crate::panel::PanelController;

pub struct ApiState {
    orchestrator: Arc<Orchestrator>,
}

impl ApiState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Resolve a `{type}` path segment to its panel.
    pub fn panel(&self, kind: &str) -> Result<Arc<PanelController>, ApiError> {
        let generation_type: GenerationType = kind.parse()?;
        Ok(self.orchestrator.panel(generation_type))
    }
}
