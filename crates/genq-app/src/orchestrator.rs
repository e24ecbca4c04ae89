use std::collections::HashMap;
use std::sync::Arc;

use genq_core::{GenerationType, Job};

use crate::config::OrchestratorConfig;
use crate::handoff::HandoffSlot;
use crate::panel::PanelController;
use crate::poller::{LivePollers, PollPolicy, Poller, Scheduler};
use crate::provider::GenerationProvider;
use crate::reconciler::Reconciler;
use crate::store::JobStore;

/// Everything one process needs: the shared store plus a panel controller
/// per generation type, all talking to the same provider.
pub struct Orchestrator {
    store: Arc<JobStore>,
    panels: HashMap<GenerationType, Arc<PanelController>>,
}

impl Orchestrator {
    pub fn new(
        config: &OrchestratorConfig,
        store: Arc<JobStore>,
        provider: Arc<dyn GenerationProvider>,
        scheduler: Arc<dyn Scheduler>,
        handoff: Arc<dyn HandoffSlot>,
    ) -> Self {
        let live = LivePollers::default();
        let poller = Poller::new(
            store.clone(),
            provider.clone(),
            scheduler,
            PollPolicy::from_config(config),
            live.clone(),
        );
        let reconciler = Reconciler::new(store.clone(), provider.clone(), live, config.reconcile_window);

        let panels = GenerationType::all()
            .into_iter()
            .map(|generation_type| {
                let panel = PanelController::new(
                    generation_type,
                    store.clone(),
                    provider.clone(),
                    poller.clone(),
                    reconciler.clone(),
                    handoff.clone(),
                );
                (generation_type, Arc::new(panel))
            })
            .collect();

        Self { store, panels }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn panel(&self, generation_type: GenerationType) -> Arc<PanelController> {
        // Every type gets a controller in `new`.
        self.panels[&generation_type].clone()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.store.all_jobs()
    }

    pub fn remove_job(&self, job_id: &str) -> Option<Job> {
        self.store.remove_job(job_id)
    }
}
