use std::sync::Arc;
use tryon_core::{Config, SanitizedConfig, TryOnOrchestrator};

use crate::api::WsBroadcaster;
use crate::jobs::JobRegistry;

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<TryOnOrchestrator>,
    jobs: JobRegistry,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    /// Wire the job registry to the orchestrator and broadcaster.
    pub fn new(
        config: Config,
        orchestrator: Arc<TryOnOrchestrator>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        let jobs = JobRegistry::new(
            Arc::clone(&orchestrator),
            ws_broadcaster.clone(),
            config.server.max_finished_jobs,
        );
        Self {
            config,
            orchestrator,
            jobs,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &TryOnOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
