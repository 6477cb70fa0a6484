//! Shared state injected into the HTTP handlers

use crate::command::CommandRunner;
use crate::config::{AgentConfig, SystemConfig};
use crate::credentials::CredentialInstaller;
use crate::logs::LogStreamer;
use crate::network::NetworkConfigurator;
use crate::services::ServiceController;
use crate::update::UpdateManager;
use device_agent_shared::UpdateStateCell;
use std::sync::Arc;

/// Every component the router dispatches to
pub struct AppContext {
    pub network: NetworkConfigurator,
    pub services: ServiceController,
    pub updates: UpdateManager,
    pub credentials: CredentialInstaller,
    pub logs: LogStreamer,
    pub system: SystemConfig,
    pub max_bundle_bytes: usize,
}

impl AppContext {
    /// Wire the components from `config`, all sharing one command runner
    pub fn new(config: AgentConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let update_state = Arc::new(UpdateStateCell::new());

        Self {
            network: NetworkConfigurator::new(runner.clone(), config.network),
            services: ServiceController::new(runner.clone(), config.services.clone()),
            updates: UpdateManager::new(runner.clone(), update_state, config.update),
            credentials: CredentialInstaller::new(config.credentials),
            logs: LogStreamer::new(runner, config.services, config.logs),
            system: config.system,
            max_bundle_bytes: config.server.max_bundle_bytes,
        }
    }
}
