//! Hub - the process-wide context
//!
//! Owns the status publisher, the automation registry and the script
//! supervisor. Front ends hold one `Hub` instead of reaching for globals.

use crate::automation::AutomationCatalog;
use crate::publisher::StatusPublisher;
use crate::registry::AutomationRegistry;
use crate::script::ScriptSupervisor;
use crate::status::AutomationStatus;
use hub_foundation::{HubConfig, Result};
use tokio::sync::broadcast;
use tracing::info;

pub struct Hub {
    config: HubConfig,
    publisher: StatusPublisher,
    automations: AutomationRegistry,
    scripts: ScriptSupervisor,
}

impl Hub {
    /// Hub with the built-in automation catalog
    pub fn new(config: HubConfig) -> Result<Self> {
        Self::with_catalog(config, AutomationCatalog::builtin())
    }

    pub fn with_catalog(config: HubConfig, catalog: AutomationCatalog) -> Result<Self> {
        config.validate()?;

        let publisher = StatusPublisher::new(config.automation.status_channel_capacity);
        let automations =
            AutomationRegistry::new(catalog, publisher.clone(), config.automation.clone());
        let scripts = ScriptSupervisor::new(config.scripts.clone())?;

        info!(
            "Hub ready ({} automation types, scripts in {})",
            automations.available_types().len(),
            scripts.root().display()
        );

        Ok(Self {
            config,
            publisher,
            automations,
            scripts,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn automations(&self) -> &AutomationRegistry {
        &self.automations
    }

    pub fn scripts(&self) -> &ScriptSupervisor {
        &self.scripts
    }

    /// Receive every automation status snapshot published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationStatus> {
        self.publisher.subscribe()
    }

    /// Stop all running automations and script runs
    pub async fn shutdown(&self) {
        let automations = self.automations.stop_all().await;

        let mut scripts = 0;
        for run in self.scripts.list_running().await {
            if self.scripts.stop(&run.id).await.is_ok() {
                scripts += 1;
            }
        }

        info!(
            "Hub shut down ({} automations, {} script runs stopped)",
            automations.len(),
            scripts
        );
    }
}
