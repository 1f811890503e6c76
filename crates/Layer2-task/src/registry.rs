//! Automation Registry - owns every automation instance by identity
//!
//! Features:
//! - Create instances from the catalog, wired to the shared publisher
//! - Start / stop / delete by id
//! - Best-effort `stop_all` for shutdown
//!
//! The identity map sits behind one `RwLock`. Lifecycle calls clone the
//! instance handle out of the map and run without holding the lock, so a
//! slow `stop()` join never blocks a concurrent `list`.

use crate::automation::{AutomationCatalog, AutomationType};
use crate::lifecycle::ManagedAutomation;
use crate::publisher::StatusPublisher;
use crate::status::{AutomationConfig, AutomationId, AutomationStatus};
use hub_foundation::{AutomationSettings, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Registry of automation instances
pub struct AutomationRegistry {
    catalog: AutomationCatalog,
    automations: RwLock<HashMap<AutomationId, Arc<ManagedAutomation>>>,
    publisher: StatusPublisher,
    settings: AutomationSettings,
}

impl AutomationRegistry {
    pub fn new(
        catalog: AutomationCatalog,
        publisher: StatusPublisher,
        settings: AutomationSettings,
    ) -> Self {
        Self {
            catalog,
            automations: RwLock::new(HashMap::new()),
            publisher,
            settings,
        }
    }

    /// Built-in catalog with default settings
    pub fn with_builtins(publisher: StatusPublisher) -> Self {
        Self::new(
            AutomationCatalog::builtin(),
            publisher,
            AutomationSettings::default(),
        )
    }

    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    /// Creatable automation kinds
    pub fn available_types(&self) -> Vec<AutomationType> {
        self.catalog.describe()
    }

    /// Instantiate `kind` and store it under a fresh id
    pub async fn create(&self, kind: &str) -> Result<AutomationStatus> {
        let automation = self
            .catalog
            .instantiate(kind)
            .ok_or_else(|| Error::UnknownType(kind.to_string()))?;

        let managed = Arc::new(ManagedAutomation::new(
            kind,
            automation,
            self.publisher.clone(),
            self.settings.clone(),
        ));
        let status = managed.status();

        self.automations.write().await.insert(managed.id(), managed);
        info!("Created automation {} ({})", status.id.short(), kind);
        Ok(status)
    }

    /// Instance handle by id
    pub async fn get(&self, id: AutomationId) -> Result<Arc<ManagedAutomation>> {
        self.automations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Automation not found: {}", id)))
    }

    pub async fn status(&self, id: AutomationId) -> Result<AutomationStatus> {
        Ok(self.get(id).await?.status())
    }

    /// Snapshots of every instance
    pub async fn list(&self) -> Vec<AutomationStatus> {
        let automations = self.automations.read().await;
        automations.values().map(|a| a.status()).collect()
    }

    pub async fn len(&self) -> usize {
        self.automations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.automations.read().await.is_empty()
    }

    pub async fn start(
        &self,
        id: AutomationId,
        config: AutomationConfig,
    ) -> Result<AutomationStatus> {
        self.get(id).await?.start(config).await
    }

    pub async fn stop(&self, id: AutomationId) -> Result<AutomationStatus> {
        Ok(self.get(id).await?.stop().await)
    }

    /// Remove, then stop if running.
    ///
    /// The instance is retired before it is stopped, so a concurrent `start`
    /// on a handle obtained earlier fails instead of running unreachable.
    pub async fn delete(&self, id: AutomationId) -> Result<()> {
        let managed = self
            .automations
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("Automation not found: {}", id)))?;

        managed.retire().await;
        info!("Deleted automation {}", id.short());
        Ok(())
    }

    /// Stop every running instance; returns the ids that were stopped
    pub async fn stop_all(&self) -> Vec<AutomationId> {
        let running: Vec<Arc<ManagedAutomation>> = {
            let automations = self.automations.read().await;
            automations
                .values()
                .filter(|a| a.is_running())
                .cloned()
                .collect()
        };

        if running.is_empty() {
            debug!("stop_all: nothing running");
            return Vec::new();
        }

        let stops = running.iter().map(|a| async move {
            a.stop().await;
            a.id()
        });
        let stopped: Vec<AutomationId> = futures::future::join_all(stops).await;

        warn!("Stopped {} running automations", stopped.len());
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AutomationState;

    fn registry() -> AutomationRegistry {
        AutomationRegistry::with_builtins(StatusPublisher::new(64))
    }

    #[tokio::test]
    async fn test_create_unknown_type() {
        let registry = registry();
        let err = registry.create("DoesNotExist").await.unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let status = registry.create("TicketBuyerAutomation").await.unwrap();
        assert_eq!(status.status, AutomationState::Stopped);
        assert_eq!(status.name, "Ticket Buyer");

        let fetched = registry.status(status.id).await.unwrap();
        assert_eq!(fetched, status);
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let registry = registry();
        let id = AutomationId::new();

        assert!(matches!(registry.status(id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            registry.start(id, AutomationConfig::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(registry.stop(id).await, Err(Error::NotFound(_))));
        assert!(matches!(registry.delete(id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes() {
        let registry = registry();
        let status = registry.create("NewsMonitorAutomation").await.unwrap();

        registry.delete(status.id).await.unwrap();
        assert!(registry.is_empty().await);
        assert!(matches!(
            registry.delete(status.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_available_types() {
        let types = registry().available_types();
        assert_eq!(types.len(), 2);
        assert!(types.iter().any(|t| t.kind == "NewsMonitorAutomation"));
    }

    #[tokio::test]
    async fn test_stop_all_with_nothing_running() {
        let registry = registry();
        registry.create("NewsMonitorAutomation").await.unwrap();
        assert!(registry.stop_all().await.is_empty());
    }
}
