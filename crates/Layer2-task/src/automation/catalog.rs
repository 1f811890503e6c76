//! Automation catalog - maps a type tag to a constructor

use super::{Automation, ConfigField, NewsMonitorAutomation, TicketBuyerAutomation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a fresh automation instance
pub type AutomationConstructor = Arc<dyn Fn() -> Arc<dyn Automation> + Send + Sync>;

/// Description of a creatable automation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationType {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub config_schema: Vec<ConfigField>,
}

/// Registered automation kinds
#[derive(Clone, Default)]
pub struct AutomationCatalog {
    constructors: BTreeMap<String, AutomationConstructor>,
}

impl AutomationCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in automation
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("TicketBuyerAutomation", || {
            Arc::new(TicketBuyerAutomation::new())
        });
        catalog.register("NewsMonitorAutomation", || {
            Arc::new(NewsMonitorAutomation::new())
        });
        catalog
    }

    /// Register (or replace) a kind under `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Automation> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Instantiate `kind`, `None` if it is not registered
    pub fn instantiate(&self, kind: &str) -> Option<Arc<dyn Automation>> {
        self.constructors.get(kind).map(|ctor| ctor())
    }

    /// Describe every registered kind, sorted by type tag
    pub fn describe(&self) -> Vec<AutomationType> {
        self.constructors
            .iter()
            .map(|(kind, ctor)| {
                let automation = ctor();
                AutomationType {
                    kind: kind.clone(),
                    name: automation.name().to_string(),
                    description: automation.description().to_string(),
                    config_schema: automation.config_schema(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl std::fmt::Debug for AutomationCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationCatalog")
            .field("kinds", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let catalog = AutomationCatalog::builtin();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("NewsMonitorAutomation"));
        assert!(catalog.contains("TicketBuyerAutomation"));
        assert!(catalog.instantiate("Nope").is_none());

        let types = catalog.describe();
        let kinds: Vec<_> = types.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(kinds, vec!["NewsMonitorAutomation", "TicketBuyerAutomation"]);
        assert_eq!(types[0].name, "News Monitor");
        assert!(!types[1].config_schema.is_empty());
    }

    #[test]
    fn test_instances_are_independent() {
        let catalog = AutomationCatalog::builtin();
        let a = catalog.instantiate("NewsMonitorAutomation").unwrap();
        let b = catalog.instantiate("NewsMonitorAutomation").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
