//! Automation identity and status snapshots

use crate::state::AutomationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form automation configuration, replaced wholesale on every `start`
pub type AutomationConfig = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for an automation instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutomationId(pub Uuid);

impl AutomationId {
    /// Generate a new random AutomationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters, for log lines
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AutomationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AutomationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AutomationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Externally visible projection of an automation, sent to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationStatus {
    pub id: AutomationId,

    /// Registered type tag the instance was created from
    #[serde(rename = "type")]
    pub kind: String,

    pub name: String,
    pub description: String,
    pub status: AutomationState,
    pub config: AutomationConfig,

    /// Set when execution begins, not when it ends
    pub last_run: Option<DateTime<Utc>>,

    /// Set on entering `error`, cleared on the next `start`
    pub error_message: Option<String>,
}

impl AutomationStatus {
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip_through_string() {
        let id = AutomationId::new();
        let parsed: AutomationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_snapshot_shape() {
        let status = AutomationStatus {
            id: AutomationId::new(),
            kind: "NewsMonitorAutomation".into(),
            name: "News Monitor".into(),
            description: "watches".into(),
            status: AutomationState::Stopped,
            config: AutomationConfig::new(),
            last_run: None,
            error_message: None,
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "stopped");
        assert_eq!(value["type"], "NewsMonitorAutomation");
        assert!(value["last_run"].is_null());
        assert!(value["error_message"].is_null());
        assert!(value["id"].is_string());
    }
}
