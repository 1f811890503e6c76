//! Automation and script run state machines

use serde::{Deserialize, Serialize};

/// Possible states of an automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationState {
    /// Not executing (initial state, and the state after `stop`)
    Stopped,

    /// Execution task is live
    Running,

    /// `run()` escaped with an error or a panic
    Error,

    /// Reserved; nothing transitions into it
    Scheduled,
}

impl AutomationState {
    /// `start` is accepted only from these states
    pub fn can_start(&self) -> bool {
        matches!(self, AutomationState::Stopped | AutomationState::Error)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, AutomationState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationState::Stopped => "stopped",
            AutomationState::Running => "running",
            AutomationState::Error => "error",
            AutomationState::Scheduled => "scheduled",
        }
    }
}

impl Default for AutomationState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for AutomationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Possible states of a script run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptRunState {
    /// Process is live
    Running,

    /// Exited with code 0
    Completed,

    /// Exited with a non-zero code or by signal
    Failed,

    /// Launch or runtime fault
    Error,

    /// Wall-clock ceiling hit, process killed
    Timeout,

    /// Terminated on request
    Stopped,
}

impl ScriptRunState {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScriptRunState::Running)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ScriptRunState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptRunState::Running => "running",
            ScriptRunState::Completed => "completed",
            ScriptRunState::Failed => "failed",
            ScriptRunState::Error => "error",
            ScriptRunState::Timeout => "timeout",
            ScriptRunState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ScriptRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automation_start_guard() {
        assert!(AutomationState::Stopped.can_start());
        assert!(AutomationState::Error.can_start());
        assert!(!AutomationState::Running.can_start());
        assert_eq!(AutomationState::default(), AutomationState::Stopped);
    }

    #[test]
    fn test_script_terminal_states() {
        assert!(!ScriptRunState::Running.is_terminal());
        for state in [
            ScriptRunState::Completed,
            ScriptRunState::Failed,
            ScriptRunState::Error,
            ScriptRunState::Timeout,
            ScriptRunState::Stopped,
        ] {
            assert!(state.is_terminal(), "{} should be terminal", state);
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_value(AutomationState::Running).unwrap(),
            serde_json::json!("running")
        );
        assert_eq!(
            serde_json::to_value(ScriptRunState::Timeout).unwrap(),
            serde_json::json!("timeout")
        );
    }
}
