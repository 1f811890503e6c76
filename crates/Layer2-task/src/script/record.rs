//! Script run records

use crate::state::ScriptRunState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Short run identifier (8 hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Random candidate; uniqueness is enforced by the supervisor
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immediate answer to `run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTicket {
    pub id: RunId,
    pub filename: String,
    pub status: ScriptRunState,
}

/// One execution of a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRun {
    pub id: RunId,
    pub filename: String,
    pub status: ScriptRunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Captured stdout, capped at the configured byte budget
    pub output: String,

    /// Captured stderr, or the fault message for `error` runs
    pub error: String,

    /// Exit code once the process has exited normally
    pub return_code: Option<i32>,

    /// OS pid while `running`; cleared on every terminal transition
    pub pid: Option<u32>,
}

impl ScriptRun {
    pub(crate) fn started(id: RunId, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            status: ScriptRunState::Running,
            started_at: Utc::now(),
            finished_at: None,
            output: String::new(),
            error: String::new(),
            return_code: None,
            pid: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Wall-clock duration, up to now for running records
    pub fn duration(&self) -> std::time::Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    pub fn ticket(&self) -> RunTicket {
        RunTicket {
            id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status,
        }
    }
}

/// Entry of the script catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub filename: String,
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let id = RunId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_started_record() {
        let run = ScriptRun::started(RunId::from("abcd1234"), "hello.sh");
        assert!(run.is_running());
        assert!(run.finished_at.is_none());
        assert!(run.return_code.is_none());

        let ticket = run.ticket();
        assert_eq!(ticket.id.as_str(), "abcd1234");
        assert_eq!(ticket.status, ScriptRunState::Running);
    }
}
