//! Hub Config - unified settings
//!
//! Load order: global file, then project file (replaces global), then
//! environment overrides.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file name
pub const HUB_CONFIG_FILE: &str = "autohub.json";

/// Env var overriding `scripts.dir`
pub const ENV_SCRIPTS_DIR: &str = "AUTOHUB_SCRIPTS_DIR";

/// Env var overriding `scripts.timeoutSecs`
pub const ENV_SCRIPT_TIMEOUT_SECS: &str = "AUTOHUB_SCRIPT_TIMEOUT_SECS";

/// Env var overriding `automation.stopTimeoutSecs`
pub const ENV_STOP_TIMEOUT_SECS: &str = "AUTOHUB_STOP_TIMEOUT_SECS";

// ============================================================================
// Hub Config
// ============================================================================

/// AutoHub settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubConfig {
    /// Automation lifecycle settings
    #[serde(default)]
    pub automation: AutomationSettings,

    /// Script run supervisor settings
    #[serde(default)]
    pub scripts: ScriptSettings,
}

impl HubConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global + project load, then env overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<HubConfig>(HUB_CONFIG_FILE)? {
                debug!("Loaded global config from {}", global.base_dir().display());
                config = global_config;
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) = project.load_optional::<HubConfig>(HUB_CONFIG_FILE)? {
                debug!("Loaded project config from {}", project.base_dir().display());
                config = project_config;
            }
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit config file, then env overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;

        let mut config: HubConfig = JsonStore::new(dir).load(filename)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `AUTOHUB_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_SCRIPTS_DIR).filter(|d| !d.is_empty()) {
            self.scripts.dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(ENV_SCRIPT_TIMEOUT_SECS).and_then(|s| s.parse().ok()) {
            self.scripts.timeout_secs = secs;
        }
        if let Some(secs) = lookup(ENV_STOP_TIMEOUT_SECS).and_then(|s| s.parse().ok()) {
            self.automation.stop_timeout_secs = secs;
        }
    }

    /// Reject values the supervisors cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.automation.stop_timeout_secs == 0 {
            return Err(Error::Config("automation.stopTimeoutSecs must be > 0".into()));
        }
        if self.automation.status_channel_capacity == 0 {
            return Err(Error::Config(
                "automation.statusChannelCapacity must be > 0".into(),
            ));
        }
        if self.scripts.timeout_secs == 0 {
            return Err(Error::Config("scripts.timeoutSecs must be > 0".into()));
        }
        if self.scripts.allowed_extensions.is_empty() {
            return Err(Error::Config("scripts.allowedExtensions is empty".into()));
        }
        for ext in &self.scripts.allowed_extensions {
            if !self.scripts.interpreters.contains_key(ext) {
                return Err(Error::Config(format!(
                    "No interpreter configured for extension '{}'",
                    ext
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Automation settings
// ============================================================================

/// Automation lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSettings {
    /// Bounded join on `stop()`
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Back-off after a transient failure inside an automation loop
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Status broadcast channel capacity
    #[serde(default = "default_status_channel_capacity")]
    pub status_channel_capacity: usize,

    /// Per-request timeout for automations doing HTTP polling
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            status_channel_capacity: default_status_channel_capacity(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl AutomationSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_stop_timeout_secs() -> u64 {
    5
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_status_channel_capacity() -> usize {
    256
}

fn default_http_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Script settings
// ============================================================================

/// Script run supervisor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSettings {
    /// Scripts root; no run may resolve outside of it
    #[serde(default = "default_scripts_dir")]
    pub dir: PathBuf,

    /// Allowed extensions, without the leading dot
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Interpreter program per extension
    #[serde(default = "default_interpreters")]
    pub interpreters: BTreeMap<String, String>,

    /// Hard wall-clock ceiling per run
    #[serde(default = "default_script_timeout_secs")]
    pub timeout_secs: u64,

    /// Captured bytes kept per stream
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Finished runs retained in history
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Length cap for launch/runtime fault messages
    #[serde(default = "default_max_error_message_chars")]
    pub max_error_message_chars: usize,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
            allowed_extensions: default_allowed_extensions(),
            interpreters: default_interpreters(),
            timeout_secs: default_script_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            history_size: default_history_size(),
            max_error_message_chars: default_max_error_message_chars(),
        }
    }
}

impl ScriptSettings {
    /// Settings rooted at `dir`, everything else default
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    pub fn interpreter_for(&self, ext: &str) -> Option<&str> {
        self.interpreters
            .get(&ext.to_ascii_lowercase())
            .map(String::as_str)
    }
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["py".to_string(), "sh".to_string(), "bash".to_string()]
}

fn default_interpreters() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("py".to_string(), "python3".to_string());
    map.insert("sh".to_string(), "bash".to_string());
    map.insert("bash".to_string(), "bash".to_string());
    map
}

fn default_script_timeout_secs() -> u64 {
    3600
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_history_size() -> usize {
    100
}

fn default_max_error_message_chars() -> usize {
    500
}
