//! Config - AutoHub settings
//!
//! - `hub.rs` - HubConfig with automation and script supervisor sections

mod hub;

pub use hub::{AutomationSettings, HubConfig, ScriptSettings, HUB_CONFIG_FILE};
