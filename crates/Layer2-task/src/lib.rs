//! # hub-task
//!
//! Automation and script supervision for AutoHub.
//! Runs long-lived polling automations and one-shot scripts as supervised
//! background work.
//!
//! ## Features
//!
//! - Automation catalog, registry and per-instance lifecycle state machine
//! - Cooperative, bounded stop with panic isolation
//! - Non-blocking status fan-out to any number of subscribers
//! - Script runs with output capture, hard timeout and process-group kill
//! - Bounded script run history

pub mod automation;
pub mod hub;
pub mod lifecycle;
pub mod publisher;
pub mod registry;
pub mod script;
pub mod state;
pub mod status;

// Automation system
pub use automation::{
    Automation, AutomationCatalog, AutomationConstructor, AutomationType, ConfigField,
    ContentChange, ContentTracker, FieldType, NewsMonitorAutomation, NotificationMethod,
    RunContext, TicketBuyerAutomation, TicketQuery,
};
pub use lifecycle::ManagedAutomation;
pub use publisher::StatusPublisher;
pub use registry::AutomationRegistry;
pub use state::{AutomationState, ScriptRunState};
pub use status::{AutomationConfig, AutomationId, AutomationStatus};

// Script system
pub use script::{OutputCapture, RunId, RunTicket, ScriptInfo, ScriptRun, ScriptSupervisor};

pub use hub::Hub;
