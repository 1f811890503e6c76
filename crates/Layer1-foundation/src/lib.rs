//! # hub-foundation
//!
//! Foundation layer for AutoHub:
//! - Error: the shared error taxonomy used by every layer
//! - Config: `HubConfig` with automation and script supervisor settings
//! - Storage: `JsonStore` for loading configuration files
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  hub-cli (Layer3)                            │
//! │      │                                       │
//! │      ▼                                       │
//! │  hub-task (Layer2)                           │
//! │  ├── AutomationRegistry ── StatusPublisher   │
//! │  └── ScriptSupervisor                        │
//! │      │                                       │
//! │      ▼                                       │
//! │  hub-foundation (Layer1)                     │
//! │  ├── Error / Result                          │
//! │  ├── HubConfig                               │
//! │  └── JsonStore                               │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{AutomationSettings, HubConfig, ScriptSettings, HUB_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;
