//! Storage module for AutoHub
//!
//! - `json`: JSON - configuration file load/save

mod json;

pub use json::JsonStore;
