//! Automations - user-defined polling jobs with a start/stop lifecycle
//!
//! Every automation kind implements [`Automation`]. The body in
//! [`Automation::run`] owns no cancellation state: it observes the token
//! through [`RunContext`] and must only suspend on [`RunContext::wait`]
//! (or on its own bounded I/O) so that a `stop()` can join it promptly.

mod catalog;
mod context;
mod news_monitor;
mod schema;
mod ticket_buyer;

pub use catalog::{AutomationCatalog, AutomationConstructor, AutomationType};
pub use context::RunContext;
pub use news_monitor::{ContentChange, ContentTracker, NewsMonitorAutomation, NotificationMethod};
pub use schema::{ConfigField, FieldType};
pub use ticket_buyer::{TicketBuyerAutomation, TicketQuery};

use async_trait::async_trait;
use hub_foundation::Result;

/// Automation capability - implement to add a new automation kind
#[async_trait]
pub trait Automation: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// One-line description
    fn description(&self) -> &str;

    /// Form fields for callers that render a config editor.
    /// The supervisor never validates against it.
    fn config_schema(&self) -> Vec<ConfigField>;

    /// Execution body, run on a dedicated task until it returns or the
    /// token fires. Transient failures should be logged and followed by
    /// [`RunContext::backoff`]; an `Err` (or panic) escaping here moves the
    /// automation to `error`.
    async fn run(&self, ctx: &RunContext) -> Result<()>;
}
