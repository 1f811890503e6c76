//! Script runs - one-shot external processes under supervision
//!
//! Unlike automations there is no cooperative loop here: a run is a child
//! process with separately captured stdout/stderr, a hard wall-clock
//! ceiling, and OS-level termination.

mod capture;
mod process;
mod record;
mod supervisor;
mod validate;

pub use capture::OutputCapture;
pub use record::{RunId, RunTicket, ScriptInfo, ScriptRun};
pub use supervisor::ScriptSupervisor;
pub use validate::{validate_filename, ResolvedScript};
