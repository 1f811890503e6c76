//! Automation lifecycle - per-instance state machine
//!
//! ```text
//!            start(config)                 run() returns Ok
//!   stopped ──────────────► running ─────────────────────► stopped
//!      ▲                     │   │
//!      │      stop()         │   │ run() returns Err / panics
//!      └─────────────────────┘   └───────────────────────► error
//!                                                            │
//!   error ──────────────── start(config) ───────────────────►┘ running
//! ```
//!
//! Every accepted transition publishes exactly one snapshot, and it is
//! published while the state lock is held so observers see transitions in
//! the order they happened.
//!
//! Each `start` bumps a generation counter. An execution task only writes
//! its terminal state if its generation is still current and the state is
//! still `running`; a task that outlived a timed-out `stop()` join therefore
//! can never clobber a later run.

use crate::automation::{Automation, RunContext};
use crate::publisher::StatusPublisher;
use crate::state::AutomationState;
use crate::status::{AutomationConfig, AutomationId, AutomationStatus};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use hub_foundation::{AutomationSettings, Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Live execution of one generation
struct RunSlot {
    generation: u64,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Mutable part of an automation
struct LifecycleState {
    state: AutomationState,
    config: AutomationConfig,
    last_run: Option<DateTime<Utc>>,
    error_message: Option<String>,
    generation: u64,
    run: Option<RunSlot>,
    /// Removed from its registry; `start` is refused from then on
    retired: bool,
}

/// State shared between the handle and its execution task
struct Shared {
    id: AutomationId,
    kind: String,
    name: String,
    description: String,
    publisher: StatusPublisher,
    inner: Mutex<LifecycleState>,
}

impl Shared {
    fn snapshot(&self, inner: &LifecycleState) -> AutomationStatus {
        AutomationStatus {
            id: self.id,
            kind: self.kind.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            status: inner.state,
            config: inner.config.clone(),
            last_run: inner.last_run,
            error_message: inner.error_message.clone(),
        }
    }

    /// Publish the current state. Caller holds the state lock.
    fn publish(&self, inner: &LifecycleState) -> AutomationStatus {
        let snapshot = self.snapshot(inner);
        self.publisher.publish(snapshot.clone());
        snapshot
    }
}

/// An automation instance under lifecycle supervision
pub struct ManagedAutomation {
    shared: Arc<Shared>,
    automation: Arc<dyn Automation>,
    settings: AutomationSettings,
    /// Serializes `start` / `stop` on this instance
    control: tokio::sync::Mutex<()>,
}

impl ManagedAutomation {
    pub fn new(
        kind: impl Into<String>,
        automation: Arc<dyn Automation>,
        publisher: StatusPublisher,
        settings: AutomationSettings,
    ) -> Self {
        let shared = Shared {
            id: AutomationId::new(),
            kind: kind.into(),
            name: automation.name().to_string(),
            description: automation.description().to_string(),
            publisher,
            inner: Mutex::new(LifecycleState {
                state: AutomationState::Stopped,
                config: AutomationConfig::new(),
                last_run: None,
                error_message: None,
                generation: 0,
                run: None,
                retired: false,
            }),
        };

        Self {
            shared: Arc::new(shared),
            automation,
            settings,
            control: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> AutomationId {
        self.shared.id
    }

    pub fn kind(&self) -> &str {
        &self.shared.kind
    }

    pub fn state(&self) -> AutomationState {
        self.shared.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Current snapshot
    pub fn status(&self) -> AutomationStatus {
        let inner = self.shared.inner.lock();
        self.shared.snapshot(&inner)
    }

    /// Start with `config`, replacing any previous config.
    ///
    /// Rejected with `AlreadyRunning` while `running`; nothing is modified
    /// in that case.
    pub async fn start(&self, config: AutomationConfig) -> Result<AutomationStatus> {
        let _control = self.control.lock().await;

        let (ctx, generation, snapshot) = {
            let mut inner = self.shared.inner.lock();
            if inner.retired {
                return Err(Error::NotFound(format!(
                    "Automation not found: {}",
                    self.shared.id
                )));
            }
            if !inner.state.can_start() {
                return Err(Error::AlreadyRunning(format!(
                    "Automation {} is already running",
                    self.shared.id
                )));
            }

            let cancel = CancellationToken::new();
            inner.config = config;
            inner.error_message = None;
            inner.state = AutomationState::Running;
            inner.last_run = Some(Utc::now());
            inner.generation += 1;

            let ctx = RunContext::new(
                self.shared.id,
                inner.config.clone(),
                cancel,
                self.settings.error_backoff(),
                self.settings.http_timeout(),
            );
            let snapshot = self.shared.publish(&inner);
            (ctx, inner.generation, snapshot)
        };

        let cancel = ctx.cancel_token();
        let join = tokio::spawn(execute(
            Arc::clone(&self.shared),
            Arc::clone(&self.automation),
            ctx,
            generation,
        ));

        self.shared.inner.lock().run = Some(RunSlot {
            generation,
            cancel,
            join,
        });

        info!(
            "Started automation {} ({}) generation {}",
            self.shared.id.short(),
            self.shared.kind,
            generation
        );
        Ok(snapshot)
    }

    /// Request cooperative cancellation and wait (bounded) for the execution
    /// task to exit. No-op unless `running`. On return the state is
    /// `stopped`.
    pub async fn stop(&self) -> AutomationStatus {
        let _control = self.control.lock().await;
        self.stop_locked().await
    }

    /// Refuse every later `start`, then stop. Called once the instance has
    /// left its registry.
    pub async fn retire(&self) -> AutomationStatus {
        let _control = self.control.lock().await;
        self.shared.inner.lock().retired = true;
        self.stop_locked().await
    }

    /// Caller holds the control lock
    async fn stop_locked(&self) -> AutomationStatus {
        let slot = {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_running() {
                return self.shared.snapshot(&inner);
            }
            inner.run.take()
        };

        if let Some(slot) = slot {
            slot.cancel.cancel();
            let timeout = self.settings.stop_timeout();
            match tokio::time::timeout(timeout, slot.join).await {
                Ok(Ok(())) => debug!(
                    "Automation {} generation {} joined",
                    self.shared.id.short(),
                    slot.generation
                ),
                Ok(Err(e)) => warn!(
                    "Automation {} execution task failed to join: {}",
                    self.shared.id.short(),
                    e
                ),
                Err(_) => warn!(
                    "Automation {} did not exit within {:?}, detaching",
                    self.shared.id.short(),
                    timeout
                ),
            }
        }

        let mut inner = self.shared.inner.lock();
        match inner.state {
            // Already self-transitioned to stopped while we waited
            AutomationState::Stopped => self.shared.snapshot(&inner),
            // Still running (join timed out) or failed during the stop
            // window: force stopped, keeping any captured error message
            _ => {
                inner.state = AutomationState::Stopped;
                info!("Stopped automation {}", self.shared.id.short());
                self.shared.publish(&inner)
            }
        }
    }
}

impl std::fmt::Debug for ManagedAutomation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedAutomation")
            .field("id", &self.shared.id)
            .field("kind", &self.shared.kind)
            .field("state", &self.state())
            .finish()
    }
}

/// Execution task body: run the automation, then record how it ended
async fn execute(
    shared: Arc<Shared>,
    automation: Arc<dyn Automation>,
    ctx: RunContext,
    generation: u64,
) {
    let outcome = AssertUnwindSafe(automation.run(&ctx)).catch_unwind().await;

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(panic_message(panic)),
    };

    let mut inner = shared.inner.lock();
    if inner.generation != generation || !inner.state.is_running() {
        debug!(
            "Automation {} generation {} finished after being superseded",
            shared.id.short(),
            generation
        );
        return;
    }

    match failure {
        None => {
            inner.state = AutomationState::Stopped;
            info!("Automation {} finished", shared.id.short());
        }
        Some(message) => {
            let message = if message.trim().is_empty() {
                "automation failed without a message".to_string()
            } else {
                message
            };
            error!("Automation {} failed: {}", shared.id.short(), message);
            inner.state = AutomationState::Error;
            inner.error_message = Some(message);
        }
    }
    shared.publish(&inner);
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::ConfigField;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Loops on the token until cancelled
    struct Looping;

    #[async_trait]
    impl Automation for Looping {
        fn name(&self) -> &str {
            "Looping"
        }
        fn description(&self) -> &str {
            "waits on the token"
        }
        fn config_schema(&self) -> Vec<ConfigField> {
            Vec::new()
        }
        async fn run(&self, ctx: &RunContext) -> Result<()> {
            while !ctx.wait(Duration::from_millis(20)).await {}
            Ok(())
        }
    }

    /// Fails, or panics when config has `"panic": true`
    struct Failing;

    #[async_trait]
    impl Automation for Failing {
        fn name(&self) -> &str {
            "Failing"
        }
        fn description(&self) -> &str {
            "fails immediately"
        }
        fn config_schema(&self) -> Vec<ConfigField> {
            Vec::new()
        }
        async fn run(&self, ctx: &RunContext) -> Result<()> {
            if ctx.config().get("panic").is_some() {
                panic!("kaboom");
            }
            Err(Error::Internal("upstream exploded".into()))
        }
    }

    /// Ignores cancellation for a long time
    struct Stubborn;

    #[async_trait]
    impl Automation for Stubborn {
        fn name(&self) -> &str {
            "Stubborn"
        }
        fn description(&self) -> &str {
            "ignores stop"
        }
        fn config_schema(&self) -> Vec<ConfigField> {
            Vec::new()
        }
        async fn run(&self, _ctx: &RunContext) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn settings() -> AutomationSettings {
        AutomationSettings {
            stop_timeout_secs: 1,
            error_backoff_secs: 1,
            status_channel_capacity: 64,
            http_timeout_secs: 1,
        }
    }

    fn managed(automation: Arc<dyn Automation>) -> (ManagedAutomation, StatusPublisher) {
        let publisher = StatusPublisher::new(64);
        let managed = ManagedAutomation::new("Test", automation, publisher.clone(), settings());
        (managed, publisher)
    }

    fn config(value: serde_json::Value) -> AutomationConfig {
        match value {
            serde_json::Value::Object(map) => map,
            _ => AutomationConfig::new(),
        }
    }

    async fn wait_for_state(managed: &ManagedAutomation, state: AutomationState) {
        for _ in 0..100 {
            if managed.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("state never became {}", state);
    }

    fn drain(rx: &mut broadcast::Receiver<AutomationStatus>) -> Vec<AutomationState> {
        let mut states = Vec::new();
        while let Ok(status) = rx.try_recv() {
            states.push(status.status);
        }
        states
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let (managed, publisher) = managed(Arc::new(Looping));
        let status = managed.status();
        assert_eq!(status.status, AutomationState::Stopped);
        assert!(status.last_run.is_none());
        assert!(status.error_message.is_none());
        assert_eq!(status.name, "Looping");
        assert_eq!(publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let (managed, publisher) = managed(Arc::new(Looping));
        let mut rx = publisher.subscribe();

        let status = managed
            .start(config(serde_json::json!({ "k": "v" })))
            .await
            .unwrap();
        assert_eq!(status.status, AutomationState::Running);
        assert!(status.last_run.is_some());
        assert_eq!(status.config["k"], "v");

        let status = managed.stop().await;
        assert_eq!(status.status, AutomationState::Stopped);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            drain(&mut rx),
            vec![AutomationState::Running, AutomationState::Stopped]
        );
    }

    #[tokio::test]
    async fn test_start_while_running_is_rejected_without_changes() {
        let (managed, _publisher) = managed(Arc::new(Looping));
        managed
            .start(config(serde_json::json!({ "round": 1 })))
            .await
            .unwrap();
        let before = managed.status();

        let err = managed
            .start(config(serde_json::json!({ "round": 2 })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning(_)));

        let after = managed.status();
        assert_eq!(after.config, before.config);
        assert_eq!(after.last_run, before.last_run);
        assert_eq!(after.error_message, before.error_message);

        managed.stop().await;
    }

    #[tokio::test]
    async fn test_stop_twice_publishes_once() {
        let (managed, publisher) = managed(Arc::new(Looping));
        managed.start(AutomationConfig::new()).await.unwrap();

        managed.stop().await;
        let count = publisher.published_count();
        let status = managed.stop().await;

        assert_eq!(status.status, AutomationState::Stopped);
        assert_eq!(publisher.published_count(), count);
    }

    #[tokio::test]
    async fn test_error_is_captured_and_cleared_on_restart() {
        let (managed, _publisher) = managed(Arc::new(Failing));
        managed.start(AutomationConfig::new()).await.unwrap();
        wait_for_state(&managed, AutomationState::Error).await;

        let status = managed.status();
        assert!(status
            .error_message
            .as_deref()
            .unwrap()
            .contains("upstream exploded"));

        // stop() is a no-op outside running
        assert_eq!(managed.stop().await.status, AutomationState::Error);

        let status = managed.start(AutomationConfig::new()).await.unwrap();
        assert_eq!(status.status, AutomationState::Running);
        assert!(status.error_message.is_none());
        wait_for_state(&managed, AutomationState::Error).await;
    }

    #[tokio::test]
    async fn test_panic_becomes_error_state() {
        let (managed, _publisher) = managed(Arc::new(Failing));
        managed
            .start(config(serde_json::json!({ "panic": true })))
            .await
            .unwrap();
        wait_for_state(&managed, AutomationState::Error).await;

        let message = managed.status().error_message.unwrap();
        assert!(message.contains("kaboom"), "unexpected message: {}", message);
    }

    #[tokio::test]
    async fn test_stop_with_unresponsive_task_is_bounded() {
        let (managed, _publisher) = managed(Arc::new(Stubborn));
        managed.start(AutomationConfig::new()).await.unwrap();

        let started = std::time::Instant::now();
        let status = managed.stop().await;
        assert_eq!(status.status, AutomationState::Stopped);
        assert!(started.elapsed() < Duration::from_secs(3));

        // A fresh generation can start while the old task is still detached
        let status = managed.start(AutomationConfig::new()).await.unwrap();
        assert_eq!(status.status, AutomationState::Running);
        managed.stop().await;
    }

    #[tokio::test]
    async fn test_retired_instance_refuses_start() {
        let (managed, publisher) = managed(Arc::new(Looping));
        let mut rx = publisher.subscribe();
        managed.start(AutomationConfig::new()).await.unwrap();

        let status = managed.retire().await;
        assert_eq!(status.status, AutomationState::Stopped);

        let err = managed.start(AutomationConfig::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(managed.state(), AutomationState::Stopped);
        assert_eq!(
            drain(&mut rx),
            vec![AutomationState::Running, AutomationState::Stopped]
        );
    }
}
