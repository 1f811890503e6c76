//! Run context handed to `Automation::run`

use crate::status::{AutomationConfig, AutomationId};
use hub_foundation::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-execution view of an automation.
///
/// The cancellation token is owned by the lifecycle machine; the context only
/// observes it.
#[derive(Debug, Clone)]
pub struct RunContext {
    id: AutomationId,
    config: AutomationConfig,
    cancel: CancellationToken,
    error_backoff: Duration,
    http_timeout: Duration,
}

impl RunContext {
    pub fn new(
        id: AutomationId,
        config: AutomationConfig,
        cancel: CancellationToken,
        error_backoff: Duration,
        http_timeout: Duration,
    ) -> Self {
        Self {
            id,
            config,
            cancel,
            error_backoff,
            http_timeout,
        }
    }

    pub fn id(&self) -> AutomationId {
        self.id
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Timeout automations should put on each HTTP request
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once stop has been requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Wait up to `duration` for a stop request.
    ///
    /// Returns `true` if stop was requested (the caller should exit its loop).
    pub async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => self.cancel.is_cancelled(),
        }
    }

    /// Wait the configured back-off after a transient failure
    pub async fn backoff(&self) -> bool {
        self.wait(self.error_backoff).await
    }

    // ========== Config access ==========

    /// Text value; numbers and booleans are rendered, empty strings are `None`
    pub fn text(&self, key: &str) -> Option<String> {
        match self.config.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require_text(&self, key: &str) -> Result<String> {
        self.text(key)
            .ok_or_else(|| Error::InvalidInput(format!("Missing required config field '{}'", key)))
    }

    /// Non-negative integer given as a JSON number or a numeric string
    pub fn number_or(&self, key: &str, default: u64) -> Result<u64> {
        let invalid = || Error::InvalidInput(format!("Config field '{}' is not a number", key));

        match self.config.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(default),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    /// Polling interval in whole seconds; zero is rejected
    pub fn interval(&self, key: &str, default_secs: u64) -> Result<Duration> {
        match self.number_or(key, default_secs)? {
            0 => Err(Error::InvalidInput(format!(
                "Config field '{}' must be at least 1 second",
                key
            ))),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(config: Value) -> RunContext {
        let config = match config {
            Value::Object(map) => map,
            _ => AutomationConfig::new(),
        };
        RunContext::new(
            AutomationId::new(),
            config,
            CancellationToken::new(),
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_text_access() {
        let ctx = context(json!({ "url": "http://x", "blank": "  ", "n": 5 }));
        assert_eq!(ctx.text("url").as_deref(), Some("http://x"));
        assert_eq!(ctx.text("blank"), None);
        assert_eq!(ctx.text("n").as_deref(), Some("5"));
        assert_eq!(ctx.text_or("missing", "console"), "console");
        assert!(matches!(
            ctx.require_text("missing"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_number_access() {
        let ctx = context(json!({ "a": 30, "b": "600", "c": "soon", "d": -1 }));
        assert_eq!(ctx.number_or("a", 1).unwrap(), 30);
        assert_eq!(ctx.number_or("b", 1).unwrap(), 600);
        assert_eq!(ctx.number_or("missing", 300).unwrap(), 300);
        assert!(ctx.number_or("c", 1).is_err());
        assert!(ctx.number_or("d", 1).is_err());
    }

    #[test]
    fn test_interval_rejects_zero() {
        let ctx = context(json!({ "fast": 0, "slow": "5" }));
        assert!(matches!(ctx.interval("fast", 60), Err(Error::InvalidInput(_))));
        assert_eq!(ctx.interval("slow", 60).unwrap(), Duration::from_secs(5));
        assert_eq!(ctx.interval("missing", 60).unwrap(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_wait_returns_early_on_cancel() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(
            AutomationId::new(),
            AutomationConfig::new(),
            token.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        let started = std::time::Instant::now();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        assert!(ctx.wait(Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_times_out_without_cancel() {
        let ctx = context(json!({}));
        assert!(!ctx.wait(Duration::from_millis(20)).await);
        assert!(!ctx.backoff().await);
    }
}
