//! Status publisher - fan-out of automation status snapshots
//!
//! Publishing is a non-blocking `broadcast::send`, so a slow subscriber can
//! never stall an automation's execution task. Subscribers that fall behind
//! by more than the channel capacity observe `RecvError::Lagged` and skip
//! ahead (best-effort delivery).

use crate::status::AutomationStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Status publisher shared by the registry and every automation it creates
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    sender: broadcast::Sender<AutomationStatus>,
    published: Arc<AtomicU64>,
}

impl StatusPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish one snapshot. Never blocks; dropped when nobody listens.
    pub fn publish(&self, status: AutomationStatus) {
        self.published.fetch_add(1, Ordering::Relaxed);
        trace!("Publishing status {} -> {}", status.id.short(), status.status);
        // Err only means there are no subscribers right now
        let _ = self.sender.send(status);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutomationStatus> {
        self.sender.subscribe()
    }

    /// Total snapshots published since construction
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AutomationState;
    use crate::status::{AutomationConfig, AutomationId};

    fn snapshot(state: AutomationState) -> AutomationStatus {
        AutomationStatus {
            id: AutomationId::new(),
            kind: "Test".into(),
            name: "Test".into(),
            description: String::new(),
            status: state,
            config: AutomationConfig::new(),
            last_run: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let publisher = StatusPublisher::new(4);
        publisher.publish(snapshot(AutomationState::Running));
        assert_eq!(publisher.published_count(), 1);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let publisher = StatusPublisher::new(4);
        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();

        publisher.publish(snapshot(AutomationState::Running));

        assert_eq!(a.recv().await.unwrap().status, AutomationState::Running);
        assert_eq!(b.recv().await.unwrap().status, AutomationState::Running);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let publisher = StatusPublisher::new(2);
        let mut rx = publisher.subscribe();

        for _ in 0..5 {
            publisher.publish(snapshot(AutomationState::Stopped));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
