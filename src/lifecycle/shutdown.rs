//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Time servers get to finish in-flight work once shutdown is triggered.
/// Event streams never end on their own, so a deadline is required.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves when `rx` observes the signal (or its sender is gone).
pub async fn signalled(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

/// Await `task` for at most `grace`, aborting it afterwards.
pub async fn drain<T>(name: &str, mut task: JoinHandle<T>, grace: Duration) {
    match tokio::time::timeout(grace, &mut task).await {
        Ok(_) => tracing::info!(task = name, "Stopped"),
        Err(_) => {
            tracing::warn!(task = name, grace = ?grace, "Did not stop in time, aborting");
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let first = tokio::spawn(signalled(shutdown.subscribe()));
        let second = tokio::spawn(signalled(shutdown.subscribe()));
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        first.await.unwrap();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn drain_aborts_stuck_tasks() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let stuck = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });

        drain("stuck", stuck, Duration::from_millis(20)).await;
        // The task owned the sender, so aborting it closes the channel.
        assert!(rx.await.is_err());
    }
}
