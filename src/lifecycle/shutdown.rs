//! Shutdown coordination.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Owns a broadcast channel every long-running task subscribes to, plus the
/// handles of the tasks it spawned so `complete` can wait for them.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Spawned background tasks, by name.
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Vec::new(),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Spawn a background task that receives its own shutdown receiver.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.subscribe()));
        tracing::debug!(task = name, "Background task started");
        self.tasks.push((name, handle));
    }

    /// Number of tracked background tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Trigger shutdown and wait up to `grace` for each tracked task.
    ///
    /// Tasks still running after the grace period are aborted.
    pub async fn complete(self, grace: Duration) {
        self.trigger();
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task failed"),
                Err(_) => {
                    tracing::warn!(task = name, "Background task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_complete_waits_for_tasks() {
        let mut shutdown = Shutdown::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        shutdown.spawn("worker", move |mut rx| async move {
            let _ = rx.recv().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(shutdown.task_count(), 1);

        shutdown.complete(Duration::from_secs(1)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let mut shutdown = Shutdown::new();
        shutdown.spawn("stuck", |_rx| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        tokio::time::timeout(Duration::from_secs(2), shutdown.complete(Duration::from_millis(20)))
            .await
            .expect("complete should not hang");
    }

    #[tokio::test]
    async fn test_external_subscribers_are_signalled() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }
}
