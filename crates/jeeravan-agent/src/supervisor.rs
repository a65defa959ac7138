// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide tracking of background work.
//!
//! Connection workers and pipeline tails are spawned here so that shutdown
//! (and tests) can wait for them instead of racing them.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Cancelled when draining begins. Long-lived workers stop taking new
    /// work once this fires.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of tasks still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Signals shutdown and waits up to `timeout` for every task to finish.
    ///
    /// Returns `false` if tasks were still running at the deadline.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.shutdown.cancel();
        self.tracker.close();
        let active = self.tracker.len();
        if active > 0 {
            info!(active, "waiting for background tasks to finish");
        }
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("background tasks drained");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "drain timeout reached, abandoning tasks"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn drain_waits_for_spawned_work() {
        let supervisor = TaskSupervisor::new();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        supervisor.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(supervisor.drain(Duration::from_secs(2)).await);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(supervisor.active(), 0);
    }

    #[tokio::test]
    async fn drain_gives_up_at_deadline() {
        let supervisor = TaskSupervisor::new();
        supervisor.spawn(tokio::time::sleep(Duration::from_secs(30)));
        assert!(!supervisor.drain(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn drain_cancels_shutdown_token() {
        let supervisor = TaskSupervisor::new();
        let token = supervisor.shutdown_token();
        assert!(!token.is_cancelled());
        supervisor.drain(Duration::from_millis(10)).await;
        assert!(token.is_cancelled());
    }
}
