//! Worker Pool / Scheduler
//!
//! Runs a pipeline over the incomplete tiles with a bounded number of slots.
//!
//! ## Architecture
//!
//! ```text
//! BatchRunner ──► ProgressStore::initialize ──► incomplete tiles
//!      │
//!      ▼
//! WorkerPool ──► JoinSet[slot 1..N] ──► per tile: steps ─► gather ─► status.csv
//!      │
//!      ▼
//! ProgressStore::reconcile ──► overall_progress.csv
//! ```

mod driver;
mod pool;
mod slot;

pub use driver::{BatchRunner, RunOptions, RunReport};
pub use pool::{PoolOptions, RunSummary, WorkerPool};
pub use slot::{ScratchArena, Slot};

use tokio::sync::watch;

/// Receiving side of a cooperative stop request
///
/// Slots check it before taking a tile; in-flight tiles always finish.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side of a cooperative stop request
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Create a linked trigger / shutdown pair
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested; pends forever if the trigger is gone
    pub async fn wait(&mut self) {
        let closed = self.rx.wait_for(|stop| *stop).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_trigger() {
        let (trigger, mut shutdown) = shutdown_channel();
        assert!(!shutdown.is_triggered());

        trigger.trigger();
        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_trigger_never_fires() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);
        assert!(!shutdown.is_triggered());
        let waited = tokio::time::timeout(Duration::from_millis(20), shutdown.wait()).await;
        assert!(waited.is_err());
    }
}
