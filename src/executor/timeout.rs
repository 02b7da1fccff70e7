//! Step timeouts
//!
//! Steps run without a limit unless one is configured, either per step
//! (`timeout_secs`) or as the scheduler default (`scheduler.step_timeout_secs`).

use std::future::Future;
use std::time::Duration;

use crate::types::{BatchError, Result};

/// Effective timeout for a step; the step setting wins over the default
pub fn step_timeout(step_secs: Option<u64>, default_secs: Option<u64>) -> Option<Duration> {
    step_secs.or(default_secs).map(Duration::from_secs)
}

/// Await `future`, bounded by `limit` when one is set
///
/// Dropping the future on timeout drops whatever it owns, so a child process
/// spawned with `kill_on_drop` is killed.
pub async fn with_timeout<T, F>(limit: Option<Duration>, future: F, operation: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| BatchError::timeout(operation, limit)),
        None => Ok(future.await),
    }
}
