//! Monitor Command
//!
//! Observe a pipeline from a separate terminal. Reads only.

use std::time::Duration;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::monitor::ProgressMonitor;
use crate::types::Result;

pub async fn run(
    ctx: &CommandContext,
    pipeline: &str,
    interval_secs: Option<u64>,
    once: bool,
) -> Result<()> {
    ctx.require_pipeline(pipeline)?;

    let interval =
        Duration::from_secs(interval_secs.unwrap_or(ctx.config.monitor.interval_secs).max(1));
    let mut monitor = ProgressMonitor::from_config(&ctx.config, pipeline);
    let snapshot = monitor.run(interval, once).await?;

    if snapshot.is_finished() {
        Output::new().success(&format!("'{}' finished: {} tiles", pipeline, snapshot.total));
    }
    Ok(())
}
