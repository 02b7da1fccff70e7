//! Run Command
//!
//! Process every incomplete tile of a pipeline. Ctrl+C stops dispatching;
//! tiles already running finish and the progress table is still reconciled.

use std::time::Instant;

use tracing::warn;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::monitor::format_duration;
use crate::scheduler::{BatchRunner, RunOptions, RunReport, shutdown_channel};
use crate::types::Result;

pub async fn run(ctx: &CommandContext, pipeline: &str, options: RunOptions) -> Result<RunReport> {
    let pipeline = ctx.pipeline(pipeline)?;
    let started = Instant::now();

    let (trigger, shutdown) = shutdown_channel();
    let signal = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Stop requested; waiting for running tiles to finish");
                trigger.trigger();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let result = BatchRunner::new(&ctx.config)
        .run(&pipeline, options, shutdown)
        .await;
    signal.abort();
    let report = result?;

    print_report(&report, started.elapsed().as_secs());
    Ok(report)
}

fn print_report(report: &RunReport, elapsed_secs: u64) {
    let out = Output::new();
    out.header(&format!("Pipeline '{}'", report.pipeline));
    out.field("Tiles", report.total);
    out.field("Skipped", report.skipped);
    out.field("Processed", report.summary.dispatched);
    out.field("Succeeded", report.summary.complete);
    out.field("Failed", report.summary.incomplete);
    out.field("Elapsed", format_duration(elapsed_secs));
    println!();

    if report.remaining() == 0 {
        out.success(&format!("All {} tiles complete", report.total));
    } else {
        out.warning(&format!(
            "{} of {} tiles not complete; run again to retry them",
            report.remaining(),
            report.total
        ));
    }
}
