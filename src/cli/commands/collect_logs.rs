//! Collect-logs Command
//!
//! Append the artifacts left in every slot's scratch directory to one
//! session log under the log root.

use std::fs::{self, File};
use std::io::BufWriter;

use chrono::Local;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::logs::LogAggregator;
use crate::scheduler::ScratchArena;
use crate::types::Result;

pub fn run(ctx: &CommandContext, pipeline: &str, slots: Option<usize>) -> Result<()> {
    ctx.require_pipeline(pipeline)?;
    let slots = slots.unwrap_or(ctx.config.scheduler.pool_size);
    let aggregator = LogAggregator::from_config(&ctx.config);
    let arena = ScratchArena::new(&ctx.config.paths.scratch_root);

    let path = aggregator.session_log_path(pipeline, Local::now());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut sink = BufWriter::new(File::create(&path)?);
    let report = aggregator.collect_slots(&arena, slots, &mut sink)?;

    let out = Output::new();
    out.success(&format!(
        "Collected {} file(s) from {} slot(s) into {}",
        report.collected,
        slots,
        path.display()
    ));
    if report.missing > 0 {
        out.info(&format!("{} expected file(s) were not present", report.missing));
    }
    Ok(())
}
