//! Status Command
//!
//! Summarize a pipeline's progress table, with Status Records written since
//! the last run folded in. Nothing is written back.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::constants::progress::OVERALL_COLUMN;
use crate::progress::{ProgressStore, ProgressTable};
use crate::types::{BatchError, Result, Status, TileId};

/// Machine-readable status, also used for the text rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub pipeline: String,
    pub initialized: bool,
    pub total: usize,
    pub complete: usize,
    pub incomplete: usize,
    /// Token counts per column, `processing` first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<(String, BTreeMap<String, usize>)>,
    /// Incomplete tiles with their first failed step
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TileFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileFailure {
    pub tile: String,
    pub step: Option<String>,
    pub status: String,
}

impl PipelineStatus {
    fn empty(pipeline: &str) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            initialized: false,
            total: 0,
            complete: 0,
            incomplete: 0,
            columns: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn from_table(pipeline: &str, table: &ProgressTable, detailed: bool) -> Self {
        let complete = table.complete_count();
        let mut status = Self {
            pipeline: pipeline.to_string(),
            initialized: true,
            total: table.len(),
            complete,
            incomplete: table.len() - complete,
            columns: Vec::new(),
            failures: Vec::new(),
        };

        if detailed {
            status.columns = table
                .columns()
                .iter()
                .map(|column| (column.clone(), table.column_counts(column)))
                .collect();
            status.failures = table
                .incomplete_tiles()
                .iter()
                .map(|tile| first_failure(table, tile))
                .collect();
        }
        status
    }
}

fn first_failure(table: &ProgressTable, tile: &TileId) -> TileFailure {
    let failed = table
        .columns()
        .iter()
        .filter(|column| column.as_str() != OVERALL_COLUMN)
        .find_map(|column| {
            table
                .get(tile, column)
                .filter(|status| matches!(status, Status::Failed(_)))
                .map(|status| (column.clone(), status.as_str().to_string()))
        });

    match failed {
        Some((step, status)) => TileFailure {
            tile: tile.to_string(),
            step: Some(step),
            status,
        },
        None => TileFailure {
            tile: tile.to_string(),
            step: None,
            status: table
                .overall(tile)
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
        },
    }
}

pub fn run(ctx: &CommandContext, pipeline: &str, format: &str, detailed: bool) -> Result<()> {
    ctx.require_pipeline(pipeline)?;
    let store = ProgressStore::from_config(&ctx.config);

    let status = match store.load(pipeline)? {
        Some(table) => {
            let table = store.reconcile(pipeline, table)?;
            PipelineStatus::from_table(pipeline, &table, detailed)
        }
        None => PipelineStatus::empty(pipeline),
    };

    if format == "json" {
        let json = serde_json::to_string_pretty(&status).map_err(BatchError::Json)?;
        println!("{}", json);
    } else {
        print_text(&status);
    }
    Ok(())
}

fn print_text(status: &PipelineStatus) {
    let out = Output::new();
    out.header(&format!("'{}' status", status.pipeline));

    if !status.initialized {
        out.info(&format!(
            "No progress recorded yet. Run 'tilebatch run --pipeline {}' first.",
            status.pipeline
        ));
        return;
    }

    out.field("Tiles", status.total);
    out.field("Complete", status.complete);
    out.field("Incomplete", status.incomplete);

    for (column, counts) in &status.columns {
        out.section(column);
        for (token, count) in counts {
            let ok = matches!(token.as_str(), "complete" | "success");
            out.field(&out.status(token, ok), count);
        }
    }

    if !status.failures.is_empty() {
        out.section("Incomplete tiles");
        for failure in &status.failures {
            match &failure.step {
                Some(step) => println!("  {}  {}: {}", failure.tile, step, failure.status),
                None => println!("  {}  {}", failure.tile, failure.status),
            }
        }
    }
}
