//! Reset Command
//!
//! Discard recorded progress so tiles are processed again.
//!
//! Usage:
//!   tilebatch reset --pipeline <name>                 # whole pipeline
//!   tilebatch reset --pipeline <name> --tile 6239_447  # selected tiles

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, confirm, parse_tiles};
use crate::progress::ProgressStore;
use crate::types::Result;

pub fn run(ctx: &CommandContext, pipeline: &str, tiles: &[String], yes: bool) -> Result<()> {
    ctx.require_pipeline(pipeline)?;
    let tiles = parse_tiles(tiles)?;
    let store = ProgressStore::from_config(&ctx.config);
    let out = Output::new();

    let target = if tiles.is_empty() {
        format!("all progress and logs of '{}'", pipeline)
    } else {
        format!("{} tile(s) of '{}'", tiles.len(), pipeline)
    };

    if !yes && !confirm(&format!("Reset {}?", target))? {
        out.info("Aborted");
        return Ok(());
    }

    let report = store.reset(pipeline, &tiles)?;
    if tiles.is_empty() {
        if report.pipeline_removed {
            out.success(&format!("Removed {}", store.pipeline_dir(pipeline).display()));
        } else {
            out.info("Nothing to reset");
        }
    } else {
        out.success(&format!(
            "Reset {} row(s), removed {} log folder(s)",
            report.rows_reset, report.tiles_removed
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PipelineConfig};
    use crate::types::{BatchError, TileId};
    use std::fs;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> CommandContext {
        let mut config = Config::default();
        config.tiles.input_dir = "data/laz".into();
        config
            .pipelines
            .insert("process_tiles".to_string(), PipelineConfig::default());
        CommandContext {
            config: config.resolve_paths(temp.path()),
        }
    }

    #[test]
    fn test_unknown_pipeline_deletes_nothing() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        fs::create_dir_all(&ctx.config.tiles.input_dir).unwrap();
        fs::create_dir_all(&ctx.config.paths.log_root).unwrap();

        for name in ["..", "", "other"] {
            let err = run(&ctx, name, &[], true).unwrap_err();
            assert!(matches!(err, BatchError::UnknownPipeline { .. }), "{name:?}");
        }
        assert!(ctx.config.tiles.input_dir.is_dir());
        assert!(ctx.config.paths.log_root.is_dir());
    }

    #[test]
    fn test_reset_configured_pipeline() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let store = ProgressStore::from_config(&ctx.config);
        let tile = TileId::parse("6239_447").unwrap();
        store
            .initialize("process_tiles", std::slice::from_ref(&tile))
            .unwrap();

        run(&ctx, "process_tiles", &[], true).unwrap();
        assert!(!store.pipeline_dir("process_tiles").exists());
        assert!(ctx.config.paths.log_root.is_dir());
    }
}
