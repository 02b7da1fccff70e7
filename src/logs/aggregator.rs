//! Log artifact gathering
//!
//! Steps leave their logs in the slot's scratch directory. After each step the
//! worker moves them into `<log_root>/<pipeline>/<tile>/<step>/` so the scratch
//! directory is empty for the next step.

use chrono::{DateTime, Local};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::scratch::{DIR_PREFIX, STALE_DIR};
use crate::scheduler::ScratchArena;
use crate::types::{BatchError, Result, SlotId, TileId};

/// Artifacts moved by one `gather` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherReport {
    pub destination: PathBuf,
    pub moved: Vec<String>,
}

/// Result of a legacy multi-slot collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub collected: usize,
    pub missing: usize,
}

#[derive(Debug, Clone)]
pub struct LogAggregator {
    log_root: PathBuf,
    artifacts: Vec<String>,
}

impl LogAggregator {
    pub fn new(log_root: impl Into<PathBuf>, artifacts: Vec<String>) -> Self {
        Self {
            log_root: log_root.into(),
            artifacts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paths.log_root, config.logs.artifacts.clone())
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Whether the final path component looks like `temp_<digits>`
    pub fn is_scratch_dir(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(DIR_PREFIX))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Move the configured artifacts out of a scratch directory
    ///
    /// Refuses (and moves nothing) when `scratch_dir` is not a scratch
    /// directory. Missing artifacts are skipped.
    pub fn gather(
        &self,
        scratch_dir: &Path,
        pipeline: &str,
        step: &str,
        tile: &TileId,
    ) -> Result<GatherReport> {
        if !Self::is_scratch_dir(scratch_dir) {
            return Err(BatchError::OutsideScratch {
                path: scratch_dir.to_path_buf(),
            });
        }

        let destination = self
            .log_root
            .join(pipeline)
            .join(tile.as_str())
            .join(step);
        fs::create_dir_all(&destination)?;

        let mut moved = Vec::new();
        for name in &self.artifacts {
            let source = scratch_dir.join(name);
            if !source.is_file() {
                continue;
            }
            fs::copy(&source, destination.join(name))?;
            fs::remove_file(&source)?;
            moved.push(name.clone());
        }

        debug!(tile = %tile, step, moved = moved.len(), "Gathered step logs");
        Ok(GatherReport { destination, moved })
    }

    /// Set aside artifacts left in a scratch directory by an interrupted tile
    ///
    /// They are moved into `<scratch>/stale/` (replacing older leftovers) so
    /// the next tile's first step does not gather them as its own.
    pub fn set_aside_leftovers(&self, scratch_dir: &Path) -> Result<Vec<String>> {
        if !Self::is_scratch_dir(scratch_dir) {
            return Err(BatchError::OutsideScratch {
                path: scratch_dir.to_path_buf(),
            });
        }

        let mut moved = Vec::new();
        for name in &self.artifacts {
            let source = scratch_dir.join(name);
            if !source.is_file() {
                continue;
            }
            let stale = scratch_dir.join(STALE_DIR);
            fs::create_dir_all(&stale)?;
            fs::rename(&source, stale.join(name))?;
            moved.push(name.clone());
        }

        if !moved.is_empty() {
            warn!(
                scratch = %scratch_dir.display(),
                files = %moved.join(", "),
                "Set aside leftovers from an interrupted tile"
            );
        }
        Ok(moved)
    }

    /// Legacy coordinator collection: append every slot's artifacts to `sink`
    ///
    /// Each present artifact is appended under a header and removed from the
    /// scratch directory. Missing ones leave a `does not exist` marker.
    pub fn collect_slots<W: Write>(
        &self,
        arena: &ScratchArena,
        slots: usize,
        sink: &mut W,
    ) -> Result<CollectReport> {
        let mut report = CollectReport::default();

        for number in 1..=slots {
            let dir = arena.slot_dir(SlotId::new(number));
            for name in &self.artifacts {
                let path = dir.join(name);
                if !path.is_file() {
                    writeln!(sink, "{} does not exist", path.display())?;
                    report.missing += 1;
                    continue;
                }

                let content = fs::read(&path)?;
                writeln!(sink, "===== {} =====", path.display())?;
                sink.write_all(&content)?;
                if !content.ends_with(b"\n") {
                    writeln!(sink)?;
                }
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
                report.collected += 1;
            }
        }

        sink.flush()?;
        Ok(report)
    }

    /// Session log file for `collect-logs`: `<log_root>/<pipeline>_<YYYYMMDD-HH-MM-SS>.log`
    pub fn session_log_path(&self, pipeline: &str, started: DateTime<Local>) -> PathBuf {
        self.log_root.join(format!(
            "{}_{}.log",
            pipeline,
            started.format("%Y%m%d-%H-%M-%S")
        ))
    }
}
