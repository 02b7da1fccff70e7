//! Batch driver
//!
//! One `run` of a pipeline: setup checks, tile discovery, progress table
//! initialization, the worker pool, and the final reconciliation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::discovery::TileDiscovery;
use crate::executor::Pipeline;
use crate::logs::LogAggregator;
use crate::progress::{ProgressStore, ProgressTable};
use crate::types::{BatchError, Result};

use super::pool::{PoolOptions, RunSummary, WorkerPool};
use super::slot::ScratchArena;
use super::Shutdown;

/// Command-line overrides for one run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub workers: Option<usize>,
    pub stagger_secs: Option<u64>,
}

/// Outcome of a whole run, after reconciliation
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline: String,
    /// Tiles in the universe
    pub total: usize,
    /// Tiles already complete before the run
    pub skipped: usize,
    pub summary: RunSummary,
    /// Reconciled and persisted table
    pub table: ProgressTable,
}

impl RunReport {
    pub fn complete(&self) -> usize {
        self.table.complete_count()
    }

    pub fn remaining(&self) -> usize {
        self.total - self.complete()
    }
}

pub struct BatchRunner<'a> {
    config: &'a Config,
    store: ProgressStore,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            store: ProgressStore::from_config(config),
        }
    }

    /// Fail unless every required directory exists, then create the working
    /// directories
    pub fn prepare_directories(&self) -> Result<()> {
        let paths = &self.config.paths;

        require_dir("input", &self.config.tiles.input_dir)?;
        for dir in &paths.required {
            require_dir("required", dir)?;
        }

        for dir in [&paths.log_root, &paths.scratch_root, &paths.output_dir]
            .into_iter()
            .chain(&paths.create)
        {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Run `pipeline` over every incomplete tile
    ///
    /// Setup errors and a tile-set mismatch abort before any dispatch.
    /// Tile failures never surface as errors.
    #[instrument(skip(self, pipeline, options, shutdown), fields(pipeline = pipeline.name()))]
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        options: RunOptions,
        shutdown: Shutdown,
    ) -> Result<RunReport> {
        self.prepare_directories()?;

        let universe = TileDiscovery::from_config(self.config)?.discover()?;
        let table = self.store.initialize(pipeline.name(), &universe)?;

        let tiles = table.incomplete_tiles();
        let skipped = universe.len() - tiles.len();
        info!(
            total = universe.len(),
            skipped,
            to_process = tiles.len(),
            "Starting pipeline"
        );

        let pool = WorkerPool::new(
            self.pool_options(options),
            ScratchArena::new(&self.config.paths.scratch_root),
            self.store.clone(),
            LogAggregator::from_config(self.config),
        );
        let summary = pool.run(pipeline, tiles, shutdown).await?;
        if summary.not_started > 0 {
            warn!(
                not_started = summary.not_started,
                "Run stopped early; remaining tiles stay pending"
            );
        }

        let table = self.store.reconcile(pipeline.name(), table)?;
        self.store.persist(pipeline.name(), &table)?;

        Ok(RunReport {
            pipeline: pipeline.name().to_string(),
            total: universe.len(),
            skipped,
            summary,
            table,
        })
    }

    fn pool_options(&self, options: RunOptions) -> PoolOptions {
        let defaults = PoolOptions::from_config(self.config);
        PoolOptions {
            pool_size: options.workers.unwrap_or(defaults.pool_size).max(1),
            stagger: options
                .stagger_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.stagger),
        }
    }
}

fn require_dir(role: &str, dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(BatchError::missing_directory(role, dir))
    }
}
