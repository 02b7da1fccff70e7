//! Bounded worker pool
//!
//! `pool_size` slots share one tile queue. Each slot owns its scratch
//! directory for the whole run and processes tiles one at a time; within a
//! tile the steps run strictly in order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::executor::{Pipeline, StepContext};
use crate::logs::LogAggregator;
use crate::progress::{ProgressStore, StatusRecord};
use crate::types::{BatchError, Result, SlotId, TileId};

use super::Shutdown;
use super::slot::{ScratchArena, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub pool_size: usize,
    /// Start delay per slot index
    pub stagger: Duration,
}

impl PoolOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_size: config.scheduler.pool_size,
            stagger: Duration::from_secs(config.scheduler.stagger_secs),
        }
    }
}

/// Outcome of one pool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tiles a slot started working on
    pub dispatched: usize,
    /// Dispatched tiles whose steps all succeeded
    pub complete: usize,
    /// Dispatched tiles with at least one failed step
    pub incomplete: usize,
    /// Tiles left in the queue because of a stop request
    pub not_started: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct SlotReport {
    dispatched: usize,
    complete: usize,
}

struct Shared {
    pipeline: Pipeline,
    store: ProgressStore,
    logs: LogAggregator,
    queue: Mutex<VecDeque<TileId>>,
}

pub struct WorkerPool {
    options: PoolOptions,
    arena: ScratchArena,
    store: ProgressStore,
    logs: LogAggregator,
}

impl WorkerPool {
    pub fn new(
        options: PoolOptions,
        arena: ScratchArena,
        store: ProgressStore,
        logs: LogAggregator,
    ) -> Self {
        Self {
            options,
            arena,
            store,
            logs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            PoolOptions::from_config(config),
            ScratchArena::new(&config.paths.scratch_root),
            ProgressStore::from_config(config),
            LogAggregator::from_config(config),
        )
    }

    /// Run `pipeline` over `tiles` and wait for every slot to finish
    ///
    /// Partial results are visible as Status Records before this returns.
    #[instrument(skip(self, pipeline, tiles, shutdown), fields(pipeline = pipeline.name(), tiles = tiles.len()))]
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        tiles: Vec<TileId>,
        shutdown: Shutdown,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let total = tiles.len();
        let slots = self.options.pool_size.max(1).min(total);

        if slots == 0 {
            info!("No tiles to process");
            return Ok(RunSummary::default());
        }

        self.arena.prepare(slots)?;

        let shared = Arc::new(Shared {
            pipeline: pipeline.clone(),
            store: self.store.clone(),
            logs: self.logs.clone(),
            queue: Mutex::new(tiles.into()),
        });

        info!(
            slots,
            stagger_secs = self.options.stagger.as_secs(),
            steps = pipeline.len(),
            "Worker pool started"
        );

        let mut join_set: JoinSet<SlotReport> = JoinSet::new();
        for index in 0..slots {
            let slot = Slot::new(SlotId::from_index(index), &self.arena, self.options.stagger);
            join_set.spawn(run_slot(Arc::clone(&shared), slot, shutdown.clone()));
        }

        let mut summary = RunSummary::default();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(report) => {
                    summary.dispatched += report.dispatched;
                    summary.complete += report.complete;
                }
                Err(e) => error!("Worker slot panicked: {}", e),
            }
        }

        summary.incomplete = summary.dispatched - summary.complete;
        summary.not_started = shared.queue.lock().await.len();
        summary.elapsed = started.elapsed();

        info!(
            dispatched = summary.dispatched,
            complete = summary.complete,
            incomplete = summary.incomplete,
            not_started = summary.not_started,
            elapsed_secs = summary.elapsed.as_secs(),
            "Worker pool drained"
        );
        Ok(summary)
    }
}

async fn run_slot(shared: Arc<Shared>, mut slot: Slot, mut shutdown: Shutdown) -> SlotReport {
    let mut report = SlotReport::default();

    loop {
        if shutdown.is_triggered() {
            debug!(slot = %slot.id(), "Stop requested, not taking more tiles");
            break;
        }

        let Some(tile) = shared.queue.lock().await.pop_front() else {
            break;
        };

        if !slot.wait_for_start(&mut shutdown).await {
            shared.queue.lock().await.push_front(tile);
            break;
        }

        report.dispatched += 1;
        let record = process_tile(&shared, &slot, &tile).await;
        if record.is_complete() {
            report.complete += 1;
        }
    }

    debug!(slot = %slot.id(), tiles = report.dispatched, "Slot finished");
    report
}

/// Run every step for one tile and write its Status Record
async fn process_tile(shared: &Arc<Shared>, slot: &Slot, tile: &TileId) -> StatusRecord {
    let pipeline_name = shared.pipeline.name().to_string();
    let started = Instant::now();

    // A crash before the record is rewritten must leave the tile pending
    {
        let store = shared.store.clone();
        let (name, t) = (pipeline_name.clone(), tile.clone());
        if let Err(e) = blocking(move || store.delete_record(&name, &t)).await {
            warn!(tile = %tile, "Failed to remove stale status record: {}", e);
        }
    }

    {
        let logs = shared.logs.clone();
        let scratch = slot.scratch_dir().to_path_buf();
        if let Err(e) = blocking(move || logs.set_aside_leftovers(&scratch)).await {
            warn!(tile = %tile, slot = %slot.id(), "Failed to clear scratch directory: {}", e);
        }
    }

    let ctx = StepContext::new(slot.id(), slot.scratch_dir());
    let mut statuses = Vec::with_capacity(shared.pipeline.len());

    for step in shared.pipeline.steps() {
        let status = step.execute(tile, &ctx).await;

        let logs = shared.logs.clone();
        let scratch = ctx.scratch_dir.clone();
        let (name, step_name, t) = (pipeline_name.clone(), step.name().to_string(), tile.clone());
        match blocking(move || logs.gather(&scratch, &name, &step_name, &t)).await {
            Ok(report) => debug!(tile = %tile, step = step.name(), moved = report.moved.len(), "Gathered"),
            Err(e) => warn!(tile = %tile, step = step.name(), category = %e.category(), "{}", e),
        }

        statuses.push((step.name().to_string(), status));
    }

    let record = StatusRecord::from_steps(tile.clone(), statuses);
    {
        let store = shared.store.clone();
        let (name, r) = (pipeline_name.clone(), record.clone());
        if let Err(e) = blocking(move || store.write_record(&name, &r)).await {
            error!(tile = %tile, "Failed to write status record: {}", e);
        }
    }

    info!(
        tile = %tile,
        slot = %slot.id(),
        status = %record.overall(),
        elapsed_secs = started.elapsed().as_secs(),
        "Tile finished"
    );
    record
}

/// Run blocking file work off the async workers
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BatchError::Worker(e.to_string()))?
}
