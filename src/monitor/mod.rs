//! Progress Monitor
//!
//! Read-only observer of a running (or finished) pipeline. It never writes
//! any file, so it can run in a separate process next to `tilebatch run`.
//!
//! Each tick combines two sources:
//! - the persisted Progress Table, which is only rewritten at the start and
//!   end of a run
//! - the tile Status Records written by workers since then

mod eta;
mod render;

pub use eta::EtaEstimator;
pub use render::{Snapshot, format_duration, render_frame, render_progress_bar};

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Local;
use console::Term;
use tracing::{debug, warn};

use crate::config::Config;
use crate::discovery::TileDiscovery;
use crate::progress::{ProgressStore, ProgressTable};
use crate::types::{Result, TileId};

pub struct ProgressMonitor {
    store: ProgressStore,
    pipeline: String,
    /// Discovered tiles, used as the total until a table can be read
    universe: Vec<TileId>,
    last_table: Option<ProgressTable>,
    eta: EtaEstimator,
}

impl ProgressMonitor {
    pub fn new(
        store: ProgressStore,
        pipeline: impl Into<String>,
        universe: Vec<TileId>,
        warmup: usize,
    ) -> Self {
        Self {
            store,
            pipeline: pipeline.into(),
            universe,
            last_table: None,
            eta: EtaEstimator::new(warmup),
        }
    }

    /// Build from config; an unreadable input directory leaves the fallback
    /// universe empty
    pub fn from_config(config: &Config, pipeline: &str) -> Self {
        let universe = match TileDiscovery::from_config(config).and_then(|d| d.discover()) {
            Ok(tiles) => tiles,
            Err(e) => {
                debug!("Tile discovery unavailable: {}", e);
                Vec::new()
            }
        };
        Self::new(
            ProgressStore::from_config(config),
            pipeline,
            universe,
            config.monitor.warmup_tiles,
        )
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Take one observation
    pub fn poll(&mut self, now: Instant) -> Snapshot {
        match self.store.load(&self.pipeline) {
            Ok(Some(table)) => self.last_table = Some(table),
            Ok(None) => {}
            // Torn or half-written file; keep the previous table
            Err(e) => debug!("Keeping last progress snapshot: {}", e),
        }

        let tiles: HashSet<&TileId> = match &self.last_table {
            Some(table) => table.tiles().iter().collect(),
            None => self.universe.iter().collect(),
        };

        let mut processed: HashSet<&TileId> = HashSet::new();
        if let Some(table) = &self.last_table {
            processed.extend(table.complete_tiles());
        }

        let records = match self.store.scan_records(&self.pipeline) {
            Ok(records) => records,
            Err(e) => {
                debug!("Status record scan failed: {}", e);
                Vec::new()
            }
        };
        for record in &records {
            if record.is_complete()
                && let Some(tile) = tiles.get(record.tile())
            {
                processed.insert(*tile);
            }
        }

        let total = tiles.len();
        let processed = processed.len();
        Snapshot {
            processed,
            total,
            eta: self.eta.observe(processed, total, now),
            updated: Local::now(),
        }
    }

    /// Redraw a frame every `interval` until progress reaches 100% or Ctrl+C
    ///
    /// With `once` a single frame is drawn.
    pub async fn run(&mut self, interval: Duration, once: bool) -> Result<Snapshot> {
        let term = Term::stdout();

        loop {
            let snapshot = self.poll(Instant::now());
            if !once {
                term.clear_screen()?;
            }
            term.write_line(&render_frame(&self.pipeline, interval, &snapshot))?;

            if once || snapshot.is_finished() {
                return Ok(snapshot);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                    }
                    return Ok(snapshot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::StatusRecord;
    use crate::types::Status;
    use std::fs;
    use tempfile::TempDir;

    const PIPELINE: &str = "process_tiles";

    fn tiles(ids: &[&str]) -> Vec<TileId> {
        ids.iter().map(|id| TileId::parse(id).unwrap()).collect()
    }

    fn record(tile: &TileId, status: Status) -> StatusRecord {
        StatusRecord::from_steps(tile.clone(), vec![("slope".to_string(), status)])
    }

    #[test]
    fn test_counts_table_and_records() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["6239_447", "6239_448", "6240_447", "6240_448"]);

        let mut table = store.initialize(PIPELINE, &universe).unwrap();
        table.merge_record(&record(&universe[0], Status::Success));
        store.persist(PIPELINE, &table).unwrap();

        // Written by workers after the table was persisted
        store.write_record(PIPELINE, &record(&universe[1], Status::Success)).unwrap();
        store
            .write_record(PIPELINE, &record(&universe[2], Status::failed("gdalError")))
            .unwrap();
        // Foreign tile is not counted
        store
            .write_record(PIPELINE, &record(&TileId::parse("1_1").unwrap(), Status::Success))
            .unwrap();

        let mut monitor = ProgressMonitor::new(store, PIPELINE, Vec::new(), 0);
        let snapshot = monitor.poll(Instant::now());
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.percent(), 50);
    }

    #[test]
    fn test_total_falls_back_to_universe() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["6239_447", "6239_448", "6240_447"]);

        let mut monitor = ProgressMonitor::new(store, PIPELINE, universe, 0);
        let snapshot = monitor.poll(Instant::now());
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.eta, None);
    }

    #[test]
    fn test_torn_progress_file_keeps_last_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["6239_447", "6239_448"]);

        let mut table = store.initialize(PIPELINE, &universe).unwrap();
        table.merge_record(&record(&universe[0], Status::Success));
        store.persist(PIPELINE, &table).unwrap();

        let mut monitor = ProgressMonitor::new(store.clone(), PIPELINE, Vec::new(), 0);
        let first = monitor.poll(Instant::now());
        assert_eq!((first.processed, first.total), (1, 2));

        fs::write(store.progress_path(PIPELINE), "processing\n").unwrap();
        let second = monitor.poll(Instant::now());
        assert_eq!((second.processed, second.total), (1, 2));
    }

    #[test]
    fn test_eta_after_warmup() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["6239_447", "6239_448", "6240_447", "6240_448"]);
        store.initialize(PIPELINE, &universe).unwrap();

        let mut monitor = ProgressMonitor::new(store.clone(), PIPELINE, Vec::new(), 1);
        let t0 = Instant::now();
        assert_eq!(monitor.poll(t0).eta, None);

        store.write_record(PIPELINE, &record(&universe[0], Status::Success)).unwrap();
        assert_eq!(monitor.poll(t0 + Duration::from_secs(5)).eta, None);

        store.write_record(PIPELINE, &record(&universe[1], Status::Success)).unwrap();
        let snapshot = monitor.poll(t0 + Duration::from_secs(65));
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.eta, Some(Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn test_run_once() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["6239_447"]);
        store.initialize(PIPELINE, &universe).unwrap();

        let mut monitor = ProgressMonitor::new(store, PIPELINE, Vec::new(), 0);
        let snapshot = monitor.run(Duration::from_secs(60), true).await.unwrap();
        assert_eq!(snapshot.total, 1);
        assert!(!snapshot.is_finished());
    }
}
