//! Progress store operations over the log folder hierarchy
//!
//! Layout under `log_root`:
//!
//! ```text
//! <pipeline>/overall_progress.csv
//! <pipeline>/<tile_id>/status.csv
//! <pipeline>/<tile_id>/<step>/<artifacts>
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::constants::progress::{PROGRESS_FILE, STATUS_RECORD_FILE};
use crate::types::{BatchError, Result, ResultExt, TileId, is_path_component};

use super::record::StatusRecord;
use super::table::ProgressTable;
use super::write_atomic;

/// Outcome of an operator reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// Whole pipeline folder removed
    pub pipeline_removed: bool,
    /// Tile log folders removed
    pub tiles_removed: usize,
    /// Table rows set back to pending
    pub rows_reset: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressStore {
    log_root: PathBuf,
}

impl ProgressStore {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paths.log_root)
    }

    // =========================================================================
    // Paths
    // =========================================================================

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    pub fn pipeline_dir(&self, pipeline: &str) -> PathBuf {
        self.log_root.join(pipeline)
    }

    /// Pipeline folder, refusing names that would escape the log root
    pub fn checked_pipeline_dir(&self, pipeline: &str) -> Result<PathBuf> {
        if is_path_component(pipeline) {
            Ok(self.pipeline_dir(pipeline))
        } else {
            Err(BatchError::InvalidPipelineName(pipeline.to_string()))
        }
    }

    pub fn progress_path(&self, pipeline: &str) -> PathBuf {
        self.pipeline_dir(pipeline).join(PROGRESS_FILE)
    }

    pub fn tile_dir(&self, pipeline: &str, tile: &TileId) -> PathBuf {
        self.pipeline_dir(pipeline).join(tile.as_str())
    }

    pub fn record_path(&self, pipeline: &str, tile: &TileId) -> PathBuf {
        self.tile_dir(pipeline, tile).join(STATUS_RECORD_FILE)
    }

    // =========================================================================
    // Table Lifecycle
    // =========================================================================

    /// Create or load the pipeline's table, check it against the universe,
    /// fold in Status Records and persist the result
    #[instrument(skip(self, universe), fields(tiles = universe.len()))]
    pub fn initialize(&self, pipeline: &str, universe: &[TileId]) -> Result<ProgressTable> {
        fs::create_dir_all(self.checked_pipeline_dir(pipeline)?)?;
        let path = self.progress_path(pipeline);

        let table = if path.exists() {
            let table = Self::read_table(&path)?;

            let diff = table.tile_set_diff(universe);
            if !diff.is_empty() {
                return Err(BatchError::TileSetMismatch {
                    progress_file: path,
                    missing: diff.missing,
                    unexpected: diff.unexpected,
                });
            }

            debug!(rows = table.len(), "Loaded progress table");
            self.reconcile(pipeline, table)?
        } else {
            info!("Creating progress table: {}", path.display());
            ProgressTable::new(universe)
        };

        self.persist(pipeline, &table)?;
        Ok(table)
    }

    /// Fold every readable Status Record into the table
    ///
    /// Missing or unreadable records leave their row untouched so the tile
    /// is retried. Records for tiles outside the table are skipped.
    #[instrument(skip(self, table), fields(rows = table.len()))]
    pub fn reconcile(&self, pipeline: &str, mut table: ProgressTable) -> Result<ProgressTable> {
        let mut merged = 0usize;
        let mut unreadable = 0usize;

        for tile in self.tile_dirs(pipeline)? {
            let path = self.record_path(pipeline, &tile);
            if !path.exists() {
                debug!(tile = %tile, "No status record");
                continue;
            }

            match StatusRecord::read(&path) {
                Ok(record) if record.tile() != &tile => {
                    warn!(
                        tile = %tile,
                        record_tile = %record.tile(),
                        "Status record names a different tile, skipping"
                    );
                    unreadable += 1;
                }
                Ok(record) => {
                    if table.merge_record(&record) {
                        merged += 1;
                    } else {
                        warn!(tile = %tile, "Status record for tile outside the progress table, ignoring");
                    }
                }
                Err(e) => {
                    warn!(tile = %tile, category = %e.category(), "{}", e);
                    unreadable += 1;
                }
            }
        }

        info!(merged, unreadable, "Reconciled status records");
        Ok(table)
    }

    /// Atomically rewrite the progress file
    pub fn persist(&self, pipeline: &str, table: &ProgressTable) -> Result<()> {
        let path = self.progress_path(pipeline);
        write_atomic(&path, |file| table.write_csv(file))?;
        debug!(path = %path.display(), rows = table.len(), "Persisted progress table");
        Ok(())
    }

    /// Best-effort read of the persisted table; `None` if it does not exist
    pub fn load(&self, pipeline: &str) -> Result<Option<ProgressTable>> {
        let path = self.progress_path(pipeline);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_table(&path).map(Some)
    }

    fn read_table(path: &Path) -> Result<ProgressTable> {
        let file = File::open(path).progress_context(path)?;
        ProgressTable::from_csv(file).progress_context(path)
    }

    // =========================================================================
    // Status Records
    // =========================================================================

    /// Tile ids with a log folder under the pipeline, sorted
    pub fn tile_dirs(&self, pipeline: &str) -> Result<Vec<TileId>> {
        let dir = self.pipeline_dir(pipeline);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut tiles = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Ok(tile) = TileId::parse(name)
            {
                tiles.push(tile);
            }
        }
        tiles.sort();
        Ok(tiles)
    }

    /// All readable Status Records of a pipeline; unreadable ones are skipped
    pub fn scan_records(&self, pipeline: &str) -> Result<Vec<StatusRecord>> {
        let mut records = Vec::new();
        for tile in self.tile_dirs(pipeline)? {
            let path = self.record_path(pipeline, &tile);
            if !path.exists() {
                continue;
            }
            match StatusRecord::read(&path) {
                Ok(record) => records.push(record),
                Err(e) => debug!(tile = %tile, "{}", e),
            }
        }
        Ok(records)
    }

    pub fn write_record(&self, pipeline: &str, record: &StatusRecord) -> Result<()> {
        record.write(&self.record_path(pipeline, record.tile()))
    }

    pub fn read_record(&self, pipeline: &str, tile: &TileId) -> Result<StatusRecord> {
        StatusRecord::read(&self.record_path(pipeline, tile))
    }

    /// Remove a tile's Status Record; returns whether one existed
    pub fn delete_record(&self, pipeline: &str, tile: &TileId) -> Result<bool> {
        match fs::remove_file(self.record_path(pipeline, tile)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Operator reset
    ///
    /// With no tiles the whole pipeline log folder is deleted. Otherwise the
    /// given tiles' log folders are deleted and their rows set back to pending.
    #[instrument(skip(self, tiles), fields(tiles = tiles.len()))]
    pub fn reset(&self, pipeline: &str, tiles: &[TileId]) -> Result<ResetReport> {
        let dir = self.checked_pipeline_dir(pipeline)?;
        let mut report = ResetReport::default();

        if tiles.is_empty() {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
                report.pipeline_removed = true;
                info!("Removed pipeline log folder: {}", dir.display());
            }
            return Ok(report);
        }

        for tile in tiles {
            let dir = self.tile_dir(pipeline, tile);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
                report.tiles_removed += 1;
            }
        }

        if let Some(mut table) = self.load(pipeline)? {
            for tile in tiles {
                if table.reset_tile(tile) {
                    report.rows_reset += 1;
                } else {
                    warn!(tile = %tile, "Tile not in progress table");
                }
            }
            self.persist(pipeline, &table)?;
        }

        info!(
            tiles_removed = report.tiles_removed,
            rows_reset = report.rows_reset,
            "Reset tiles"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;
    use proptest::prelude::*;
    use tempfile::TempDir;

    const PIPELINE: &str = "process_tiles";

    fn tiles(ids: &[&str]) -> Vec<TileId> {
        ids.iter().map(|s| TileId::parse(s).unwrap()).collect()
    }

    fn steps(pairs: &[(&str, Status)]) -> Vec<(String, Status)> {
        pairs
            .iter()
            .map(|(n, s)| (n.to_string(), s.clone()))
            .collect()
    }

    #[test]
    fn test_initialize_creates_pending_table() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["1000_100", "1000_101"]);

        let table = store.initialize(PIPELINE, &universe).unwrap();
        assert_eq!(table.incomplete_tiles(), universe);
        assert_eq!(
            fs::read_to_string(store.progress_path(PIPELINE)).unwrap(),
            "tile_id,processing\n1000_100,pending\n1000_101,pending\n"
        );
    }

    #[test]
    fn test_scenario_a_resume_after_partial_run() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["1000_100", "1000_101", "1000_102"]);
        store.initialize(PIPELINE, &universe).unwrap();

        // First run finished two tiles, one with a failed step
        store
            .write_record(
                PIPELINE,
                &StatusRecord::from_steps(
                    universe[0].clone(),
                    steps(&[("slope", Status::Success), ("aspect", Status::Success)]),
                ),
            )
            .unwrap();
        store
            .write_record(
                PIPELINE,
                &StatusRecord::from_steps(
                    universe[1].clone(),
                    steps(&[
                        ("slope", Status::Success),
                        ("aspect", Status::failed("gdalError")),
                    ]),
                ),
            )
            .unwrap();

        let table = store.initialize(PIPELINE, &universe).unwrap();
        assert!(table.is_complete(&universe[0]));
        assert_eq!(table.overall(&universe[1]), Some(&Status::Incomplete));
        assert_eq!(table.incomplete_tiles(), vec![universe[1].clone(), universe[2].clone()]);
        assert_eq!(table.columns(), ["processing", "slope", "aspect"]);

        let persisted = store.load(PIPELINE).unwrap().unwrap();
        assert_eq!(persisted, table);
    }

    #[test]
    fn test_tile_set_mismatch_is_fatal() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        store
            .initialize(PIPELINE, &tiles(&["1000_100", "1000_101"]))
            .unwrap();

        let err = store
            .initialize(PIPELINE, &tiles(&["1000_100", "1000_102"]))
            .unwrap_err();
        match &err {
            BatchError::TileSetMismatch {
                missing,
                unexpected,
                ..
            } => {
                assert_eq!(missing, &tiles(&["1000_102"]));
                assert_eq!(unexpected, &tiles(&["1000_101"]));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_fatal());
    }

    #[test]
    fn test_corrupt_progress_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        fs::create_dir_all(store.pipeline_dir(PIPELINE)).unwrap();
        fs::write(store.progress_path(PIPELINE), "garbage\n1_1\n").unwrap();

        let err = store
            .initialize(PIPELINE, &tiles(&["1000_100"]))
            .unwrap_err();
        assert!(matches!(err, BatchError::ProgressLoad { .. }));
    }

    #[test]
    fn test_reconcile_leaves_unreadable_record_untouched() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["1000_100", "1000_101"]);
        let table = store.initialize(PIPELINE, &universe).unwrap();

        // Crashed mid-tile: folder exists, record missing
        fs::create_dir_all(store.tile_dir(PIPELINE, &universe[0]).join("slope")).unwrap();
        // Torn record
        fs::create_dir_all(store.tile_dir(PIPELINE, &universe[1])).unwrap();
        fs::write(store.record_path(PIPELINE, &universe[1]), "tile_id,processing\n").unwrap();
        // Unrelated folders
        fs::create_dir_all(store.pipeline_dir(PIPELINE).join("notes")).unwrap();
        fs::create_dir_all(store.pipeline_dir(PIPELINE).join("9999_999")).unwrap();

        let reconciled = store.reconcile(PIPELINE, table.clone()).unwrap();
        assert_eq!(reconciled, table);
    }

    #[test]
    fn test_reconcile_ignores_foreign_tile() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let table = store.initialize(PIPELINE, &tiles(&["1000_100"])).unwrap();

        store
            .write_record(
                PIPELINE,
                &StatusRecord::from_steps(
                    TileId::parse("9999_999").unwrap(),
                    steps(&[("slope", Status::Success)]),
                ),
            )
            .unwrap();

        let reconciled = store.reconcile(PIPELINE, table).unwrap();
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled.columns(), ["processing"]);
    }

    #[test]
    fn test_new_column_growth() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["1000_100", "1000_101"]);
        let table = store.initialize(PIPELINE, &universe).unwrap();

        store
            .write_record(
                PIPELINE,
                &StatusRecord::from_steps(
                    universe[1].clone(),
                    steps(&[("slope", Status::Success), ("hillshade", Status::Success)]),
                ),
            )
            .unwrap();

        let table = store.reconcile(PIPELINE, table).unwrap();
        assert_eq!(table.columns(), ["processing", "slope", "hillshade"]);
        assert_eq!(table.get(&universe[0], "hillshade"), Some(&Status::Pending));
        assert!(table.is_complete(&universe[1]));
    }

    #[test]
    fn test_reset_tiles() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let universe = tiles(&["1000_100", "1000_101"]);
        store.initialize(PIPELINE, &universe).unwrap();
        for tile in &universe {
            store
                .write_record(
                    PIPELINE,
                    &StatusRecord::from_steps(tile.clone(), steps(&[("slope", Status::Success)])),
                )
                .unwrap();
        }
        store.initialize(PIPELINE, &universe).unwrap();

        let report = store.reset(PIPELINE, &universe[..1]).unwrap();
        assert_eq!(report.tiles_removed, 1);
        assert_eq!(report.rows_reset, 1);
        assert!(!store.tile_dir(PIPELINE, &universe[0]).exists());

        let table = store.initialize(PIPELINE, &universe).unwrap();
        assert_eq!(table.incomplete_tiles(), vec![universe[0].clone()]);
        assert_eq!(table.get(&universe[0], "slope"), Some(&Status::Pending));
    }

    #[test]
    fn test_reset_whole_pipeline() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        store.initialize(PIPELINE, &tiles(&["1000_100"])).unwrap();

        let report = store.reset(PIPELINE, &[]).unwrap();
        assert!(report.pipeline_removed);
        assert!(!store.pipeline_dir(PIPELINE).exists());
        assert!(store.load(PIPELINE).unwrap().is_none());

        // Universe may change after a full reset
        let table = store
            .initialize(PIPELINE, &tiles(&["2000_200"]))
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reset_refuses_escaping_pipeline_name() {
        let temp = TempDir::new().unwrap();
        let log_root = temp.path().join("log");
        let input = temp.path().join("data").join("laz");
        fs::create_dir_all(&input).unwrap();
        let store = ProgressStore::new(&log_root);
        store.initialize(PIPELINE, &tiles(&["1000_100"])).unwrap();

        for name in ["..", "", ".", "../data", "a/b"] {
            let err = store.reset(name, &[]).unwrap_err();
            assert!(matches!(err, BatchError::InvalidPipelineName(_)), "{name:?}");
            assert!(store.initialize(name, &tiles(&["1000_100"])).is_err());
        }
        assert!(input.is_dir());
        assert!(store.progress_path(PIPELINE).exists());
    }

    #[test]
    fn test_delete_record() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path());
        let tile = TileId::parse("1000_100").unwrap();
        assert!(!store.delete_record(PIPELINE, &tile).unwrap());

        store
            .write_record(PIPELINE, &StatusRecord::from_steps(tile.clone(), vec![]))
            .unwrap();
        assert!(store.delete_record(PIPELINE, &tile).unwrap());
        assert!(store.read_record(PIPELINE, &tile).is_err());
    }

    fn status_strategy() -> impl Strategy<Value = Status> {
        prop_oneof![
            Just(Status::Success),
            Just(Status::Pending),
            Just(Status::failed("gdalError")),
            Just(Status::failed("opalsError")),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Reconciliation never drops rows or columns, only touches tiles
        /// that have a record, and keeps recorded results once their record
        /// is gone.
        #[test]
        fn prop_reconcile_is_monotonic(
            records in proptest::collection::vec(
                (0usize..6, proptest::collection::vec(
                    (prop_oneof![Just("slope"), Just("aspect"), Just("hillshade")], status_strategy()),
                    0..3,
                )),
                0..8,
            ),
            removed in proptest::collection::vec(any::<bool>(), 5),
        ) {
            let temp = TempDir::new().unwrap();
            let store = ProgressStore::new(temp.path());
            let universe = tiles(&["1000_100", "1000_101", "1000_102", "1000_103", "1000_104"]);
            let before = store.initialize(PIPELINE, &universe).unwrap();

            let mut written = std::collections::HashSet::new();
            for (index, pairs) in &records {
                // Index 5 is outside the universe
                let tile = if *index < universe.len() {
                    universe[*index].clone()
                } else {
                    TileId::parse("9999_999").unwrap()
                };
                let steps = pairs.iter().map(|(n, s)| (n.to_string(), s.clone())).collect();
                store.write_record(PIPELINE, &StatusRecord::from_steps(tile.clone(), steps)).unwrap();
                written.insert(tile);
            }

            let after = store.reconcile(PIPELINE, before.clone()).unwrap();
            let first_pass = after.clone();

            prop_assert_eq!(after.tiles(), before.tiles());
            prop_assert!(after.columns().starts_with(before.columns()));
            for tile in universe.iter().filter(|t| !written.contains(*t)) {
                for column in after.columns() {
                    prop_assert_eq!(after.get(tile, column), Some(&Status::Pending));
                }
            }
            for tile in universe.iter().filter(|t| written.contains(*t)) {
                let record = store.read_record(PIPELINE, tile).unwrap();
                prop_assert_eq!(after.overall(tile), Some(record.overall()));
            }

            // A worker starting a tile deletes its record, and a crash can
            // leave only an empty folder behind. Nothing recorded may be lost.
            for (tile, remove) in universe.iter().zip(&removed) {
                if *remove {
                    store.delete_record(PIPELINE, tile).unwrap();
                    fs::create_dir_all(store.tile_dir(PIPELINE, tile)).unwrap();
                }
            }
            let again = store.reconcile(PIPELINE, after).unwrap();

            for tile in &universe {
                for column in first_pass.columns() {
                    let cell = first_pass.get(tile, column);
                    if matches!(cell, Some(Status::Success | Status::Complete)) {
                        prop_assert_eq!(again.get(tile, column), cell);
                    }
                }
            }
            prop_assert_eq!(&again, &first_pass);
        }
    }
}
