//! Progress Table
//!
//! In-memory model of `overall_progress.csv`: one row per tile, one column per
//! step, plus the overall `processing` column. Column order is the order of
//! first observation and row order is the order of the tile universe, so a
//! persisted table is byte-stable across runs with the same content.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};

use crate::constants::progress::{INDEX_COLUMN, OVERALL_COLUMN};
use crate::types::{BatchError, Result, Status, TileId};

use super::record::StatusRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTable {
    columns: Vec<String>,
    order: Vec<TileId>,
    rows: HashMap<TileId, HashMap<String, Status>>,
}

/// Tiles present on only one side of a table/universe comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSetDiff {
    /// In the universe but not in the table
    pub missing: Vec<TileId>,
    /// In the table but not in the universe
    pub unexpected: Vec<TileId>,
}

impl TileSetDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl ProgressTable {
    /// Fresh table with every tile pending in the single `processing` column
    pub fn new(universe: &[TileId]) -> Self {
        let mut table = Self {
            columns: vec![OVERALL_COLUMN.to_string()],
            order: Vec::with_capacity(universe.len()),
            rows: HashMap::with_capacity(universe.len()),
        };
        for tile in universe {
            table.push_row(tile.clone());
        }
        table
    }

    fn push_row(&mut self, tile: TileId) -> bool {
        if self.rows.contains_key(&tile) {
            return false;
        }
        let row = self
            .columns
            .iter()
            .map(|c| (c.clone(), Status::Pending))
            .collect();
        self.rows.insert(tile.clone(), row);
        self.order.push(tile);
        true
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Step columns, `processing` first
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Tiles in universe order
    pub fn tiles(&self) -> &[TileId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, tile: &TileId) -> bool {
        self.rows.contains_key(tile)
    }

    /// Status of one cell (`None` for an unknown tile or column)
    pub fn get(&self, tile: &TileId, column: &str) -> Option<&Status> {
        self.rows.get(tile)?.get(column)
    }

    /// Overall status of a tile
    pub fn overall(&self, tile: &TileId) -> Option<&Status> {
        self.get(tile, OVERALL_COLUMN)
    }

    /// A tile is done exactly when its `processing` cell is `complete`
    pub fn is_complete(&self, tile: &TileId) -> bool {
        matches!(self.overall(tile), Some(Status::Complete))
    }

    pub fn complete_tiles(&self) -> impl Iterator<Item = &TileId> {
        self.order.iter().filter(|t| self.is_complete(t))
    }

    pub fn complete_count(&self) -> usize {
        self.complete_tiles().count()
    }

    /// Tiles still to process, in universe order
    pub fn incomplete_tiles(&self) -> Vec<TileId> {
        self.order
            .iter()
            .filter(|t| !self.is_complete(t))
            .cloned()
            .collect()
    }

    /// Count of each status token in a column
    pub fn column_counts(&self, column: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for tile in &self.order {
            if let Some(status) = self.get(tile, column) {
                *counts.entry(status.as_str().to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Compare the table's tile set with a universe, as sets
    pub fn tile_set_diff(&self, universe: &[TileId]) -> TileSetDiff {
        let universe_set: HashSet<&TileId> = universe.iter().collect();
        TileSetDiff {
            missing: universe
                .iter()
                .filter(|t| !self.rows.contains_key(*t))
                .cloned()
                .collect(),
            unexpected: self
                .order
                .iter()
                .filter(|t| !universe_set.contains(t))
                .cloned()
                .collect(),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add a column initialized to `pending` for every tile
    ///
    /// Returns false if the column already exists.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.columns.iter().any(|c| c == name) {
            return false;
        }
        self.columns.push(name.to_string());
        for row in self.rows.values_mut() {
            row.insert(name.to_string(), Status::Pending);
        }
        true
    }

    /// Set one cell, growing the columns if needed
    ///
    /// Returns false (and changes nothing) for a tile outside the table.
    pub fn set(&mut self, tile: &TileId, column: &str, status: Status) -> bool {
        if !self.rows.contains_key(tile) {
            return false;
        }
        self.ensure_column(column);
        if let Some(row) = self.rows.get_mut(tile) {
            row.insert(column.to_string(), status);
        }
        true
    }

    /// Copy every (step, status) pair of a record into its tile's row
    ///
    /// Records for tiles outside the table are not merged; the table never
    /// gains rows this way.
    pub fn merge_record(&mut self, record: &StatusRecord) -> bool {
        if !self.contains(record.tile()) {
            return false;
        }
        for (column, status) in record.entries() {
            self.set(record.tile(), column, status.clone());
        }
        true
    }

    /// Set every column of a tile back to `pending`
    pub fn reset_tile(&mut self, tile: &TileId) -> bool {
        match self.rows.get_mut(tile) {
            Some(row) => {
                for status in row.values_mut() {
                    *status = Status::Pending;
                }
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // CSV Codec
    // =========================================================================

    /// Parse a table from CSV (`tile_id` index column, one column per step)
    ///
    /// A table without a `processing` column gets one, pending for every tile.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let mut header_iter = headers.iter();
        match header_iter.next() {
            Some(INDEX_COLUMN) => {}
            other => {
                return Err(BatchError::Config(format!(
                    "expected '{}' as first column, found {:?}",
                    INDEX_COLUMN, other
                )));
            }
        }
        let file_columns: Vec<String> = header_iter.map(str::to_string).collect();

        let mut columns = vec![OVERALL_COLUMN.to_string()];
        for column in &file_columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        let mut table = Self {
            columns,
            order: Vec::new(),
            rows: HashMap::new(),
        };

        for row in reader.records() {
            let row = row?;
            let mut cells = row.iter();
            let tile = TileId::parse(cells.next().unwrap_or_default().trim())?;
            if !table.push_row(tile.clone()) {
                return Err(BatchError::Config(format!("duplicate row for tile {}", tile)));
            }
            for (column, value) in file_columns.iter().zip(cells) {
                table.set(&tile, column, Status::from_token(value.trim()));
            }
        }

        Ok(table)
    }

    /// Write the whole table as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(INDEX_COLUMN);
        header.extend(self.columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        for tile in &self.order {
            let mut record = Vec::with_capacity(header.len());
            record.push(tile.as_str());
            for column in &self.columns {
                record.push(self.get(tile, column).map_or("", Status::as_str));
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}
