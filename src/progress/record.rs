//! Status Records
//!
//! Per-tile outcome file written by a worker after it finishes a tile.
//! Same CSV shape as the progress table with exactly one row.

use std::fs::File;
use std::path::Path;

use crate::constants::progress::{INDEX_COLUMN, OVERALL_COLUMN};
use crate::types::{BatchError, Result, ResultExt, Status, TileId};

use super::write_atomic;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    tile: TileId,
    /// `(column, status)` pairs, `processing` first
    entries: Vec<(String, Status)>,
}

impl StatusRecord {
    /// Build a record from step outcomes, deriving the overall status
    pub fn from_steps(tile: TileId, steps: Vec<(String, Status)>) -> Self {
        let overall = Status::overall(steps.iter().map(|(_, s)| s));
        let mut entries = Vec::with_capacity(steps.len() + 1);
        entries.push((OVERALL_COLUMN.to_string(), overall));
        entries.extend(steps);
        Self { tile, entries }
    }

    pub fn tile(&self) -> &TileId {
        &self.tile
    }

    pub fn entries(&self) -> &[(String, Status)] {
        &self.entries
    }

    pub fn overall(&self) -> &Status {
        self.get(OVERALL_COLUMN).unwrap_or(&Status::Pending)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.overall(), Status::Complete)
    }

    pub fn get(&self, column: &str) -> Option<&Status> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, s)| s)
    }

    /// Read a record; zero rows, extra rows or a bad tile id are errors
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).record_context(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers().record_context(path)?.clone();
        if headers.get(0) != Some(INDEX_COLUMN) {
            return Err(BatchError::StatusRecord {
                path: path.to_path_buf(),
                message: format!("missing '{}' column", INDEX_COLUMN),
            });
        }

        let mut rows = reader.records();
        let row = match rows.next() {
            Some(row) => row.record_context(path)?,
            None => {
                return Err(BatchError::StatusRecord {
                    path: path.to_path_buf(),
                    message: "no rows".to_string(),
                });
            }
        };
        if rows.next().is_some() {
            return Err(BatchError::StatusRecord {
                path: path.to_path_buf(),
                message: "more than one row".to_string(),
            });
        }

        let tile = TileId::parse(row.get(0).unwrap_or_default().trim()).record_context(path)?;
        let entries = headers
            .iter()
            .skip(1)
            .zip(row.iter().skip(1))
            .map(|(column, value)| (column.to_string(), Status::from_token(value.trim())))
            .collect();

        Ok(Self { tile, entries })
    }

    /// Write the record atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, |file| {
            let mut writer = csv::Writer::from_writer(file);

            let mut header = vec![INDEX_COLUMN];
            header.extend(self.entries.iter().map(|(c, _)| c.as_str()));
            writer.write_record(&header)?;

            let mut row = vec![self.tile.as_str()];
            row.extend(self.entries.iter().map(|(_, s)| s.as_str()));
            writer.write_record(&row)?;

            writer.flush()?;
            Ok(())
        })
    }
}
