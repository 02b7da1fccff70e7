//! Progress Store
//!
//! Durable per-tile, per-step outcomes. Workers write one Status Record per
//! tile into the log hierarchy; the coordinator folds them into the Progress
//! Table and persists it with an atomic whole-file rewrite.

mod record;
mod store;
mod table;

pub use record::StatusRecord;
pub use store::{ProgressStore, ResetReport};
pub use table::{ProgressTable, TileSetDiff};

use std::fs::{self, File};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::types::{BatchError, Result};

/// Write a file through a temporary sibling and an atomic rename
///
/// Readers see either the previous or the new content, never a torn file.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = path.parent().ok_or_else(|| {
        BatchError::Config(format!("Path has no parent directory: {}", path.display()))
    })?;
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| BatchError::Io(e.error))?;
    Ok(())
}
