//! Tile Discovery
//!
//! Derives the tile universe from the files present in the input directory.
//! Each file matching the configured glob contributes one tile id, extracted
//! with the configured regex.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{Config, TilesConfig};
use crate::types::{BatchError, Result, TileId};

/// Discovers tile ids from input file names
#[derive(Debug)]
pub struct TileDiscovery {
    input_dir: PathBuf,
    glob: String,
    id_pattern: Regex,
}

impl TileDiscovery {
    pub fn new(tiles: &TilesConfig) -> Result<Self> {
        let id_pattern = Regex::new(&tiles.id_pattern)
            .map_err(|e| BatchError::Config(format!("Invalid tiles.id_pattern: {}", e)))?;

        if id_pattern.captures_len() < 2 {
            return Err(BatchError::Config(
                "tiles.id_pattern needs a capture group for the tile id".to_string(),
            ));
        }

        Ok(Self {
            input_dir: tiles.input_dir.clone(),
            glob: tiles.glob.clone(),
            id_pattern,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.tiles)
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// List the tile universe, sorted and without duplicates
    ///
    /// A missing input directory or an empty match set is a setup error.
    pub fn discover(&self) -> Result<Vec<TileId>> {
        if !self.input_dir.is_dir() {
            return Err(BatchError::missing_directory("input", &self.input_dir));
        }

        // Only the file part is a pattern; the directory is matched literally
        let dir = glob::Pattern::escape(&self.input_dir.to_string_lossy());
        let pattern = Path::new(&dir).join(&self.glob);
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern)
            .map_err(|e| BatchError::Config(format!("Invalid tiles.glob '{}': {}", self.glob, e)))?;

        let mut tiles = BTreeSet::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable input entry: {}", e);
                    continue;
                }
            };

            match self.tile_id_for(&path) {
                Some(tile) => {
                    tiles.insert(tile);
                }
                None => debug!("No tile id in file name: {}", path.display()),
            }
        }

        if tiles.is_empty() {
            return Err(BatchError::NoTiles {
                dir: self.input_dir.clone(),
                pattern: self.glob.clone(),
            });
        }

        debug!(count = tiles.len(), dir = %self.input_dir.display(), "Discovered tiles");
        Ok(tiles.into_iter().collect())
    }

    /// Extract the tile id from an input file path
    pub fn tile_id_for(&self, path: &Path) -> Option<TileId> {
        let name = path.file_name()?.to_str()?;
        let captures = self.id_pattern.captures(name)?;
        TileId::parse(captures.get(1)?.as_str()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tiles_config(dir: &Path) -> TilesConfig {
        TilesConfig {
            input_dir: dir.to_path_buf(),
            glob: "PUNKTSKY_1km_*.laz".to_string(),
            id_pattern: r"PUNKTSKY_1km_(\d+_\d+)\.laz$".to_string(),
        }
    }

    #[test]
    fn test_discover_sorted_unique() {
        let temp = TempDir::new().unwrap();
        for name in [
            "PUNKTSKY_1km_6240_447.laz",
            "PUNKTSKY_1km_6239_447.laz",
            "PUNKTSKY_1km_6239_448.laz",
            "README.txt",
            "PUNKTSKY_1km_bad.laz",
        ] {
            fs::write(temp.path().join(name), b"").unwrap();
        }

        let discovery = TileDiscovery::new(&tiles_config(temp.path())).unwrap();
        let tiles = discovery.discover().unwrap();
        let ids: Vec<&str> = tiles.iter().map(TileId::as_str).collect();
        assert_eq!(ids, ["6239_447", "6239_448", "6240_447"]);
    }

    #[test]
    fn test_glob_characters_in_input_dir() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("laz[2023]");
        // Would match "laz[2023]" as a character class
        let decoy = temp.path().join("laz2");
        for dir in [&input, &decoy] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(input.join("PUNKTSKY_1km_6239_447.laz"), b"").unwrap();
        fs::write(decoy.join("PUNKTSKY_1km_9999_999.laz"), b"").unwrap();

        let tiles = TileDiscovery::new(&tiles_config(&input))
            .unwrap()
            .discover()
            .unwrap();
        assert_eq!(tiles, vec![TileId::parse("6239_447").unwrap()]);
    }

    #[test]
    fn test_discover_empty_is_error() {
        let temp = TempDir::new().unwrap();
        let discovery = TileDiscovery::new(&tiles_config(temp.path())).unwrap();
        assert!(matches!(
            discovery.discover(),
            Err(BatchError::NoTiles { .. })
        ));
    }

    #[test]
    fn test_missing_input_dir() {
        let temp = TempDir::new().unwrap();
        let discovery = TileDiscovery::new(&tiles_config(&temp.path().join("nope"))).unwrap();
        let err = discovery.discover().unwrap_err();
        assert!(matches!(err, BatchError::MissingDirectory { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_pattern_without_group_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = tiles_config(temp.path());
        config.id_pattern = r"\d+_\d+".to_string();
        assert!(TileDiscovery::new(&config).is_err());
    }
}
