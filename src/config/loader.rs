//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (platform config dir, e.g. ~/.config/tilebatch/config.toml)
//! 3. Project config (.tilebatch/config.toml, or `--config <path>`)
//! 4. Environment variables (TILEBATCH_* prefix, `__` for nesting)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::types::{BatchError, Result};

const ENV_PREFIX: &str = "TILEBATCH_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    ///
    /// `project_override` replaces the project config path (CLI `--config`).
    /// Relative paths are resolved against the current directory.
    pub fn load(project_override: Option<&Path>) -> Result<Config> {
        let project_path = project_override
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::project_config_path);

        if project_override.is_some() && !project_path.exists() {
            return Err(BatchError::Config(format!(
                "Config file not found: {}",
                project_path.display()
            )));
        }

        let config = Self::load_layers(
            Self::global_config_path().as_deref(),
            Some(&project_path),
        )?;

        let base = std::env::current_dir()?;
        Ok(config.resolve_paths(&base))
    }

    /// Load configuration from a specific file only (no global layer, no env)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| BatchError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn load_layers(global: Option<&Path>, project: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if let Some(project_path) = project
            && project_path.exists()
        {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(project_path));
        }

        // TILEBATCH_SCHEDULER__POOL_SIZE -> scheduler.pool_size
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| BatchError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tilebatch").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".tilebatch")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(project_override: Option<&Path>) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = project_override
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::project_config_path);
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show current effective configuration
    pub fn show_config(project_override: Option<&Path>, as_json: bool) -> Result<()> {
        let config = Self::load(project_override)?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| BatchError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            BatchError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Initialize project configuration under `root`
    ///
    /// Returns the config file path and whether it was written.
    pub fn init_project(root: &Path, force: bool) -> Result<(PathBuf, bool)> {
        let project_dir = root.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if config_path.exists() && !force {
            info!("Project config exists: {}", config_path.display());
            return Ok((config_path, false));
        }

        fs::write(&config_path, Self::default_project_config())?;
        info!("Created project config: {}", config_path.display());
        Ok((config_path, true))
    }

    /// Check if project is initialized
    pub fn is_project_initialized() -> bool {
        Self::project_config_path().exists()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# tilebatch Global Configuration
# Machine-wide defaults. Settings in .tilebatch/config.toml override these.

version = "1.0"

[scheduler]
pool_size = 4
stagger_secs = 5

[scheduler.thread_env]
OMP_NUM_THREADS = "1"
GDAL_NUM_THREADS = "1"

[monitor]
interval_secs = 60
warmup_tiles = 10
"#
        .to_string()
    }

    fn default_project_config() -> String {
        r#"# tilebatch Project Configuration
# Paths are relative to the directory tilebatch is started from.

version = "1.0"

[paths]
log_root = "log"
scratch_root = "scratch"
output_dir = "outputs"
required = ["data/dtm"]
create = ["outputs/slope", "outputs/aspect"]

[paths.vars]
dtm_folder = "data/dtm"

[tiles]
input_dir = "data/laz"
glob = "PUNKTSKY_1km_*.laz"
id_pattern = 'PUNKTSKY_1km_(\d+_\d+)\.laz$'

[scheduler]
pool_size = 4
stagger_secs = 5
# step_timeout_secs = 3600

[logs]
artifacts = ["log.txt", "opalsLog.xml", "opalsErrors.txt"]

[monitor]
interval_secs = 60
warmup_tiles = 10

[pipelines.process_tiles]
description = "Terrain derivatives per 1km tile"

[[pipelines.process_tiles.steps]]
name = "slope"
program = "gdaldem"
args = ["slope", "{dtm_folder}/DTM_1km_{tile_id}.tif", "{output_dir}/slope/SLOPE_1km_{tile_id}.tif"]
failure_status = "gdalError"
outputs = ["{output_dir}/slope/SLOPE_1km_{tile_id}.tif"]

[[pipelines.process_tiles.steps]]
name = "aspect"
program = "gdaldem"
args = ["aspect", "{dtm_folder}/DTM_1km_{tile_id}.tif", "{output_dir}/aspect/ASPECT_1km_{tile_id}.tif"]
failure_status = "gdalError"
outputs = ["{output_dir}/aspect/ASPECT_1km_{tile_id}.tif"]
"#
        .to_string()
    }
}
