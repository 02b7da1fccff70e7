//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! One `Config` is built at process start and passed by reference to every
//! component; nothing reads settings from process-wide state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{monitor, progress, scheduler, scratch, status};
use crate::types::{BatchError, Result, Status, is_path_component};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Directory layout
    pub paths: PathsConfig,

    /// Tile universe discovery
    pub tiles: TilesConfig,

    /// Worker pool settings
    pub scheduler: SchedulerConfig,

    /// Log gathering settings
    pub logs: LogsConfig,

    /// Progress monitor settings
    pub monitor: MonitorConfig,

    /// Pipelines by name
    pub pipelines: BTreeMap<String, PipelineConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathsConfig::default(),
            tiles: TilesConfig::default(),
            scheduler: SchedulerConfig::default(),
            logs: LogsConfig::default(),
            monitor: MonitorConfig::default(),
            pipelines: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `BatchError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.pool_size == 0 {
            return Err(BatchError::Config(
                "scheduler.pool_size must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.step_timeout_secs == Some(0) {
            return Err(BatchError::Config(
                "scheduler.step_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        if self.monitor.interval_secs == 0 {
            return Err(BatchError::Config(
                "monitor.interval_secs must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = regex::Regex::new(&self.tiles.id_pattern) {
            return Err(BatchError::Config(format!(
                "tiles.id_pattern is not a valid regex: {}",
                e
            )));
        }

        for (name, pipeline) in &self.pipelines {
            if !is_path_component(name) {
                return Err(BatchError::Config(format!(
                    "Pipeline name '{}' must be a plain directory name",
                    name
                )));
            }
            pipeline.validate(name)?;
        }

        Ok(())
    }

    /// Look up a pipeline by name
    pub fn pipeline(&self, name: &str) -> Result<&PipelineConfig> {
        self.pipelines
            .get(name)
            .ok_or_else(|| BatchError::UnknownPipeline {
                name: name.to_string(),
                available: if self.pipelines.is_empty() {
                    "none".to_string()
                } else {
                    self.pipelines
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            })
    }

    /// Resolve every relative path against `base` (or `paths.work_dir` if set)
    ///
    /// Steps run inside scratch directories, so all paths handed to them
    /// must be absolute.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let base = match &self.paths.work_dir {
            Some(work_dir) => absolutize(base, work_dir),
            None => base.to_path_buf(),
        };

        let p = &mut self.paths;
        p.work_dir = Some(base.clone());
        p.log_root = absolutize(&base, &p.log_root);
        p.scratch_root = absolutize(&base, &p.scratch_root);
        p.output_dir = absolutize(&base, &p.output_dir);
        p.required = p.required.iter().map(|d| absolutize(&base, d)).collect();
        p.create = p.create.iter().map(|d| absolutize(&base, d)).collect();
        for dir in p.vars.values_mut() {
            *dir = absolutize(&base, dir);
        }
        self.tiles.input_dir = absolutize(&base, &self.tiles.input_dir);

        self
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// =============================================================================
// Paths Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base directory for relative paths (defaults to the current directory)
    pub work_dir: Option<PathBuf>,

    /// Root of the log folder hierarchy
    pub log_root: PathBuf,

    /// Root under which per-slot scratch directories are created
    pub scratch_root: PathBuf,

    /// Output root, available to step templates as `{output_dir}`
    pub output_dir: PathBuf,

    /// Directories that must exist before a run starts
    pub required: Vec<PathBuf>,

    /// Directories created at the start of a run if missing
    pub create: Vec<PathBuf>,

    /// Additional named paths available to step templates as `{name}`
    pub vars: BTreeMap<String, PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            log_root: PathBuf::from("log"),
            scratch_root: PathBuf::from("scratch"),
            output_dir: PathBuf::from("outputs"),
            required: Vec::new(),
            create: Vec::new(),
            vars: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Tiles Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TilesConfig {
    /// Directory holding one input file per tile
    pub input_dir: PathBuf,

    /// Glob pattern (relative to `input_dir`) selecting input files
    pub glob: String,

    /// Regex with one capture group extracting the tile id from a file name
    pub id_pattern: String,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/laz"),
            glob: "*.laz".to_string(),
            id_pattern: r"(\d+_\d+)\.[^.]+$".to_string(),
        }
    }
}

// =============================================================================
// Scheduler Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of concurrent worker slots
    pub pool_size: usize,

    /// Start delay per slot index, applied once on each slot's first tile
    pub stagger_secs: u64,

    /// Default per-step timeout; unset means steps may run indefinitely
    pub step_timeout_secs: Option<u64>,

    /// Environment applied to every tool invocation
    pub thread_env: BTreeMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: scheduler::DEFAULT_POOL_SIZE,
            stagger_secs: scheduler::DEFAULT_STAGGER_SECS,
            step_timeout_secs: None,
            thread_env: scheduler::THREAD_CAP_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

// =============================================================================
// Logs Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Artifact file names moved out of scratch directories after each step
    pub artifacts: Vec<String>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            artifacts: scratch::DEFAULT_ARTIFACTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Monitor Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll interval in seconds
    pub interval_secs: u64,

    /// Tiles excluded from the ETA rate while the run warms up
    pub warmup_tiles: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: monitor::DEFAULT_INTERVAL_SECS,
            warmup_tiles: monitor::DEFAULT_WARMUP_TILES,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Free-form description shown by `status`
    pub description: Option<String>,

    /// Steps in execution order
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    fn validate(&self, pipeline: &str) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !is_path_component(&step.name) {
                return Err(BatchError::Config(format!(
                    "Pipeline '{}': step name '{}' must be a plain directory name",
                    pipeline, step.name
                )));
            }
            if step.name == progress::OVERALL_COLUMN || step.name == progress::INDEX_COLUMN {
                return Err(BatchError::Config(format!(
                    "Pipeline '{}': step name '{}' is reserved",
                    pipeline, step.name
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(BatchError::Config(format!(
                    "Pipeline '{}': duplicate step '{}'",
                    pipeline, step.name
                )));
            }
            if step.program.trim().is_empty() {
                return Err(BatchError::Config(format!(
                    "Pipeline '{}': step '{}' has no program",
                    pipeline, step.name
                )));
            }
            if !matches!(Status::from_token(&step.failure_status), Status::Failed(_)) {
                return Err(BatchError::Config(format!(
                    "Pipeline '{}': step '{}' failure_status '{}' is not a failure token",
                    pipeline, step.name, step.failure_status
                )));
            }
            if step.timeout_secs == Some(0) {
                return Err(BatchError::Config(format!(
                    "Pipeline '{}': step '{}' timeout_secs must be greater than 0",
                    pipeline, step.name
                )));
            }
        }
        Ok(())
    }
}

/// One external tool invocation per tile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Step name (progress column and log folder name)
    pub name: String,

    /// Executable, may contain placeholders
    pub program: String,

    /// Arguments, may contain placeholders such as `{tile_id}`
    pub args: Vec<String>,

    /// Status token recorded when the tool fails
    pub failure_status: String,

    /// Per-step timeout overriding `scheduler.step_timeout_secs`
    pub timeout_secs: Option<u64>,

    /// Extra environment for this step
    pub env: BTreeMap<String, String>,

    /// Output files; when all exist the step is skipped as already done
    pub outputs: Vec<String>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            program: String::new(),
            args: Vec::new(),
            failure_status: status::TOOL_ERROR.to_string(),
            timeout_secs: None,
            env: BTreeMap::new(),
            outputs: Vec::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
