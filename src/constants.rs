//! Global Constants
//!
//! Centralized constants for file names, status tokens and tuning defaults.
//! All magic numbers should be defined here with documentation.

/// Status tokens as written to progress files
pub mod status {
    pub const PENDING: &str = "pending";
    pub const COMPLETE: &str = "complete";
    pub const SUCCESS: &str = "success";
    pub const INCOMPLETE: &str = "incomplete";

    /// Default failure token for a tool exiting non-zero
    pub const TOOL_ERROR: &str = "toolError";

    /// Failure token for a step killed by its timeout
    pub const TIMEOUT_ERROR: &str = "timeoutError";
}

/// Progress table and status record layout
pub mod progress {
    /// Index column holding the tile id
    pub const INDEX_COLUMN: &str = "tile_id";

    /// Overall tile status column (always the first step column)
    pub const OVERALL_COLUMN: &str = "processing";

    /// Progress table file inside `<log_root>/<pipeline>/`
    pub const PROGRESS_FILE: &str = "overall_progress.csv";

    /// Status record file inside `<log_root>/<pipeline>/<tile_id>/`
    pub const STATUS_RECORD_FILE: &str = "status.csv";
}

/// Worker scratch directories
pub mod scratch {
    /// Scratch directory name prefix, followed by the slot number
    pub const DIR_PREFIX: &str = "temp_";

    /// Free-form log written by steps into the scratch directory
    pub const STEP_LOG_FILE: &str = "log.txt";

    /// Subfolder of a scratch directory holding leftovers of an interrupted tile
    pub const STALE_DIR: &str = "stale";

    /// Artifacts gathered from the scratch directory after each step
    pub const DEFAULT_ARTIFACTS: &[&str] = &[STEP_LOG_FILE, "opalsLog.xml", "opalsErrors.txt"];
}

/// Scheduler defaults
pub mod scheduler {
    /// Default number of worker slots
    pub const DEFAULT_POOL_SIZE: usize = 4;

    /// Default stagger delay per slot index (seconds)
    pub const DEFAULT_STAGGER_SECS: u64 = 5;

    /// Environment variables capping tool thread counts
    pub const THREAD_CAP_ENV: &[(&str, &str)] = &[("OMP_NUM_THREADS", "1"), ("GDAL_NUM_THREADS", "1")];
}

/// Progress monitor defaults
pub mod monitor {
    /// Default poll interval (seconds)
    pub const DEFAULT_INTERVAL_SECS: u64 = 60;

    /// Tiles processed before the ETA baseline is taken
    pub const DEFAULT_WARMUP_TILES: usize = 10;

    /// Width of the rendered progress bar
    pub const BAR_WIDTH: usize = 78;
}
