//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Classifies every error into the batch failure taxonomy so the driver can
//! decide between a hard stop and "this tile stays pending".
//!
//! ## Error Categories
//!
//! - **Setup**: missing directories, invalid configuration (fatal, nothing dispatched)
//! - **TileSetMismatch**: persisted table disagrees with the tile universe (fatal)
//! - **Usage**: an operation called from the wrong context (reported, non-fatal)
//! - **Aggregation**: a Status Record could not be folded in (tile is retried)
//! - **Io**: unexpected filesystem failures in the coordinator
//!
//! Step failures are not errors at all: executors classify them into a
//! failure [`Status`](super::Status) token.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::TileId;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing inputs or invalid configuration - stop before dispatch
    Setup,
    /// Progress table does not match the discovered tiles - stop before dispatch
    TileSetMismatch,
    /// API misuse by a caller - report and continue
    Usage,
    /// Distributed status could not be merged - tile stays pending
    Aggregation,
    /// Filesystem failure in the coordinating process
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "SETUP"),
            Self::TileSetMismatch => write!(f, "TILE_SET_MISMATCH"),
            Self::Usage => write!(f, "USAGE"),
            Self::Aggregation => write!(f, "AGGREGATION"),
            Self::Io => write!(f, "IO"),
        }
    }
}

impl ErrorCategory {
    /// Whether this category must halt the batch before any tile is dispatched
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Setup | Self::TileSetMismatch | Self::Io)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum BatchError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Setup Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Required {role} directory does not exist: {}", path.display())]
    MissingDirectory { role: String, path: PathBuf },

    #[error("Unknown pipeline '{name}' (configured: {available})")]
    UnknownPipeline { name: String, available: String },

    #[error("Invalid pipeline name '{0}': must be a plain directory name")]
    InvalidPipelineName(String),

    #[error("Invalid tile id '{0}': expected digits_digits (e.g. 6239_447)")]
    InvalidTileId(String),

    #[error("Template '{template}' references unknown placeholder {{{placeholder}}}")]
    Template {
        template: String,
        placeholder: String,
    },

    #[error("No tiles found in {} matching '{pattern}'", dir.display())]
    NoTiles { dir: PathBuf, pattern: String },

    // -------------------------------------------------------------------------
    // Progress Errors
    // -------------------------------------------------------------------------
    #[error("Can't load progress file {}: {message}", path.display())]
    ProgressLoad { path: PathBuf, message: String },

    #[error(
        "Tile ids in the input folder and progress file {} do not match \
         ({} missing from progress file, {} not in input folder). \
         Remove the progress file or run 'tilebatch reset' to start over",
        progress_file.display(),
        missing.len(),
        unexpected.len()
    )]
    TileSetMismatch {
        progress_file: PathBuf,
        missing: Vec<TileId>,
        unexpected: Vec<TileId>,
    },

    #[error("Invalid status record {}: {message}", path.display())]
    StatusRecord { path: PathBuf, message: String },

    // -------------------------------------------------------------------------
    // Worker Errors
    // -------------------------------------------------------------------------
    #[error("Log gathering called from outside a scratch directory: {}", path.display())]
    OutsideScratch { path: PathBuf },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, BatchError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl BatchError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a missing directory error
    pub fn missing_directory(role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingDirectory {
            role: role.into(),
            path: path.into(),
        }
    }

    /// Classify this error into the batch failure taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::MissingDirectory { .. }
            | Self::UnknownPipeline { .. }
            | Self::InvalidPipelineName(_)
            | Self::InvalidTileId(_)
            | Self::Template { .. }
            | Self::NoTiles { .. }
            | Self::ProgressLoad { .. } => ErrorCategory::Setup,
            Self::TileSetMismatch { .. } => ErrorCategory::TileSetMismatch,
            Self::OutsideScratch { .. } => ErrorCategory::Usage,
            Self::StatusRecord { .. } | Self::Csv(_) => ErrorCategory::Aggregation,
            Self::Io(_) | Self::Json(_) | Self::Timeout { .. } | Self::Worker(_) => {
                ErrorCategory::Io
            }
        }
    }

    /// Check if this error must stop the process
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Attach the path being read as a status record error
    fn record_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Attach the path being loaded as a progress load error
    fn progress_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn record_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| BatchError::StatusRecord {
            path: path.into(),
            message: e.to_string(),
        })
    }

    fn progress_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| BatchError::ProgressLoad {
            path: path.into(),
            message: e.to_string(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Setup.to_string(), "SETUP");
        assert_eq!(
            ErrorCategory::TileSetMismatch.to_string(),
            "TILE_SET_MISMATCH"
        );
        assert_eq!(ErrorCategory::Usage.to_string(), "USAGE");
    }

    #[test]
    fn test_fatal_categories() {
        assert!(ErrorCategory::Setup.is_fatal());
        assert!(ErrorCategory::TileSetMismatch.is_fatal());
        assert!(!ErrorCategory::Usage.is_fatal());
        assert!(!ErrorCategory::Aggregation.is_fatal());
    }

    #[test]
    fn test_classify_errors() {
        let err = BatchError::missing_directory("input", "/nope");
        assert_eq!(err.category(), ErrorCategory::Setup);
        assert!(err.is_fatal());

        let err = BatchError::OutsideScratch {
            path: PathBuf::from("/home"),
        };
        assert_eq!(err.category(), ErrorCategory::Usage);
        assert!(!err.is_fatal());

        let err = BatchError::StatusRecord {
            path: PathBuf::from("status.csv"),
            message: "empty".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Aggregation);
    }

    #[test]
    fn test_mismatch_message_counts() {
        let err = BatchError::TileSetMismatch {
            progress_file: PathBuf::from("log/p/overall_progress.csv"),
            missing: vec![TileId::parse("1000_100").unwrap()],
            unexpected: vec![],
        };
        let message = err.to_string();
        assert!(message.contains("1 missing"));
        assert!(message.contains("0 not in input folder"));
    }

    #[test]
    fn test_result_ext_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("truncated"));
        let err = res.record_context("a/status.csv").unwrap_err();
        assert!(matches!(err, BatchError::StatusRecord { .. }));
        assert!(err.to_string().contains("truncated"));
    }
}
