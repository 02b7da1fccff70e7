//! tilebatch - Resumable Batch Processing of Tiled Geodata
//!
//! Runs a fixed pipeline of external command-line tools over every tile of a
//! tiled dataset, in parallel, and keeps a durable per-tile progress table so
//! an interrupted or partly failed batch can be resumed.
//!
//! ## Core Features
//!
//! - **Progress Store**: CSV progress table plus per-tile Status Records,
//!   reconciled by the coordinator only
//! - **Worker Pool**: bounded slots with staggered start and per-slot scratch
//!   directories
//! - **Step Executor**: external tools with templated arguments, classified
//!   into status tokens instead of errors
//! - **Log Aggregator**: step artifacts moved into a per-tile log hierarchy
//! - **Progress Monitor**: read-only observer with ETA
//!
//! ## Quick Start
//!
//! ```ignore
//! use tilebatch::{BatchRunner, ConfigLoader, Pipeline, RunOptions};
//! use tilebatch::scheduler::shutdown_channel;
//!
//! let config = ConfigLoader::load(None)?;
//! let pipeline = Pipeline::from_config("process_tiles", &config)?;
//! let (_trigger, shutdown) = shutdown_channel();
//! let report = BatchRunner::new(&config)
//!     .run(&pipeline, RunOptions::default(), shutdown)
//!     .await?;
//! println!("{} of {} tiles complete", report.complete(), report.total);
//! ```
//!
//! ## Modules
//!
//! - [`progress`]: Progress Table, Status Records, reconciliation
//! - [`scheduler`]: worker pool, slots, batch driver
//! - [`executor`]: step trait, command steps, pipelines
//! - [`logs`]: log artifact gathering
//! - [`monitor`]: progress observer
//! - [`config`]: layered configuration

pub mod cli;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod executor;
pub mod logs;
pub mod monitor;
pub mod progress;
pub mod scheduler;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, PipelineConfig, StepConfig};

// Error Types
pub use types::error::{BatchError, ErrorCategory, Result, ResultExt};

// Domain
pub use types::{SlotId, Status, TileId};

// =============================================================================
// Component Re-exports
// =============================================================================

pub use discovery::TileDiscovery;
pub use executor::{CommandStep, Pipeline, StepContext, StepExecutor};
pub use logs::LogAggregator;
pub use monitor::{ProgressMonitor, Snapshot};
pub use progress::{ProgressStore, ProgressTable, StatusRecord};
pub use scheduler::{BatchRunner, RunOptions, RunReport, WorkerPool};
