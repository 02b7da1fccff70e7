//! Log Aggregator
//!
//! Moves step artifacts from worker scratch directories into the log folder
//! hierarchy, and collects whole slots into a session log for the
//! `collect-logs` command.

mod aggregator;

pub use aggregator::{CollectReport, GatherReport, LogAggregator};
