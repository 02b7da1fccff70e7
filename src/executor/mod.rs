//! Step Executor
//!
//! A step is one external tool invocation for one tile. Executors never fail
//! with an error: every failure is classified into a failure [`Status`] token
//! inside the executor, so the worker can record it and move on.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline ──► [Arc<dyn StepExecutor>] ──► CommandStep ──► tokio::process
//!                                              │
//!                                              └──► <scratch>/log.txt
//! ```

mod command;
mod pipeline;
mod template;
pub mod timeout;

pub use command::CommandStep;
pub use pipeline::Pipeline;
pub use template::{Template, TemplateVars};
pub use timeout::{step_timeout, with_timeout};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::types::{SlotId, Status, TileId};

/// Per-invocation context handed to executors by the worker slot
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Slot running the step
    pub slot: SlotId,
    /// Slot scratch directory, used as the tool's working directory
    pub scratch_dir: PathBuf,
}

impl StepContext {
    pub fn new(slot: SlotId, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            slot,
            scratch_dir: scratch_dir.into(),
        }
    }
}

/// One named unit of work applied to a tile
///
/// Implementations must be re-invokable for a tile whose previous attempt
/// failed part-way.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Step name (progress column and log folder name)
    fn name(&self) -> &str;

    /// Run the step for `tile` and classify the outcome
    async fn execute(&self, tile: &TileId, ctx: &StepContext) -> Status;
}
