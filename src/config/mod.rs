//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (platform config dir)
//! 3. Project config (.tilebatch/config.toml)
//! 4. Environment variables (TILEBATCH_*)
//! 5. CLI arguments (highest priority, applied by the commands)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
