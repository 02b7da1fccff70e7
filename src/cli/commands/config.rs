//! Config Command
//!
//! Usage:
//!   tilebatch config show [-f json]
//!   tilebatch config path
//!   tilebatch config init [-g] [--force]

use std::path::Path;

use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(config_override: Option<&Path>, format: &str) -> Result<()> {
    ConfigLoader::show_config(config_override, format == "json")
}

/// Show configuration paths
pub fn path(config_override: Option<&Path>) -> Result<()> {
    ConfigLoader::show_path(config_override);
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_global(force)?;
    println!("✓ Initialized global configuration");
    println!("  Config: {}", config_path.display());
    Ok(())
}

/// Initialize project configuration
pub fn init_project(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let (config_path, written) = ConfigLoader::init_project(&root, force)?;
    if written {
        println!("✓ Initialized project configuration");
    } else {
        println!("Project configuration already exists (use --force to overwrite)");
    }
    println!("  Config: {}", config_path.display());
    Ok(())
}
