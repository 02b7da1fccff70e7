//! Init Command
//!
//! Create `.tilebatch/config.toml` in the current directory.

use crate::config::ConfigLoader;
use crate::types::{BatchError, Result};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let (config_path, written) = ConfigLoader::init_project(&root, force)?;

    if !written {
        return Err(BatchError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    // Global config is optional; never overwrite it from here
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    println!("✓ Initialized tilebatch in .tilebatch/");
    println!("  Config: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the [tiles] and [pipelines] sections of the config");
    println!("  2. Run 'tilebatch run --pipeline process_tiles'");
    println!("  3. Watch it from another terminal with 'tilebatch monitor --pipeline process_tiles'");

    Ok(())
}
