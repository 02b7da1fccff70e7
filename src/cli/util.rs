//! CLI Common Utilities
//!
//! Shared context for command handlers.

use std::path::Path;

use console::Term;

use crate::config::{Config, ConfigLoader};
use crate::executor::Pipeline;
use crate::types::{Result, TileId};

/// Command execution context
///
/// Loaded once per invocation; paths in `config` are already absolute.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
}

impl CommandContext {
    /// Load the layered configuration, with `--config` replacing the project layer
    pub fn load(config_override: Option<&Path>) -> Result<Self> {
        Ok(Self {
            config: ConfigLoader::load(config_override)?,
        })
    }

    /// Build the executable pipeline for `name`
    pub fn pipeline(&self, name: &str) -> Result<Pipeline> {
        Pipeline::from_config(name, &self.config)
    }

    /// Fail with the list of configured pipelines unless `name` is one of them
    pub fn require_pipeline(&self, name: &str) -> Result<()> {
        self.config.pipeline(name).map(|_| ())
    }
}

/// Parse `--tile` arguments
pub fn parse_tiles(ids: &[String]) -> Result<Vec<TileId>> {
    ids.iter().map(|id| TileId::parse(id.trim())).collect()
}

/// Ask a yes/no question on the terminal; anything but `y`/`yes` is a no
pub fn confirm(prompt: &str) -> Result<bool> {
    let term = Term::stdout();
    term.write_str(&format!("{} [y/N] ", prompt))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchError;

    #[test]
    fn test_parse_tiles() {
        let tiles = parse_tiles(&["6239_447".to_string(), " 6240_448 ".to_string()]).unwrap();
        assert_eq!(tiles[1].as_str(), "6240_448");

        let err = parse_tiles(&["6239-447".to_string()]).unwrap_err();
        assert!(matches!(err, BatchError::InvalidTileId(_)));
    }

    #[test]
    fn test_require_pipeline() {
        let ctx = CommandContext {
            config: Config::default(),
        };
        let err = ctx.require_pipeline("process_tiles").unwrap_err();
        assert!(matches!(err, BatchError::UnknownPipeline { .. }));
    }
}
