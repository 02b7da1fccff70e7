use std::fmt;
use std::sync::Arc;

use super::StepExecutor;
use super::command::CommandStep;
use super::template::TemplateVars;
use crate::config::Config;
use crate::types::{BatchError, Result};

/// Named, ordered list of steps applied to every tile
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn StepExecutor>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Arc<dyn StepExecutor>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Build the configured pipeline `name` from command steps
    pub fn from_config(name: &str, config: &Config) -> Result<Self> {
        let pipeline = config.pipeline(name)?;
        if pipeline.steps.is_empty() {
            return Err(BatchError::Config(format!(
                "Pipeline '{}' has no steps",
                name
            )));
        }

        let vars = Arc::new(TemplateVars::from_config(config));
        let steps = pipeline
            .steps
            .iter()
            .map(|step| {
                CommandStep::from_config(step, config, Arc::clone(&vars))
                    .map(|s| Arc::new(s) as Arc<dyn StepExecutor>)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(name, steps))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Arc<dyn StepExecutor>] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, StepConfig};

    fn config_with(steps: Vec<StepConfig>) -> Config {
        let mut config = Config::default();
        config.pipelines.insert(
            "process_tiles".to_string(),
            PipelineConfig {
                description: None,
                steps,
            },
        );
        config
    }

    fn step(name: &str, args: &[&str]) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            program: "gdaldem".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_config_keeps_order() {
        let config = config_with(vec![
            step("slope", &["slope", "{tile_id}"]),
            step("aspect", &["aspect", "{tile_id}"]),
        ]);
        let pipeline = Pipeline::from_config("process_tiles", &config).unwrap();
        assert_eq!(pipeline.name(), "process_tiles");
        assert_eq!(pipeline.step_names(), ["slope", "aspect"]);
    }

    #[test]
    fn test_from_config_errors() {
        let config = config_with(vec![]);
        assert!(Pipeline::from_config("process_tiles", &config).is_err());
        assert!(matches!(
            Pipeline::from_config("prep_dtm", &config),
            Err(BatchError::UnknownPipeline { .. })
        ));

        let config = config_with(vec![step("slope", &["{nope}"])]);
        let err = Pipeline::from_config("process_tiles", &config).unwrap_err();
        assert!(err.is_fatal());
    }
}
