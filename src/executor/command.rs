//! Command-backed step
//!
//! Runs one configured external tool per tile inside the slot's scratch
//! directory and classifies the outcome into a status token.

use async_trait::async_trait;
use chrono::Local;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::template::{Template, TemplateVars};
use super::timeout::{step_timeout, with_timeout};
use super::{StepContext, StepExecutor};
use crate::config::{Config, StepConfig};
use crate::constants::scratch::STEP_LOG_FILE;
use crate::constants::status::TIMEOUT_ERROR;
use crate::types::{BatchError, Result, Status, TileId};

pub struct CommandStep {
    name: String,
    program: Template,
    args: Vec<Template>,
    outputs: Vec<Template>,
    env: Vec<(String, String)>,
    failure_status: Status,
    timeout: Option<Duration>,
    vars: Arc<TemplateVars>,
}

impl CommandStep {
    /// Build a step from configuration, rejecting unknown placeholders
    pub fn from_config(step: &StepConfig, config: &Config, vars: Arc<TemplateVars>) -> Result<Self> {
        let program = Template::parse(&step.program);
        let args: Vec<Template> = step.args.iter().map(|a| Template::parse(a)).collect();
        let outputs: Vec<Template> = step.outputs.iter().map(|o| Template::parse(o)).collect();

        for template in std::iter::once(&program).chain(&args).chain(&outputs) {
            template.check(&vars)?;
        }

        let mut env: Vec<(String, String)> = config
            .scheduler
            .thread_env
            .iter()
            .filter(|(k, _)| !step.env.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(Self {
            name: step.name.clone(),
            program,
            args,
            outputs,
            env,
            failure_status: Status::failed(step.failure_status.as_str()),
            timeout: step_timeout(step.timeout_secs, config.scheduler.step_timeout_secs),
            vars,
        })
    }

    /// Whether every declared output already exists for this tile
    fn outputs_exist(&self, vars: &TemplateVars) -> bool {
        !self.outputs.is_empty()
            && self
                .outputs
                .iter()
                .all(|o| std::path::Path::new(&o.render(vars)).exists())
    }

    async fn run_tool(&self, program: &str, args: &[String], ctx: &StepContext) -> Result<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&ctx.scratch_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let output = with_timeout(self.timeout, child.wait_with_output(), &self.name).await??;
        Ok(output)
    }

    /// Append tool output and a status line to the scratch step log
    async fn append_log(&self, ctx: &StepContext, tile: &TileId, body: &[u8], line: &str) {
        let path = ctx.scratch_dir.join(STEP_LOG_FILE);
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(body).await?;
            if !body.is_empty() && !body.ends_with(b"\n") {
                file.write_all(b"\n").await?;
            }
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(tile = %tile, step = %self.name, "Failed to write {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl StepExecutor for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, tile: &TileId, ctx: &StepContext) -> Status {
        let vars = self.vars.for_tile(tile, &ctx.scratch_dir);

        if self.outputs_exist(&vars) {
            debug!(tile = %tile, step = %self.name, "Outputs present, skipping");
            return Status::Success;
        }

        let program = self.program.render(&vars);
        let args: Vec<String> = self.args.iter().map(|a| a.render(&vars)).collect();
        let started = Instant::now();

        debug!(tile = %tile, step = %self.name, slot = %ctx.slot, "Running {}", program);

        let (status, body, detail) = match self.run_tool(&program, &args, ctx).await {
            Ok(output) => {
                let mut body = output.stdout;
                body.extend_from_slice(&output.stderr);
                if output.status.success() {
                    (Status::Success, body, String::new())
                } else {
                    (
                        self.failure_status.clone(),
                        body,
                        format!(" ({})", output.status),
                    )
                }
            }
            Err(BatchError::Timeout { duration, .. }) => (
                Status::failed(TIMEOUT_ERROR),
                Vec::new(),
                format!(" (killed after {:?})", duration),
            ),
            Err(e) => (
                self.failure_status.clone(),
                Vec::new(),
                format!(" (failed to run {}: {})", program, e),
            ),
        };

        let elapsed = started.elapsed();
        if status.is_ok() {
            debug!(tile = %tile, step = %self.name, elapsed_ms = elapsed.as_millis() as u64, "Step succeeded");
        } else {
            warn!(tile = %tile, step = %self.name, status = %status, "Step failed{}", detail);
        }

        let line = format!(
            "{} {} {}: {}{} [{:.1}s]",
            Local::now().format("%X"),
            tile,
            self.name,
            status,
            detail,
            elapsed.as_secs_f64()
        );
        self.append_log(ctx, tile, &body, &line).await;

        status
    }
}
