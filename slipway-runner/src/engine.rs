//! Pipeline engine
//!
//! Drives one run through the stage list: evaluates guards, runs the stages
//! that pass, records an outcome for each and stops at the first failure.
//! The post-execution hooks run exactly once afterwards, whatever happened.

use chrono::{NaiveDate, Utc};
use slipway_core::domain::run::{PipelineRun, RunParameters, RunStatus};
use slipway_core::domain::stage::StageOutcome;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::context::EnvironmentContext;
use crate::credentials::SecretSource;
use crate::hooks::PostExecutionHooks;
use crate::invoker::ToolInvoker;
use crate::service::{Dispatcher, InMemoryLogBuffer, LogBufferService, Notifier};
use crate::stage::{Stage, StageEnv};
use crate::stages;

/// Sequential, fail-fast stage runner
pub struct PipelineEngine {
    config: Config,
    stages: Vec<Box<dyn Stage>>,
    invoker: Arc<dyn ToolInvoker>,
    secrets: Arc<dyn SecretSource>,
    dispatcher: Arc<Dispatcher>,
    hooks: PostExecutionHooks,
}

impl PipelineEngine {
    /// Creates an engine running the standard stage list
    ///
    /// # Arguments
    /// * `config` - Process-wide configuration
    /// * `invoker` - Runs external tools
    /// * `secrets` - Resolves credential identifiers
    /// * `dispatcher` - Fires downstream triggers
    /// * `notifier` - Receives failure notifications
    pub fn new(
        config: Config,
        invoker: Arc<dyn ToolInvoker>,
        secrets: Arc<dyn SecretSource>,
        dispatcher: Arc<Dispatcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let hooks = PostExecutionHooks::new(config.artifact_dir.clone(), notifier);
        Self {
            config,
            stages: stages::standard(),
            invoker,
            secrets,
            dispatcher,
            hooks,
        }
    }

    /// Replaces the stage list
    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the post-execution hooks archive the build identifier
    pub fn artifact_path(&self) -> PathBuf {
        self.hooks.artifact_path()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Starts a new run and drives it to completion
    ///
    /// # Arguments
    /// * `params` - Invocation parameters
    /// * `run_number` - Monotonic run number from the hosting scheduler
    /// * `date` - Date stamped into the build identifier
    ///
    /// # Returns
    /// The terminal run, with one outcome per stage that was reached
    pub fn launch(&self, params: RunParameters, run_number: u64, date: NaiveDate) -> PipelineRun {
        let context = EnvironmentContext::initialize(&params, &self.config, run_number, date);
        let mut run = PipelineRun::new(params, run_number, context.build_identifier().clone());

        info!(
            "Launching run {} (#{} {})",
            run.id, run.run_number, run.build_identifier
        );

        self.execute(&mut run, &context);
        run
    }

    /// Runs every stage of `run` against `context`, then the hooks
    pub fn execute(&self, run: &mut PipelineRun, context: &EnvironmentContext) -> RunStatus {
        run.start();
        let total = self.stages.len();
        let mut status = RunStatus::Succeeded;

        for (idx, stage) in self.stages.iter().enumerate() {
            info!("Executing stage {}/{}: {}", idx + 1, total, stage.name());

            if let Some(guard) = stage.guard() {
                if !guard(&run.parameters) {
                    info!("Stage '{}' skipped (guard not met)", stage.name());
                    run.record(StageOutcome::skipped(stage.name()));
                    continue;
                }
                debug!("Stage '{}' guard passed", stage.name());
            }

            let outcome = self.run_stage(stage.as_ref(), &run.parameters, context);
            let failed = outcome.error.is_some();
            run.record(outcome);

            if failed {
                status = RunStatus::Failed;
                break;
            }
        }

        run.finish(status);
        match status {
            RunStatus::Failed => error!("Run {} failed", run.id),
            _ => info!("Run {} completed successfully", run.id),
        }

        self.hooks.always(run);
        self.hooks.on_failure(run);

        run.status
    }

    fn run_stage(
        &self,
        stage: &dyn Stage,
        params: &RunParameters,
        context: &EnvironmentContext,
    ) -> StageOutcome {
        let started_at = Utc::now();
        let log = InMemoryLogBuffer::new();
        let env = StageEnv::new(
            params,
            &self.config,
            context,
            self.invoker.as_ref(),
            self.secrets.as_ref(),
            self.dispatcher.as_ref(),
            &log,
        );

        let result = catch_unwind(AssertUnwindSafe(|| stage.execute(&env)));

        match result {
            Ok(Ok(())) => {
                debug!("Stage '{}' completed", stage.name());
                StageOutcome::succeeded(stage.name(), started_at, log.drain())
            }
            Ok(Err(e)) => {
                error!("Stage '{}' failed: {}", stage.name(), e);
                let reason = format!("{} ({})", e, e.kind());
                StageOutcome::failed(stage.name(), started_at, log.drain(), reason)
            }
            Err(_) => {
                error!("Stage '{}' panicked", stage.name());
                StageOutcome::failed(stage.name(), started_at, log.drain(), "stage panicked")
            }
        }
    }
}
