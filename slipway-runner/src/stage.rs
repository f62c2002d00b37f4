//! Stage model
//!
//! A stage is a named unit of work with an optional guard and a body. The
//! body runs against a [`StageEnv`], which gives it the run's context, the
//! tool invoker, credential scopes, the downstream dispatcher, and a buffer
//! for diagnostics. Everything a body does through the env is recorded into
//! that buffer.

use slipway_core::domain::log::LogLevel;
use slipway_core::domain::run::RunParameters;
use slipway_core::dto::trigger::TriggerPipeline;

use crate::config::Config;
use crate::context::{EnvironmentContext, VarProvider};
use crate::credentials::{Binding, CredentialScope, SecretSource, with_credentials};
use crate::error::{PipelineError, Result};
use crate::invoker::{ToolInvocation, ToolInvoker, ToolOutput};
use crate::service::{Dispatcher, LogBufferService};

/// Run/skip predicate evaluated against the invocation parameters
pub type Guard = fn(&RunParameters) -> bool;

/// A named unit of pipeline work
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Guard deciding whether the stage runs; `None` means always run
    fn guard(&self) -> Option<Guard> {
        None
    }

    /// Runs the stage body
    ///
    /// Any error fails the stage and, with it, the run.
    fn execute(&self, env: &StageEnv<'_>) -> Result<()>;
}

/// Everything a stage body can reach
pub struct StageEnv<'a> {
    pub params: &'a RunParameters,
    pub config: &'a Config,
    pub context: &'a EnvironmentContext,
    invoker: &'a dyn ToolInvoker,
    secrets: &'a dyn SecretSource,
    dispatcher: &'a Dispatcher,
    log: &'a dyn LogBufferService,
}

impl<'a> StageEnv<'a> {
    pub fn new(
        params: &'a RunParameters,
        config: &'a Config,
        context: &'a EnvironmentContext,
        invoker: &'a dyn ToolInvoker,
        secrets: &'a dyn SecretSource,
        dispatcher: &'a Dispatcher,
        log: &'a dyn LogBufferService,
    ) -> Self {
        Self {
            params,
            config,
            context,
            invoker,
            secrets,
            dispatcher,
            log,
        }
    }

    /// Runs a tool against the run context
    pub fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        self.run_with(self.context, invocation)
    }

    /// Runs a tool against `vars`, typically a credential scope
    ///
    /// The command line and captured output go to the stage diagnostics.
    pub fn run_with(&self, vars: &dyn VarProvider, invocation: &ToolInvocation) -> Result<ToolOutput> {
        let command = invocation
            .resolve(vars)
            .map(|resolved| resolved.display(vars))
            .unwrap_or_else(|_| invocation.to_string());
        self.info(format!("$ {}", command));

        match self.invoker.run(invocation, vars) {
            Ok(output) => {
                self.capture(LogLevel::Info, &output.output);
                Ok(output)
            }
            Err(err) => {
                if let PipelineError::ToolExecution { output, .. } = &err {
                    self.capture(LogLevel::Error, output);
                }
                Err(err)
            }
        }
    }

    /// Runs `body` with the given credentials bound
    pub fn with_credentials<T>(
        &self,
        bindings: &[Binding],
        body: impl FnOnce(&CredentialScope<'_>) -> Result<T>,
    ) -> Result<T> {
        with_credentials(self.context, self.secrets, bindings, body)
    }

    /// Hands a trigger request to the dispatcher without waiting on it
    pub fn dispatch(&self, req: TriggerPipeline) {
        self.dispatcher.dispatch(req);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log.log(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log.log(LogLevel::Warning, message.into());
    }

    fn capture(&self, level: LogLevel, output: &str) {
        let trimmed = output.trim();
        if !trimmed.is_empty() {
            self.log.log(level, trimmed.to_string());
        }
    }
}
