//! Slipway Runner
//!
//! The stage orchestration engine for one build-test-package-deploy run.
//!
//! Architecture:
//! - Configuration: tool locations, image naming, credential ids
//! - Context: write-once environment shared by every stage
//! - Credentials: block-scoped secret bindings
//! - Invoker: external tool execution with `${VAR}` substitution
//! - Stages: the fixed, ordered units of work
//! - Engine: guard evaluation, fail-fast sequencing, post-execution hooks
//! - Repository/Service: downstream trigger dispatch, log buffering,
//!   failure notification
//!
//! Stages run strictly one after another on the calling thread. The only
//! asynchronous work is the fire-and-forget downstream trigger, which is
//! spawned onto a tokio runtime and never awaited by the run.

pub mod config;
pub mod context;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod invoker;
pub mod repository;
pub mod service;
pub mod stage;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use context::{EnvironmentContext, VarProvider};
pub use credentials::{Binding, EnvSecretSource, SecretSource, StaticSecretSource, with_credentials};
pub use engine::PipelineEngine;
pub use error::{PipelineError, Result};
pub use invoker::{ProcessInvoker, ToolInvocation, ToolInvoker, ToolOutput};
