//! Error taxonomy for pipeline execution
//!
//! Every stage body returns these errors. The engine records them into the
//! stage outcome and halts the run; it never branches on the variant.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A write-once context variable was set a second time
    #[error("variable '{key}' is already set and cannot be overwritten")]
    ConfigurationConflict { key: String },

    /// Reference to a variable that is not set
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    /// External process exited with a nonzero status
    #[error("'{command}' exited with code {exit_code}")]
    ToolExecution {
        command: String,
        exit_code: i32,
        /// Captured (truncated, redacted) combined output
        output: String,
    },

    /// External process could not be started at all
    #[error("failed to start '{command}': {source}")]
    ToolLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A credential binding could not be resolved from the secret source
    #[error("credential '{id}' could not be resolved: {reason}")]
    CredentialResolution { id: String, reason: String },

    /// Deployment manifest could not be rendered
    #[error("manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    /// A tool succeeded but did not produce what the stage needs
    #[error("{0}")]
    UnexpectedOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short taxonomy tag used in stage diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ConfigurationConflict { .. } => "ConfigurationConflict",
            PipelineError::UndefinedVariable(_) => "UndefinedVariable",
            PipelineError::ToolExecution { .. } => "ToolExecutionError",
            PipelineError::ToolLaunch { .. } => "ToolLaunchError",
            PipelineError::CredentialResolution { .. } => "CredentialResolutionError",
            PipelineError::Manifest { .. } => "ManifestError",
            PipelineError::UnexpectedOutput(_) => "UnexpectedOutput",
            PipelineError::Io(_) => "IoError",
        }
    }

    /// Exit code carried by a tool execution failure
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            PipelineError::ToolExecution { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
