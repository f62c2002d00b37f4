//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod stages;
mod trigger;

pub use run::RunArgs;
pub use trigger::TriggerArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Execute one pipeline run
    Run(RunArgs),
    /// Show the stage order
    Stages,
    /// Queue a run of another pipeline
    Trigger(TriggerArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run_command(args, config).await,
        Commands::Stages => stages::handle_stages_command(),
        Commands::Trigger(args) => trigger::handle_trigger_command(args, config).await,
    }
}
