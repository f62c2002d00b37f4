//! Run command handler
//!
//! Wires the engine to real collaborators (process invoker, environment
//! secrets, HTTP dispatcher) and executes one run.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use colored::*;
use slipway_client::PipelineClient;
use slipway_core::domain::log::{LogEntry, LogLevel};
use slipway_core::domain::run::{PipelineRun, RunParameters, RunStatus};
use slipway_core::domain::stage::{StageOutcome, StageState};
use slipway_runner::repository::HttpPipelineRepository;
use slipway_runner::service::{Dispatcher, LogNotifier};
use slipway_runner::{EnvSecretSource, PipelineEngine, ProcessInvoker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

use crate::config::Config;

/// Arguments of `slipway run`
#[derive(Args)]
pub struct RunArgs {
    /// Source repository to build
    #[arg(long, env = "SLIPWAY_REPOSITORY_URL")]
    pub repository_url: String,

    /// Branch to check out
    #[arg(long, env = "SLIPWAY_BRANCH")]
    pub branch: String,

    /// Project key reported to the scanner
    #[arg(long, env = "SLIPWAY_PROJECT_KEY")]
    pub project_key: String,

    /// Skip the test stage
    #[arg(long)]
    pub skip_tests: bool,

    /// Monotonic run number assigned by the hosting scheduler
    #[arg(long, env = "BUILD_NUMBER")]
    pub run_number: u64,

    /// Date stamped into the build identifier (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Write the finished run as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Seconds to wait for downstream triggers before exiting
    #[arg(long, default_value = "10")]
    pub grace_secs: u64,
}

impl RunArgs {
    pub fn parameters(&self) -> RunParameters {
        RunParameters {
            repository_url: self.repository_url.clone(),
            branch: self.branch.clone(),
            scanner_project_key: self.project_key.clone(),
            skip_tests: self.skip_tests,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date `{}`, expected YYYY-MM-DD", s))
}

/// Handle the run command
///
/// # Arguments
/// * `args` - Run parameters and output options
/// * `config` - The CLI configuration
pub async fn handle_run_command(args: RunArgs, config: &Config) -> Result<()> {
    let mut runner_config = slipway_runner::Config::from_env();
    runner_config.pipeline_service_url = config.pipeline_service_url.clone();
    runner_config
        .validate()
        .context("Invalid pipeline configuration")?;

    let params = args.parameters();
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    let client = Arc::new(PipelineClient::new(&runner_config.pipeline_service_url));
    let repository = Arc::new(HttpPipelineRepository::new(client));
    let dispatcher = Arc::new(Dispatcher::new(Handle::current(), repository));
    let invoker = Arc::new(ProcessInvoker::new(
        runner_config.workspace.clone(),
        runner_config.output_limit,
    ));

    info!(
        "Workspace {}, artifacts {}",
        runner_config.workspace.display(),
        runner_config.artifact_dir.display()
    );

    let engine = Arc::new(PipelineEngine::new(
        runner_config,
        invoker,
        Arc::new(EnvSecretSource),
        dispatcher.clone(),
        Arc::new(LogNotifier),
    ));

    let artifact = engine.artifact_path();

    // Stages block on child processes; keep them off the async workers
    let run_number = args.run_number;
    let run = tokio::task::spawn_blocking(move || engine.launch(params, run_number, date))
        .await
        .context("Pipeline engine task failed")?;

    print_run(&run);
    if artifact.exists() {
        println!("  Artifact: {}", artifact.display().to_string().dimmed());
    }

    if let Some(path) = &args.report {
        write_report(path, &run)?;
        println!("  Report:  {}", path.display().to_string().dimmed());
    }

    dispatcher.settle(Duration::from_secs(args.grace_secs)).await;

    if run.status == RunStatus::Failed {
        let stage = run
            .failed_stage()
            .map(|s| s.name.as_str())
            .unwrap_or("unknown");
        anyhow::bail!("Run {} failed at stage '{}'", run.build_identifier, stage);
    }

    Ok(())
}

fn write_report(path: &Path, run: &PipelineRun) -> Result<()> {
    let json = serde_json::to_string_pretty(run).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report: {}", path.display()))
}

/// Print the per-stage summary of a finished run
fn print_run(run: &PipelineRun) {
    println!();
    println!(
        "{} {}",
        "Run".bold(),
        run.label
            .clone()
            .unwrap_or_else(|| run.build_identifier.to_string())
            .bold()
    );
    println!("  ID:      {}", run.id.to_string().dimmed());
    println!("  Branch:  {}", run.parameters.branch.cyan());
    println!();

    for outcome in &run.stages {
        print_outcome(outcome);
    }

    println!();
    println!("  Status:  {}", colorize_status(run.status));

    if let Some(failed) = run.failed_stage() {
        println!("\n{}", format!("Diagnostics for '{}':", failed.name).bold());
        println!("{}", "─".repeat(80).dimmed());
        for entry in &failed.log {
            print_log_entry(entry);
        }
        if let Some(error) = &failed.error {
            println!("{}", error.red());
        }
        println!("{}", "─".repeat(80).dimmed());
    }
}

fn print_outcome(outcome: &StageOutcome) {
    let (marker, state) = match outcome.state {
        StageState::Succeeded => ("✓".green(), "succeeded".green()),
        StageState::Skipped => ("–".dimmed(), "skipped".dimmed()),
        StageState::Failed => ("✗".red(), "failed".red()),
    };

    println!(
        "  {} {:<28} {:<10} {}",
        marker,
        outcome.name,
        state,
        format!("{:.1}s", outcome.duration().num_milliseconds() as f64 / 1000.0).dimmed()
    );
}

/// Print a log entry
fn print_log_entry(log: &LogEntry) {
    let level_str = log.level.to_string();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}

/// Colorize run status for display
fn colorize_status(status: RunStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        RunStatus::Pending => status_str.dimmed(),
        RunStatus::Running => status_str.cyan(),
        RunStatus::Succeeded => status_str.green().bold(),
        RunStatus::Failed => status_str.red().bold(),
    }
}
