//! Slipway CLI
//!
//! Runs the build-test-package-deploy pipeline and talks to the pipeline
//! service that queues downstream runs.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "slipway")]
#[command(about = "Build, test, package and deploy pipeline runner", long_about = None)]
struct Cli {
    /// Pipeline service URL
    #[arg(
        long,
        env = "SLIPWAY_PIPELINE_SERVICE_URL",
        default_value = "http://localhost:8080"
    )]
    pipeline_service_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slipway=info,slipway_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        pipeline_service_url: cli.pipeline_service_url,
    };

    handle_command(cli.command, &config).await
}
