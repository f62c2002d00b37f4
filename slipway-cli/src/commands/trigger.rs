//! Trigger command handler
//!
//! Queues a run of another pipeline on the pipeline service, the same
//! request the trigger-downstream stage sends.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use slipway_client::PipelineClient;
use slipway_core::dto::trigger::TriggerPipeline;

use crate::config::Config;

/// Arguments of `slipway trigger`
#[derive(Args)]
pub struct TriggerArgs {
    /// Name of the pipeline to start
    pub pipeline: String,

    /// Parameters as key=value pairs (e.g., branch=main imageReference=acme/orders:1)
    #[arg(short, long, value_parser = parse_key_val)]
    pub param: Vec<(String, String)>,
}

/// Parse a single key-value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Handle the trigger command
///
/// # Arguments
/// * `args` - Pipeline name and parameters
/// * `config` - The CLI configuration
pub async fn handle_trigger_command(args: TriggerArgs, config: &Config) -> Result<()> {
    let client = PipelineClient::new(&config.pipeline_service_url);

    let req = TriggerPipeline {
        pipeline: args.pipeline,
        parameters: args.param.into_iter().collect(),
    };

    let accepted = client
        .trigger_pipeline(&req)
        .await
        .with_context(|| format!("Failed to trigger pipeline '{}'", req.pipeline))?;

    println!("{}", "✓ Pipeline run queued!".green().bold());
    println!("  Run ID:   {}", accepted.run_id.to_string().cyan());
    println!("  Pipeline: {}", accepted.pipeline.bold());
    println!(
        "  Queued:   {}",
        accepted.queued_at.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}
