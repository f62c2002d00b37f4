//! Stages command handler

use anyhow::Result;
use colored::*;
use slipway_runner::stages;

/// Print the standard stages in execution order
pub fn handle_stages_command() -> Result<()> {
    let stages = stages::standard();

    println!("{}", format!("{} stage(s), in order:", stages.len()).bold());
    for (idx, stage) in stages.iter().enumerate() {
        let note = if stage.guard().is_some() {
            "(skipped with --skip-tests)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {:>2}. {} {}", idx + 1, stage.name().cyan(), note);
    }

    Ok(())
}
