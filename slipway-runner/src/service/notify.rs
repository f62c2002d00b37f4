//! Failure notification

use slipway_core::domain::run::PipelineRun;
use tracing::error;

/// Sends a diagnostic notification about a failed run
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, run: &PipelineRun) -> anyhow::Result<()>;
}

/// Notifier that emits an error event through tracing
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, run: &PipelineRun) -> anyhow::Result<()> {
        let failed = run.failed_stage();
        let stage = failed.map(|s| s.name.as_str()).unwrap_or("unknown");
        let reason = failed
            .and_then(|s| s.error.as_deref())
            .unwrap_or("no diagnostic recorded");

        error!(
            run_id = %run.id,
            build = %run.build_identifier,
            "Pipeline run #{} failed at stage '{}': {}",
            run.run_number,
            stage,
            reason
        );
        Ok(())
    }
}
