//! Post-execution hooks
//!
//! Run once per run after the last stage: the "always" hook archives the
//! build identifier and labels the run, the failure hook notifies. Neither
//! can change the run's status; their own failures are logged and dropped.

use slipway_core::domain::run::{PipelineRun, RunStatus};
use std::fs;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::service::Notifier;

/// Artifact holding the run's build identifier
pub const ARTIFACT_FILE: &str = "build-identifier.txt";

/// Human-readable run label, `#<run-number> <build-identifier>`
pub fn run_label(run: &PipelineRun) -> String {
    format!("#{} {}", run.run_number, run.build_identifier)
}

pub struct PostExecutionHooks {
    artifact_dir: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl PostExecutionHooks {
    pub fn new(artifact_dir: PathBuf, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            artifact_dir,
            notifier,
        }
    }

    /// File the build identifier is archived to
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(ARTIFACT_FILE)
    }

    /// Archives the build identifier and labels the run
    pub fn always(&self, run: &mut PipelineRun) {
        match write_artifact(&self.artifact_dir, run.build_identifier.as_str()) {
            Ok(path) => info!("Archived build identifier to {}", path.display()),
            Err(e) => warn!(
                "Could not archive build identifier to {}: {}",
                self.artifact_dir.display(),
                e
            ),
        }

        let label = run_label(run);
        info!("Run {} labeled '{}'", run.id, label);
        run.label = Some(label);
    }

    /// Sends the failure notification; does nothing for other statuses
    pub fn on_failure(&self, run: &PipelineRun) {
        if run.status != RunStatus::Failed {
            return;
        }

        match catch_unwind(AssertUnwindSafe(|| self.notifier.notify_failure(run))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failure notification for run {} not sent: {:#}", run.id, e),
            Err(_) => warn!("Failure notifier panicked for run {}", run.id),
        }
    }
}

fn write_artifact(dir: &Path, build_identifier: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(ARTIFACT_FILE);
    fs::write(&path, build_identifier)?;
    Ok(path)
}
