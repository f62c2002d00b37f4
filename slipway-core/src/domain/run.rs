//! Pipeline run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::identifier::BuildIdentifier;
use crate::domain::stage::{StageOutcome, StageState};

/// Invocation parameters, all required at run start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParameters {
    pub repository_url: String,
    pub branch: String,
    pub scanner_project_key: String,
    pub skip_tests: bool,
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One execution instance of the pipeline
///
/// Only the engine mutates a run. Once the status leaves `Running` the run is
/// terminal: further outcomes and status changes are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub parameters: RunParameters,
    pub run_number: u64,
    pub build_identifier: BuildIdentifier,
    pub status: RunStatus,
    pub stages: Vec<StageOutcome>,
    /// Human-readable label attached by the post-execution hooks
    pub label: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(parameters: RunParameters, run_number: u64, build_identifier: BuildIdentifier) -> Self {
        Self {
            id: Uuid::new_v4(),
            parameters,
            run_number,
            build_identifier,
            status: RunStatus::Pending,
            stages: Vec::new(),
            label: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Moves a pending run to `Running`
    pub fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Appends a stage outcome to the log of a running run
    pub fn record(&mut self, outcome: StageOutcome) {
        if self.status == RunStatus::Running {
            self.stages.push(outcome);
        }
    }

    /// Moves a running run to its terminal status
    pub fn finish(&mut self, status: RunStatus) {
        if self.status == RunStatus::Running && status.is_terminal() {
            self.status = status;
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn outcome(&self, stage: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|outcome| outcome.name == stage)
    }

    /// The stage that failed the run, if any
    pub fn failed_stage(&self) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|outcome| outcome.state == StageState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn run() -> PipelineRun {
        let params = RunParameters {
            repository_url: "https://git.example.com/orders.git".to_string(),
            branch: "main".to_string(),
            scanner_project_key: "orders".to_string(),
            skip_tests: false,
        };
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        PipelineRun::new(params, 42, BuildIdentifier::new(date, 42))
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = run();
        assert_eq!(run.status, RunStatus::Pending);

        run.start();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.started_at.is_some());

        run.record(StageOutcome::skipped("test"));
        run.finish(RunStatus::Succeeded);
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(run.completed_at.is_some());
        assert_eq!(run.stages.len(), 1);
    }

    #[test]
    fn test_terminal_run_is_frozen() {
        let mut run = run();
        run.start();
        run.finish(RunStatus::Failed);

        run.finish(RunStatus::Succeeded);
        run.record(StageOutcome::skipped("late"));

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.stages.is_empty());
    }

    #[test]
    fn test_finish_requires_terminal_status() {
        let mut run = run();
        run.start();
        run.finish(RunStatus::Pending);
        assert_eq!(run.status, RunStatus::Running);
    }

    #[test]
    fn test_failed_stage_lookup() {
        let mut run = run();
        run.start();
        run.record(StageOutcome::succeeded("build", Utc::now(), vec![]));
        run.record(StageOutcome::failed("scan", Utc::now(), vec![], "exit code 2"));

        assert_eq!(run.failed_stage().map(|o| o.name.as_str()), Some("scan"));
        assert!(run.outcome("build").is_some());
        assert!(run.outcome("deploy").is_none());
    }

    #[test]
    fn test_parameters_use_camel_case() {
        let json = serde_json::to_value(&run().parameters).unwrap();
        assert_eq!(json["repositoryUrl"], "https://git.example.com/orders.git");
        assert_eq!(json["skipTests"], false);
    }
}
