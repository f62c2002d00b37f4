//! Stage outcome domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::log::LogEntry;

/// Terminal state of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    /// Guard evaluated false; the stage never entered `Running`
    Skipped,
    Succeeded,
    Failed,
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageState::Skipped => write!(f, "skipped"),
            StageState::Succeeded => write!(f, "succeeded"),
            StageState::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one stage in a run
///
/// Built by the engine once the stage reaches a terminal state and never
/// modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: StageState,
    /// Diagnostics captured while the stage ran (commands, tool output)
    pub log: Vec<LogEntry>,
    /// Error that failed the stage
    pub error: Option<String>,
}

impl StageOutcome {
    /// Outcome for a stage whose guard was false
    pub fn skipped(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            started_at: now,
            finished_at: now,
            state: StageState::Skipped,
            log: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(name: impl Into<String>, started_at: DateTime<Utc>, log: Vec<LogEntry>) -> Self {
        Self {
            name: name.into(),
            started_at,
            finished_at: Utc::now(),
            state: StageState::Succeeded,
            log,
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        log: Vec<LogEntry>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            started_at,
            finished_at: Utc::now(),
            state: StageState::Failed,
            log,
            error: Some(error.into()),
        }
    }

    /// Wall-clock duration between start and end markers
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Renders captured diagnostics as plain text, one line per entry
    pub fn diagnostics(&self) -> String {
        let mut lines: Vec<String> = self
            .log
            .iter()
            .map(|entry| format!("[{}] {}", entry.level, entry.message))
            .collect();

        if let Some(error) = &self.error {
            lines.push(format!("[ERROR] {}", error));
        }

        lines.join("\n")
    }
}
