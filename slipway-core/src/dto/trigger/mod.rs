//! Downstream trigger DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::run::RunParameters;

/// Request to start another pipeline by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPipeline {
    pub pipeline: String,
    pub parameters: BTreeMap<String, String>,
}

impl TriggerPipeline {
    /// Parameter set passed through to the downstream pipeline after an
    /// image has been published
    pub fn downstream(
        pipeline: impl Into<String>,
        run: &RunParameters,
        image: impl Into<String>,
    ) -> Self {
        let parameters = BTreeMap::from([
            ("repositoryUrl".to_string(), run.repository_url.clone()),
            ("branch".to_string(), run.branch.clone()),
            (
                "scannerProjectKey".to_string(),
                run.scanner_project_key.clone(),
            ),
            ("imageReference".to_string(), image.into()),
        ]);

        Self {
            pipeline: pipeline.into(),
            parameters,
        }
    }
}

/// Acknowledgement returned by the pipeline service
///
/// Only says the downstream run was queued; its result is never awaited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerAccepted {
    pub run_id: Uuid,
    pub pipeline: String,
    pub queued_at: chrono::DateTime<chrono::Utc>,
}
