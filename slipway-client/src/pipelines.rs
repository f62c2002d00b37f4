//! Pipeline trigger endpoint

use crate::PipelineClient;
use crate::error::{ClientError, Result};
use reqwest::Url;
use slipway_core::dto::trigger::{TriggerAccepted, TriggerPipeline};
use tracing::debug;

impl PipelineClient {
    /// Queue a run of another pipeline
    ///
    /// Returns as soon as the service has accepted the request. The queued
    /// run's result is not part of the response.
    ///
    /// # Arguments
    /// * `req` - Pipeline name and the parameters to pass through
    pub async fn trigger_pipeline(&self, req: &TriggerPipeline) -> Result<TriggerAccepted> {
        if req.pipeline.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "pipeline name cannot be empty".to_string(),
            ));
        }

        let url = self.trigger_url(&req.pipeline)?;
        debug!("POST {} ({} parameters)", url, req.parameters.len());

        let response = self
            .client
            .post(url)
            .json(&req.parameters)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// `{base}/api/pipeline/{name}/trigger`, with the name as a single
    /// percent-encoded path segment
    fn trigger_url(&self, pipeline: &str) -> Result<Url> {
        let invalid =
            |reason: String| ClientError::InvalidRequest(format!("base URL '{}' {}", self.base_url, reason));

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["api", "pipeline", pipeline, "trigger"]);
        Ok(url)
    }
}
