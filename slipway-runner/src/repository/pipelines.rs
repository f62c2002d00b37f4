//! Pipelines repository
//!
//! Queues runs of other pipelines on the pipeline service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use slipway_client::PipelineClient;
use slipway_core::dto::trigger::{TriggerAccepted, TriggerPipeline};
use std::sync::Arc;

/// Repository trait for starting downstream pipelines
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Queues a run of the named pipeline
    ///
    /// Resolves once the service has accepted the request, not when the
    /// downstream run finishes.
    async fn trigger(&self, req: TriggerPipeline) -> Result<TriggerAccepted>;
}

/// HTTP implementation of PipelineRepository
pub struct HttpPipelineRepository {
    client: Arc<PipelineClient>,
}

impl HttpPipelineRepository {
    /// Creates a new HTTP pipeline repository
    ///
    /// # Arguments
    /// * `client` - Client for the pipeline service
    pub fn new(client: Arc<PipelineClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PipelineRepository for HttpPipelineRepository {
    async fn trigger(&self, req: TriggerPipeline) -> Result<TriggerAccepted> {
        self.client
            .trigger_pipeline(&req)
            .await
            .with_context(|| format!("Failed to trigger pipeline '{}'", req.pipeline))
    }
}
