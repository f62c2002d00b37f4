//! Slipway HTTP Client
//!
//! A small, type-safe HTTP client for the pipeline service that queues
//! downstream pipeline runs.
//!
//! # Example
//!
//! ```no_run
//! use slipway_client::PipelineClient;
//! use slipway_core::dto::trigger::TriggerPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PipelineClient::new("http://localhost:8080");
//!
//!     let accepted = client.trigger_pipeline(&TriggerPipeline {
//!         pipeline: "integration-tests".to_string(),
//!         parameters: Default::default(),
//!     }).await?;
//!
//!     println!("Queued run: {}", accepted.run_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod pipelines;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the pipeline service API
#[derive(Debug, Clone)]
pub struct PipelineClient {
    /// Base URL of the pipeline service (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl PipelineClient {
    /// Create a new pipeline client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the pipeline service API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new pipeline client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use slipway_client::PipelineClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = PipelineClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the pipeline service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the status code and deserialize a JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
