//! Configuration module
//!
//! Settings shared by every command. Pipeline behaviour itself is configured
//! through `slipway_runner::Config`.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the pipeline service that accepts trigger requests
    pub pipeline_service_url: String,
}
