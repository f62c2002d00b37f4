//! Repository layer
//!
//! Repositories are stateless clients that abstract communication with the
//! pipeline service. They provide focused interfaces without any business
//! logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod pipelines;

// Re-export traits
pub use pipelines::PipelineRepository;

// Re-export implementations
pub use pipelines::HttpPipelineRepository;
