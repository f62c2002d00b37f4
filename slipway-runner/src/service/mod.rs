//! Service layer
//!
//! Services hold the runner's supporting logic around the stage loop:
//! buffering stage diagnostics, dispatching downstream triggers without
//! waiting on them, and notifying about failed runs.
//!
//! All services are trait-based or hold trait objects to enable testing.

mod dispatch;
mod log_buffer;
mod notify;

// Re-export traits
pub use log_buffer::LogBufferService;
pub use notify::Notifier;

// Re-export implementations
pub use dispatch::Dispatcher;
pub use log_buffer::InMemoryLogBuffer;
pub use notify::LogNotifier;
