//! Data Transfer Objects
//!
//! Payloads exchanged between the runner and the pipeline service that
//! accepts downstream trigger requests.

pub mod trigger;
