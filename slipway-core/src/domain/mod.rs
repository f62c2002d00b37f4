//! Core domain types
//!
//! The structures in this module describe one pipeline run and what it
//! produced. They are created and mutated by the runner's engine and shared
//! with the CLI for reporting.

pub mod identifier;
pub mod log;
pub mod run;
pub mod stage;
