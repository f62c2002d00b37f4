//! Slipway Core
//!
//! Core types shared by the Slipway build-and-deploy orchestrator.
//!
//! This crate contains:
//! - Domain types: runs, stage outcomes, build identifiers, log entries
//! - DTOs: payloads exchanged with the pipeline service

pub mod domain;
pub mod dto;
