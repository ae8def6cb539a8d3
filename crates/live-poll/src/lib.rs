//! Vote ingestion and results aggregation for live multiple-choice polls.
//!
//! The [`polls`] module holds the engine itself; [`config`], [`telemetry`] and
//! [`error`] carry the process-level plumbing shared with the API service.

pub mod config;
pub mod error;
pub mod polls;
pub mod telemetry;
