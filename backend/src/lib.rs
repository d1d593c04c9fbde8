//! # Crew Dispatch Backend
//!
//! Job-to-technician assignment and route sequencing for field crews.
//!
//! Imported jobs and staff rosters arrive loosely typed. They are validated
//! into typed records, narrowed by an optional Storm Mode filter, matched
//! on capability, zone and time window, assigned greedily, and finally
//! sequenced into per-technician routes that respect every job's window.
//! Anything that cannot be placed is returned in an exceptions report,
//! never dropped.
//!
//! ## Architecture
//!
//! - [`validation`]: raw import records → typed [`models::Job`] / [`models::Technician`]
//! - [`capability`]: job-type → capability matching and override approvals
//! - [`storm`]: Storm Mode views over jobs and staff
//! - [`feasibility`]: technician × job feasibility and day simulation
//! - [`drive_time`]: drive-time providers with heuristic fallback
//! - [`engine`]: assignment, route sequencing, manual override commands
//! - [`services`]: run tracking and background optimization runs
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! The engine is a pure function of its inputs: the same jobs, staff,
//! filter, prior assignment and configuration always give the same
//! assignment.

// OptimizerError carries a rich ErrorContext for debugging.
#![allow(clippy::result_large_err)]

pub mod capability;
pub mod config;
pub mod drive_time;
pub mod engine;
pub mod error;
pub mod feasibility;
pub mod models;
pub mod services;
pub mod storm;
pub mod validation;

#[cfg(feature = "http-server")]
pub mod http;

pub use config::OptimizerConfig;
pub use engine::{optimize, OptimizationRequest, OptimizationResult};
pub use error::{OptimizerError, OptimizerResult};
