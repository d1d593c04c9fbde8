//! Data Transfer Objects for the HTTP API.
//!
//! Engine and validation types already derive Serialize/Deserialize and are
//! re-exported; the types here only wrap them into request/response bodies.

use serde::{Deserialize, Serialize};

pub use crate::engine::{CommandOutcome, OptimizationResult, OverrideCommand, OverrideConfirmation};
pub use crate::services::{LogEntry, RunInput, RunOutput};
pub use crate::validation::{BatchValidation, RosterValidation};

use crate::config::DriveTimeProviderKind;
use crate::models::{Assignment, Job, Technician};
use crate::validation::{RawJobRecord, RawStaffRecord, StaffRoster};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Configured drive-time provider.
    pub drive_time_provider: DriveTimeProviderKind,
    pub drive_time_token_configured: bool,
}

/// Operator-entered window for a record whose import had none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTimeframe {
    /// Position of the record in `jobs`.
    pub index: usize,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateJobsRequest {
    pub jobs: Vec<RawJobRecord>,
    #[serde(default)]
    pub manual_timeframes: Vec<ManualTimeframe>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateStaffRequest {
    #[serde(default)]
    pub roster: StaffRoster,
    #[serde(default)]
    pub staff: Vec<RawStaffRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizeQuery {
    /// Run inline and return the result instead of a run id.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeAccepted {
    pub run_id: String,
    pub message: String,
}

/// Snapshot a manual command applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(default)]
    pub assignment: Assignment,
    pub jobs: Vec<Job>,
    pub staff: Vec<Technician>,
    pub command: OverrideCommand,
    #[serde(default)]
    pub confirmation: Option<OverrideConfirmation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusResponse {
    pub run_id: String,
    pub date: chrono::NaiveDate,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveTimeTokenRequest {
    /// New token; `null` or blank clears it.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveTimeTokenResponse {
    pub provider: DriveTimeProviderKind,
    pub configured: bool,
}
