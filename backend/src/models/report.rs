//! Exceptions report returned alongside every assignment.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{JobId, JobType};
use super::staff::{Capability, StaffType, TechId};
use super::time::{TimeOfDay, TimeWindow};

/// Why the engine left a job without technicians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnassignedReason {
    NoCapableTechnician,
    NoAvailableTechnician,
    NoZoneMatch,
    TimeConflict,
    NoCompatiblePair,
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnassignedReason::NoCapableTechnician => "no capable technician",
            UnassignedReason::NoAvailableTechnician => "no available technician",
            UnassignedReason::NoZoneMatch => "no zone match",
            UnassignedReason::TimeConflict => "time conflict",
            UnassignedReason::NoCompatiblePair => "no compatible technician pair",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedJob {
    pub job_id: JobId,
    pub reason: UnassignedReason,
    pub detail: String,
}

/// Raised when a technician lacks the capability a job type needs. The
/// assignment only proceeds if an operator confirms an override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityViolation {
    pub tech_id: TechId,
    pub tech_name: String,
    pub staff_type: StaffType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub job_type: JobType,
    pub required: Capability,
    pub required_label: String,
}

impl CapabilityViolation {
    pub fn message(&self) -> String {
        format!(
            "{} ({}) does not have {} capability required for {} jobs",
            self.tech_name, self.staff_type, self.required_label, self.job_type
        )
    }
}

/// Operator sign-off letting a specific technician take a specific job
/// despite a capability violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideApproval {
    pub tech_id: TechId,
    pub job_id: JobId,
    pub approved_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Audit entry for an assignment placed under an override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityOverrideRecord {
    pub tech_id: TechId,
    pub job_id: JobId,
    pub job_type: JobType,
    pub required_label: String,
    pub approved_by: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub logged_for_review: bool,
}

/// The sequencer could not fit a job into a technician's day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowConflict {
    pub tech_id: TechId,
    pub job_id: JobId,
    pub window: TimeWindow,
    /// Earliest arrival the technician could manage given the rest of the
    /// route, when one could be computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_arrival: Option<TimeOfDay>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DegradationReason {
    NotConfigured,
    Unauthorized,
    Unavailable,
    TooManyLocations,
    FeatureDisabled,
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DegradationReason::NotConfigured => "no drive-time token configured",
            DegradationReason::Unauthorized => "drive-time service rejected the token",
            DegradationReason::Unavailable => "drive-time service unavailable",
            DegradationReason::TooManyLocations => "too many locations for one matrix request",
            DegradationReason::FeatureDisabled => "drive-time client not compiled in",
        };
        f.write_str(text)
    }
}

/// Drive times fell back to the zone-distance heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceDegradation {
    pub provider: String,
    pub reason: DegradationReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionReport {
    pub unassigned_jobs: Vec<UnassignedJob>,
    pub capability_overrides: Vec<CapabilityOverrideRecord>,
    pub capability_violations: Vec<CapabilityViolation>,
    pub time_window_violations: Vec<TimeWindowConflict>,
}

impl ExceptionReport {
    pub fn is_clean(&self) -> bool {
        self.unassigned_jobs.is_empty()
            && self.capability_violations.is_empty()
            && self.time_window_violations.is_empty()
    }

    pub fn unassigned_reason(&self, job_id: &JobId) -> Option<UnassignedReason> {
        self.unassigned_jobs
            .iter()
            .find(|u| &u.job_id == job_id)
            .map(|u| u.reason)
    }
}
