//! Capability matching between technicians and job types.
//!
//! Unspecified capability flags resolve by staff type: regular technicians
//! are capable unless a flag says otherwise, Storm Mode roles are not
//! authorized unless a flag grants it. A failed match is never dropped
//! silently; it becomes a [`CapabilityViolation`] that an operator can
//! approve as an override.

use std::collections::BTreeMap;

use crate::models::{
    Capability, CapabilityGrant, CapabilityOverrideRecord, CapabilityViolation, Job, JobId,
    JobType, OverrideApproval, TechId, Technician,
};

/// Whether `tech` holds `capability` once unspecified flags are resolved.
pub fn resolves_to(tech: &Technician, capability: Capability) -> bool {
    match tech.capabilities.get(capability) {
        CapabilityGrant::Granted => true,
        CapabilityGrant::Denied => false,
        CapabilityGrant::Unspecified => !tech.staff_type.is_storm_role(),
    }
}

/// Case-insensitive job-type lookup. Unrecognized types require nothing,
/// the same as `Other`.
pub fn has_capability(tech: &Technician, job_type: &str) -> bool {
    let job_type = JobType::parse_lenient(job_type).unwrap_or(JobType::Other);
    supports(tech, job_type)
}

pub fn supports(tech: &Technician, job_type: JobType) -> bool {
    job_type
        .required_capability()
        .map_or(true, |capability| resolves_to(tech, capability))
}

/// Checks `tech` against a job type, producing the operator-facing
/// violation on failure.
pub fn check_job_type(
    tech: &Technician,
    job_type: JobType,
    job_id: Option<&JobId>,
) -> Result<(), CapabilityViolation> {
    match job_type.required_capability() {
        Some(required) if !resolves_to(tech, required) => Err(CapabilityViolation {
            tech_id: tech.id.clone(),
            tech_name: tech.name.clone(),
            staff_type: tech.staff_type,
            job_id: job_id.cloned(),
            job_type,
            required,
            required_label: required.label().to_string(),
        }),
        _ => Ok(()),
    }
}

pub fn check(tech: &Technician, job: &Job) -> Result<(), CapabilityViolation> {
    check_job_type(tech, job.job_type, Some(&job.id))
}

/// Operator approvals for specific technician/job pairs, and the audit
/// trail of assignments placed under them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideLedger {
    approvals: BTreeMap<(TechId, JobId), OverrideApproval>,
    records: Vec<CapabilityOverrideRecord>,
}

impl OverrideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_approvals(approvals: impl IntoIterator<Item = OverrideApproval>) -> Self {
        let mut ledger = Self::new();
        for approval in approvals {
            ledger.approve(approval);
        }
        ledger
    }

    /// Later approvals for the same pair replace earlier ones.
    pub fn approve(&mut self, approval: OverrideApproval) {
        self.approvals
            .insert((approval.tech_id.clone(), approval.job_id.clone()), approval);
    }

    pub fn approval(&self, tech: &TechId, job: &JobId) -> Option<&OverrideApproval> {
        self.approvals.get(&(tech.clone(), job.clone()))
    }

    pub fn is_approved(&self, tech: &TechId, job: &JobId) -> bool {
        self.approval(tech, job).is_some()
    }

    /// Admission check used by the feasibility filter and the engine: a
    /// capable technician passes, an incapable one passes only with an
    /// approval. `Ok(true)` means the pass relies on an override.
    pub fn admit(&self, tech: &Technician, job: &Job) -> Result<bool, CapabilityViolation> {
        match check(tech, job) {
            Ok(()) => Ok(false),
            Err(_) if self.is_approved(&tech.id, &job.id) => Ok(true),
            Err(violation) => Err(violation),
        }
    }

    /// Writes the audit entry for an assignment placed under an override.
    pub fn record(
        &mut self,
        violation: &CapabilityViolation,
        job_id: &JobId,
        approved_by: &str,
        reason: Option<String>,
    ) {
        log::info!(
            "Capability override: {} on job {} approved by {} (logged for review)",
            violation.tech_id,
            job_id,
            approved_by
        );
        self.records.push(CapabilityOverrideRecord {
            tech_id: violation.tech_id.clone(),
            job_id: job_id.clone(),
            job_type: violation.job_type,
            required_label: violation.required_label.clone(),
            approved_by: approved_by.to_string(),
            reason,
            logged_for_review: true,
        });
    }

    /// Audits an assignment admitted through a stored approval.
    pub fn record_approved(&mut self, tech: &Technician, job: &Job) {
        let Err(violation) = check(tech, job) else {
            return;
        };
        let (approved_by, reason) = match self.approval(&tech.id, &job.id) {
            Some(a) => (a.approved_by.clone(), a.reason.clone()),
            None => return,
        };
        self.record(&violation, &job.id, &approved_by, reason);
    }

    pub fn records(&self) -> &[CapabilityOverrideRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CapabilityOverrideRecord> {
        self.records
    }
}
