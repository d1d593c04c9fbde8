//! Manual dispatcher commands against an existing assignment.
//!
//! Each command touches exactly one job (both seats for a pair) and is
//! applied to a copy, so the caller's assignment is only replaced when the
//! whole command succeeds. Placing a technician who lacks the job's
//! capability stops with [`CommandOutcome::NeedsConfirmation`] until the
//! command is resent with a confirmation; the confirmed override is then
//! written to the audit list.

use serde::{Deserialize, Serialize};

use crate::capability::{self, OverrideLedger};
use crate::error::{ErrorContext, OptimizerError, OptimizerResult};
use crate::models::{
    AssignedTechs, Assignment, CapabilityOverrideRecord, CapabilityViolation, Job, JobId, TechId,
    Technician,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum OverrideCommand {
    /// Put an unassigned job on one technician or a pair.
    #[serde(rename_all = "camelCase")]
    Assign { job_id: JobId, techs: AssignedTechs },
    #[serde(rename_all = "camelCase")]
    Unassign { job_id: JobId },
    /// Replace whoever holds the job.
    #[serde(rename_all = "camelCase")]
    Reassign { job_id: JobId, techs: AssignedTechs },
    /// Hand one seat of the job from `from` to `to`.
    #[serde(rename_all = "camelCase")]
    Move { job_id: JobId, from: TechId, to: TechId },
}

impl OverrideCommand {
    pub fn job_id(&self) -> &JobId {
        match self {
            OverrideCommand::Assign { job_id, .. }
            | OverrideCommand::Unassign { job_id }
            | OverrideCommand::Reassign { job_id, .. }
            | OverrideCommand::Move { job_id, .. } => job_id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            OverrideCommand::Assign { .. } => "assign",
            OverrideCommand::Unassign { .. } => "unassign",
            OverrideCommand::Reassign { .. } => "reassign",
            OverrideCommand::Move { .. } => "move",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideConfirmation {
    pub approved_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub command: OverrideCommand,
    #[serde(default)]
    pub confirmation: Option<OverrideConfirmation>,
}

impl OverrideRequest {
    pub fn new(command: OverrideCommand) -> Self {
        Self {
            command,
            confirmation: None,
        }
    }

    pub fn confirmed(mut self, approved_by: impl Into<String>, reason: Option<String>) -> Self {
        self.confirmation = Some(OverrideConfirmation {
            approved_by: approved_by.into(),
            reason,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommandOutcome {
    #[serde(rename_all = "camelCase")]
    Applied {
        assignment: Assignment,
        overrides: Vec<CapabilityOverrideRecord>,
        warnings: Vec<String>,
    },
    /// Nothing changed; resend with a confirmation to proceed.
    #[serde(rename_all = "camelCase")]
    NeedsConfirmation { violations: Vec<CapabilityViolation> },
}

/// Applies one command to a copy of `assignment`.
///
/// Unknown job or technician ids are `NotFound`; commands that do not fit
/// the current state (assigning an assigned job, moving from a technician
/// who does not hold it, wrong pair arity) are `InvalidAssignment`.
pub fn apply_command(
    assignment: &Assignment,
    jobs: &[Job],
    staff: &[Technician],
    request: &OverrideRequest,
) -> OptimizerResult<CommandOutcome> {
    let command = &request.command;
    let ctx = || {
        ErrorContext::new(format!("override_{}", command.name()))
            .with_entity("job")
            .with_entity_id(command.job_id())
    };

    let job = jobs
        .iter()
        .find(|j| &j.id == command.job_id())
        .ok_or_else(|| {
            OptimizerError::not_found(format!("unknown job {}", command.job_id()), ctx())
        })?;
    let current = assignment.entry(&job.id).cloned();

    let target = match command {
        OverrideCommand::Assign { techs, .. } => {
            if current.is_some() {
                return Err(OptimizerError::invalid_assignment("job is already assigned", ctx()));
            }
            Some(techs.clone())
        }
        OverrideCommand::Unassign { .. } => {
            if current.is_none() {
                return Err(OptimizerError::invalid_assignment("job is not assigned", ctx()));
            }
            None
        }
        OverrideCommand::Reassign { techs, .. } => {
            if current.is_none() {
                return Err(OptimizerError::invalid_assignment("job is not assigned", ctx()));
            }
            Some(techs.clone())
        }
        OverrideCommand::Move { from, to, .. } => {
            let Some(entry) = &current else {
                return Err(OptimizerError::invalid_assignment("job is not assigned", ctx()));
            };
            if !entry.techs.contains(from) {
                return Err(OptimizerError::invalid_assignment(
                    format!("{} does not hold this job", from),
                    ctx(),
                ));
            }
            if entry.techs.contains(to) {
                return Err(OptimizerError::invalid_assignment(
                    format!("{} already holds this job", to),
                    ctx(),
                ));
            }
            Some(match &entry.techs {
                AssignedTechs::Single(_) => AssignedTechs::Single(to.clone()),
                AssignedTechs::Pair(a, b) => {
                    let stays = if a == from { b } else { a };
                    AssignedTechs::pair(stays.clone(), to.clone())
                }
            })
        }
    };

    let mut next = assignment.clone();
    let previous = next.unassign(&job.id);

    let Some(techs) = target else {
        log::info!("Override: job {} unassigned", job.id);
        return Ok(CommandOutcome::Applied {
            assignment: next,
            overrides: Vec::new(),
            warnings: Vec::new(),
        });
    };

    let mut incoming: Vec<&Technician> = Vec::new();
    let mut kept_overrides: Vec<TechId> = Vec::new();
    for id in techs.techs() {
        let tech = staff.iter().find(|t| &t.id == id).ok_or_else(|| {
            OptimizerError::not_found(format!("unknown technician {}", id), ctx())
        })?;
        match &previous {
            Some(entry) if entry.techs.contains(id) => {
                if entry.is_overridden_for(id) {
                    kept_overrides.push(id.clone());
                }
            }
            _ => incoming.push(tech),
        }
    }

    let violations: Vec<CapabilityViolation> = incoming
        .iter()
        .filter_map(|tech| capability::check(tech, job).err())
        .collect();

    let mut ledger = OverrideLedger::new();
    if !violations.is_empty() {
        let Some(confirmation) = &request.confirmation else {
            log::info!(
                "Override on job {} needs confirmation: {} capability violation(s)",
                job.id,
                violations.len()
            );
            return Ok(CommandOutcome::NeedsConfirmation { violations });
        };
        for violation in &violations {
            ledger.record(
                violation,
                &job.id,
                &confirmation.approved_by,
                confirmation.reason.clone(),
            );
            kept_overrides.push(violation.tech_id.clone());
        }
    }

    let warnings = incoming
        .iter()
        .filter(|t| !t.available)
        .map(|t| format!("{} is marked unavailable", t.name))
        .collect();

    log::info!("Override: job {} {} to {}", job.id, command.name(), techs);
    next.assign(job, techs, kept_overrides)?;

    Ok(CommandOutcome::Applied {
        assignment: next,
        overrides: ledger.into_records(),
        warnings,
    })
}
