//! Technician → ordered job list, plus the derived per-technician routes.
//!
//! Every mutation on [`Assignment`] is all-or-nothing: a two-tech job is
//! added to or removed from both technicians in the same call, so a pair can
//! never be observed half-assigned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::job::{AssignedTechs, Job, JobId};
use super::staff::TechId;
use super::time::TimeOfDay;
use crate::error::{ErrorContext, OptimizerError, OptimizerResult};

/// Agreed service start per two-tech job. Both technicians begin the job
/// at this minute.
pub type SharedStarts = BTreeMap<JobId, TimeOfDay>;

/// Who holds a job and which of those technicians were placed under an
/// operator-approved capability override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEntry {
    pub techs: AssignedTechs,
    #[serde(default)]
    pub overridden_techs: Vec<TechId>,
    /// Service start both members of a pair are held to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_start: Option<TimeOfDay>,
}

impl AssignmentEntry {
    pub fn is_overridden(&self) -> bool {
        !self.overridden_techs.is_empty()
    }

    pub fn is_overridden_for(&self, tech: &TechId) -> bool {
        self.overridden_techs.contains(tech)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Technician → job ids in route order.
    routes: BTreeMap<TechId, Vec<JobId>>,
    entries: BTreeMap<JobId, AssignmentEntry>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `job` on `techs`, appending to the end of each route.
    ///
    /// Fails without mutating when the arity does not match the job, the pair
    /// repeats a technician, or the job is already assigned.
    pub fn assign(
        &mut self,
        job: &Job,
        techs: AssignedTechs,
        overridden_techs: Vec<TechId>,
    ) -> OptimizerResult<()> {
        let ctx = || ErrorContext::new("assign").with_entity("job").with_entity_id(&job.id);

        if techs.len() != job.techs_required() {
            return Err(OptimizerError::invalid_assignment(
                format!(
                    "job needs {} technician(s), got {}",
                    job.techs_required(),
                    techs.len()
                ),
                ctx(),
            ));
        }
        if let AssignedTechs::Pair(a, b) = &techs {
            if a == b {
                return Err(OptimizerError::invalid_assignment(
                    format!("technician {} cannot fill both seats", a),
                    ctx(),
                ));
            }
        }
        if self.entries.contains_key(&job.id) {
            return Err(OptimizerError::invalid_assignment("job is already assigned", ctx()));
        }
        if let Some(stray) = overridden_techs.iter().find(|t| !techs.contains(t)) {
            return Err(OptimizerError::invalid_assignment(
                format!("override recorded for {} who is not on the job", stray),
                ctx(),
            ));
        }

        for tech in techs.techs() {
            self.routes.entry(tech.clone()).or_default().push(job.id.clone());
        }
        self.entries.insert(
            job.id.clone(),
            AssignmentEntry {
                techs,
                overridden_techs,
                shared_start: None,
            },
        );
        Ok(())
    }

    /// Removes the job from every technician holding it.
    pub fn unassign(&mut self, job_id: &JobId) -> Option<AssignmentEntry> {
        let entry = self.entries.remove(job_id)?;
        for tech in entry.techs.techs() {
            if let Some(route) = self.routes.get_mut(tech) {
                route.retain(|j| j != job_id);
                if route.is_empty() {
                    self.routes.remove(tech);
                }
            }
        }
        Some(entry)
    }

    /// Replaces a technician's route order. `order` must be a permutation of
    /// the jobs currently on that route.
    pub fn set_order(&mut self, tech: &TechId, order: Vec<JobId>) -> OptimizerResult<()> {
        let current = self.jobs_for(tech);
        let mut a: Vec<&JobId> = current.iter().collect();
        let mut b: Vec<&JobId> = order.iter().collect();
        a.sort();
        b.sort();
        if a != b {
            return Err(OptimizerError::precondition(
                "new order is not a permutation of the assigned jobs",
                ErrorContext::new("set_order")
                    .with_entity("technician")
                    .with_entity_id(tech),
            ));
        }
        if !order.is_empty() {
            self.routes.insert(tech.clone(), order);
        }
        Ok(())
    }

    /// Fixes the common service start of a two-tech job.
    pub fn set_shared_start(&mut self, job_id: &JobId, start: TimeOfDay) -> OptimizerResult<()> {
        let ctx = || {
            ErrorContext::new("set_shared_start")
                .with_entity("job")
                .with_entity_id(job_id)
        };
        let entry = self
            .entries
            .get_mut(job_id)
            .ok_or_else(|| OptimizerError::precondition("job is not assigned", ctx()))?;
        if !matches!(entry.techs, AssignedTechs::Pair(..)) {
            return Err(OptimizerError::precondition(
                "only two-tech jobs share a start",
                ctx(),
            ));
        }
        entry.shared_start = Some(start);
        Ok(())
    }

    pub fn shared_starts(&self) -> SharedStarts {
        self.entries
            .iter()
            .filter_map(|(id, entry)| entry.shared_start.map(|start| (id.clone(), start)))
            .collect()
    }

    pub fn entry(&self, job_id: &JobId) -> Option<&AssignmentEntry> {
        self.entries.get(job_id)
    }

    pub fn is_assigned(&self, job_id: &JobId) -> bool {
        self.entries.contains_key(job_id)
    }

    pub fn jobs_for(&self, tech: &TechId) -> &[JobId] {
        self.routes.get(tech).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn technicians(&self) -> impl Iterator<Item = &TechId> {
        self.routes.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&JobId, &AssignmentEntry)> {
        self.entries.iter()
    }

    pub fn routes(&self) -> &BTreeMap<TechId, Vec<JobId>> {
        &self.routes
    }

    pub fn job_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One stop on a sequenced route. Times are minutes since midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub job_id: JobId,
    pub drive_minutes: u32,
    pub arrival: TimeOfDay,
    pub wait_minutes: u32,
    pub service_start: TimeOfDay,
    pub service_end: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub tech_id: TechId,
    pub departure: TimeOfDay,
    pub stops: Vec<RouteStop>,
    pub total_drive_minutes: u32,
    pub total_service_minutes: u32,
    pub finish: TimeOfDay,
}

impl Route {
    pub fn empty(tech_id: TechId, departure: TimeOfDay) -> Self {
        Self {
            tech_id,
            departure,
            stops: Vec::new(),
            total_drive_minutes: 0,
            total_service_minutes: 0,
            finish: departure,
        }
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.stops.iter().map(|s| s.job_id.clone()).collect()
    }
}
