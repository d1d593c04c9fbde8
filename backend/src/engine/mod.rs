//! One optimization pass over a scheduling day.
//!
//! [`optimize`] is a pure function of its request, the drive-time provider
//! and the configuration. It:
//!
//! 1. seeds locked work from the prior assignment and from jobs already
//!    marked assigned, releasing entries that name unknown technicians,
//!    have the wrong arity, or fail capability without an override;
//! 2. sequences the locked routes, taking off anything that cannot keep
//!    its window, and agrees a common start for each locked pair;
//! 3. assigns the remaining visible jobs greedily to the Storm-filtered
//!    pool;
//! 4. sequences every route once more and reports jobs that still do not
//!    fit as time conflicts.

mod assignment;
mod overrides;
mod sequencer;

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::capability::OverrideLedger;
use crate::config::OptimizerConfig;
use crate::drive_time::{DriveTimeResolution, DriveTimeSource};
use crate::error::{ErrorContext, OptimizerError, OptimizerResult};
use crate::feasibility::RoutingContext;
use crate::models::{
    AssignedTechs, Assignment, ExceptionReport, ExternalServiceDegradation, Job, JobId, JobStatus,
    OverrideApproval, Route, TechId, Technician, UnassignedJob, UnassignedReason,
};
use crate::storm::StormFilter;

pub use assignment::{priority_order, DayPlan, GreedyAssigner, GreedyOutcome};
pub use overrides::{
    apply_command, CommandOutcome, OverrideCommand, OverrideConfirmation, OverrideRequest,
};
pub use sequencer::{sequence_route, SequencedRoute};

/// Snapshot of everything one run looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub jobs: Vec<Job>,
    pub staff: Vec<Technician>,
    #[serde(default)]
    pub filter: StormFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_assignment: Option<Assignment>,
    #[serde(default)]
    pub approvals: Vec<OverrideApproval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub filter: StormFilter,
    /// SHA-256 of the request as JSON, hex encoded.
    pub input_fingerprint: String,
    pub total_jobs: usize,
    pub total_staff: usize,
    pub filtered_out_jobs: usize,
    pub filtered_out_staff: usize,
    pub locked_jobs: usize,
    pub assigned_jobs: usize,
    pub unassigned_jobs: usize,
    pub total_drive_minutes: u32,
    pub drive_time_source: DriveTimeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation: Option<ExternalServiceDegradation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub assignment: Assignment,
    pub routes: Vec<Route>,
    pub exceptions: ExceptionReport,
    pub metadata: RunMetadata,
}

/// Hex SHA-256 of the request's JSON form. Field order is fixed by the
/// types and maps are ordered, so equal requests hash equal.
pub fn input_fingerprint(request: &OptimizationRequest) -> OptimizerResult<String> {
    let canonical = serde_json::to_vec(request)
        .map_err(|e| OptimizerError::internal(format!("Failed to serialize request: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

pub fn optimize(
    request: &OptimizationRequest,
    drive_times: &DriveTimeResolution,
    config: &OptimizerConfig,
) -> OptimizerResult<OptimizationResult> {
    check_unique_ids(request)?;
    let input_fingerprint = input_fingerprint(request)?;

    let ctx = RoutingContext {
        provider: drive_times.provider.as_ref(),
        routing: &config.routing,
        default_shift: config.default_shift(),
    };
    let mut ledger = OverrideLedger::from_approvals(request.approvals.iter().cloned());
    let view = request.filter.apply(&request.jobs, &request.staff);

    let jobs: BTreeMap<&JobId, &Job> = request.jobs.iter().map(|j| (&j.id, j)).collect();
    let staff: BTreeMap<&TechId, &Technician> = request.staff.iter().map(|t| (&t.id, t)).collect();

    let mut exceptions = ExceptionReport::default();
    let mut warnings = Vec::new();
    let mut plan = DayPlan::default();

    log::info!(
        "Optimizing {} jobs / {} staff (filter: {}, drive times: {:?})",
        request.jobs.len(),
        request.staff.len(),
        request.filter,
        drive_times.provider.source()
    );

    seed_locked(request, &jobs, &staff, &mut ledger, &mut plan, &mut exceptions, &mut warnings);
    let (_, reopened) = settle(&ctx, &staff, &mut plan, &mut exceptions)?;
    let locked_jobs = plan.assignment.job_count();

    let visible: HashSet<&JobId> = view.jobs.iter().map(|j| &j.id).collect();
    for (job_id, detail) in reopened {
        if !visible.contains(&job_id) {
            exceptions.unassigned_jobs.push(UnassignedJob {
                job_id,
                reason: UnassignedReason::TimeConflict,
                detail,
            });
        }
    }

    let pool_jobs: Vec<&Job> = view
        .jobs
        .iter()
        .copied()
        .filter(|j| !plan.assignment.is_assigned(&j.id))
        .collect();

    let greedy = GreedyAssigner::new(ctx, &config.weights, &view.staff).run(
        &pool_jobs,
        &mut plan,
        &mut ledger,
    )?;
    exceptions.unassigned_jobs.extend(greedy.unassigned);
    exceptions.capability_violations.extend(greedy.violations);

    let (routes, dropped) = settle(&ctx, &staff, &mut plan, &mut exceptions)?;
    for (job_id, detail) in dropped {
        exceptions.unassigned_jobs.push(UnassignedJob {
            job_id,
            reason: UnassignedReason::TimeConflict,
            detail,
        });
    }
    exceptions.capability_overrides = ledger.into_records();

    let routes: Vec<Route> = routes.into_values().collect();
    let metadata = RunMetadata {
        date: request.date,
        filter: request.filter,
        input_fingerprint,
        total_jobs: request.jobs.len(),
        total_staff: request.staff.len(),
        filtered_out_jobs: view.filtered_out_jobs,
        filtered_out_staff: view.filtered_out_staff,
        locked_jobs,
        assigned_jobs: plan.assignment.job_count(),
        unassigned_jobs: exceptions.unassigned_jobs.len(),
        total_drive_minutes: routes.iter().map(|r| r.total_drive_minutes).sum(),
        drive_time_source: drive_times.provider.source(),
        degradation: drive_times.degradation.clone(),
        warnings,
    };

    log::info!(
        "Optimization finished: {} assigned, {} unassigned, {} drive minutes",
        metadata.assigned_jobs,
        metadata.unassigned_jobs,
        metadata.total_drive_minutes
    );

    Ok(OptimizationResult {
        assignment: plan.assignment,
        routes,
        exceptions,
        metadata,
    })
}

fn check_unique_ids(request: &OptimizationRequest) -> OptimizerResult<()> {
    let mut seen = HashSet::new();
    if let Some(job) = request.jobs.iter().find(|j| !seen.insert(&j.id)) {
        return Err(OptimizerError::precondition(
            "duplicate job id in request",
            ErrorContext::new("optimize").with_entity("job").with_entity_id(&job.id),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(tech) = request.staff.iter().find(|t| !seen.insert(&t.id)) {
        return Err(OptimizerError::precondition(
            "duplicate technician id in request",
            ErrorContext::new("optimize")
                .with_entity("technician")
                .with_entity_id(&tech.id),
        ));
    }
    Ok(())
}

/// Places already-decided work on the plan. Prior assignment entries win
/// over the `assignedTech` field of the same job.
fn seed_locked<'a>(
    request: &'a OptimizationRequest,
    jobs: &BTreeMap<&'a JobId, &'a Job>,
    staff: &BTreeMap<&'a TechId, &'a Technician>,
    ledger: &mut OverrideLedger,
    plan: &mut DayPlan<'a>,
    exceptions: &mut ExceptionReport,
    warnings: &mut Vec<String>,
) {
    let mut locked = BTreeMap::new();
    for job in &request.jobs {
        if let (JobStatus::Assigned, Some(techs)) = (job.status, &job.assigned_tech) {
            locked.insert(&job.id, (techs.clone(), Vec::new()));
        }
    }
    if let Some(prior) = &request.prior_assignment {
        for (job_id, entry) in prior.entries() {
            locked.insert(job_id, (entry.techs.clone(), entry.overridden_techs.clone()));
        }
    }

    for (job_id, (techs, mut overridden)) in locked {
        let Some(job) = jobs.get(job_id).copied() else {
            warnings.push(format!("Prior assignment names unknown job {}; ignored", job_id));
            continue;
        };

        let members: Vec<&Technician> = techs
            .techs()
            .into_iter()
            .filter_map(|id| staff.get(id).copied())
            .collect();
        if members.len() != techs.len() {
            warnings.push(format!(
                "Job {} released: {} is not on the roster",
                job_id, techs
            ));
            continue;
        }

        let mut blocked = false;
        for tech in members {
            if overridden.contains(&tech.id) {
                continue;
            }
            match ledger.admit(tech, job) {
                Ok(false) => {}
                Ok(true) => {
                    ledger.record_approved(tech, job);
                    overridden.push(tech.id.clone());
                }
                Err(violation) => {
                    exceptions.capability_violations.push(violation);
                    blocked = true;
                }
            }
        }
        if blocked {
            warnings.push(format!("Job {} released: capability mismatch without override", job_id));
            continue;
        }

        if let Err(e) = plan.place(job, techs, overridden, &[]) {
            warnings.push(format!("Job {} released: {}", job_id, e));
        }
    }
}

/// Sequences every route on the plan, removing jobs the sequencer cannot
/// fit until every route is window-feasible. A pair without a shared start
/// gets the later of its two service starts and the routes are sequenced
/// again. Returns the final routes and the removed jobs with the conflict
/// detail.
fn settle<'a>(
    ctx: &RoutingContext<'_>,
    staff: &BTreeMap<&TechId, &Technician>,
    plan: &mut DayPlan<'a>,
    exceptions: &mut ExceptionReport,
) -> OptimizerResult<(BTreeMap<TechId, Route>, Vec<(JobId, String)>)> {
    let mut dropped = Vec::new();

    loop {
        let mut routes = BTreeMap::new();
        let mut conflicts = Vec::new();
        let techs: Vec<TechId> = plan.routes.keys().cloned().collect();

        for tech_id in techs {
            let Some(tech) = staff.get(&tech_id).copied() else {
                return Err(OptimizerError::internal(format!(
                    "route for {} who is not in the request",
                    tech_id
                )));
            };
            let current = plan.route(&tech_id).to_vec();
            let sequenced = sequence_route(ctx, tech, &current, &plan.assignment)?;

            if sequenced.conflicts.is_empty() {
                let order = sequenced
                    .route
                    .stops
                    .iter()
                    .filter_map(|stop| current.iter().find(|j| j.id == stop.job_id).copied())
                    .collect();
                plan.reorder(&tech_id, order)?;
                routes.insert(tech_id, sequenced.route);
            } else {
                conflicts.extend(sequenced.conflicts);
            }
        }

        if conflicts.is_empty() {
            if !align_pairs(plan, &routes)? {
                return Ok((routes, dropped));
            }
            continue;
        }

        for conflict in conflicts {
            if plan.remove(&conflict.job_id).is_some() {
                log::warn!("Time window conflict: {}", conflict.detail);
                dropped.push((conflict.job_id.clone(), conflict.detail.clone()));
            }
            exceptions.time_window_violations.push(conflict);
        }
    }
}

/// Pins every unpinned pair to the later of its two service starts.
/// Returns whether any pair had to move, which means the routes need
/// sequencing again.
fn align_pairs(plan: &mut DayPlan<'_>, routes: &BTreeMap<TechId, Route>) -> OptimizerResult<bool> {
    let service_start = |tech: &TechId, job: &JobId| {
        routes
            .get(tech)
            .and_then(|route| route.stops.iter().find(|stop| &stop.job_id == job))
            .map(|stop| stop.service_start)
    };

    let unpinned: Vec<(JobId, TechId, TechId)> = plan
        .assignment
        .entries()
        .filter(|(_, entry)| entry.shared_start.is_none())
        .filter_map(|(id, entry)| match &entry.techs {
            AssignedTechs::Pair(a, b) => Some((id.clone(), a.clone(), b.clone())),
            AssignedTechs::Single(_) => None,
        })
        .collect();

    let mut moved = false;
    for (job_id, a, b) in unpinned {
        let (Some(start_a), Some(start_b)) =
            (service_start(&a, &job_id), service_start(&b, &job_id))
        else {
            continue;
        };
        if start_a != start_b {
            log::debug!(
                "Pair {} / {} on job {} meet at {}",
                a,
                b,
                job_id,
                start_a.max(start_b)
            );
            moved = true;
        }
        plan.assignment.set_shared_start(&job_id, start_a.max(start_b))?;
    }
    Ok(moved)
}
