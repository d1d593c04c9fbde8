//! Greedy weighted assignment of jobs to technicians.
//!
//! Jobs are taken tightest first. Each one goes to the feasible technician
//! (or pair) with the lowest cost, where cost mixes zone mismatch, drive
//! time added to the technician's current route, and the hours already on
//! that route. The route each technician accumulates is kept in a
//! window-feasible order, so later feasibility checks see the real day.
//! A pair is only feasible when both technicians can start the job at the
//! same minute; that minute is stored on the assignment entry.

use std::collections::BTreeMap;

use crate::capability::OverrideLedger;
use crate::config::CostWeights;
use crate::error::OptimizerResult;
use crate::feasibility::{slot_at, FeasibilityRow, Insertion, RoutingContext};
use crate::models::{
    AssignedTechs, Assignment, AssignmentEntry, CapabilityViolation, Job, JobId, SharedStarts,
    TechId, Technician, TimeOfDay, UnassignedJob, UnassignedReason,
};

/// Working state of a run: the assignment and each technician's current
/// stop order.
#[derive(Debug, Clone, Default)]
pub struct DayPlan<'a> {
    pub assignment: Assignment,
    pub routes: BTreeMap<TechId, Vec<&'a Job>>,
}

impl<'a> DayPlan<'a> {
    /// Places `job` on every technician in `techs`. `positions` gives the
    /// slot per technician; technicians without one get the job appended.
    pub fn place(
        &mut self,
        job: &'a Job,
        techs: AssignedTechs,
        overridden: Vec<TechId>,
        positions: &[(TechId, usize)],
    ) -> OptimizerResult<()> {
        self.assignment.assign(job, techs.clone(), overridden)?;
        for tech in techs.techs() {
            let route = self.routes.entry(tech.clone()).or_default();
            let position = positions
                .iter()
                .find(|(id, _)| id == tech)
                .map_or(route.len(), |(_, p)| (*p).min(route.len()));
            route.insert(position, job);
        }
        Ok(())
    }

    /// Takes the job off every technician holding it.
    pub fn remove(&mut self, job_id: &JobId) -> Option<AssignmentEntry> {
        let entry = self.assignment.unassign(job_id)?;
        for tech in entry.techs.techs() {
            if let Some(route) = self.routes.get_mut(tech) {
                route.retain(|j| &j.id != job_id);
                if route.is_empty() {
                    self.routes.remove(tech);
                }
            }
        }
        Some(entry)
    }

    pub fn route(&self, tech: &TechId) -> &[&'a Job] {
        self.routes.get(tech).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn load_hours(&self, tech: &TechId) -> f64 {
        self.route(tech).iter().map(|j| j.duration_hours).sum()
    }

    /// Replaces a technician's stop order. The jobs must be the same set.
    pub fn reorder(&mut self, tech: &TechId, order: Vec<&'a Job>) -> OptimizerResult<()> {
        self.assignment
            .set_order(tech, order.iter().map(|j| j.id.clone()).collect())?;
        if order.is_empty() {
            self.routes.remove(tech);
        } else {
            self.routes.insert(tech.clone(), order);
        }
        Ok(())
    }
}

/// Technicians chosen for one job, with the slot each takes.
struct Pick<'a> {
    seats: Vec<(&'a Technician, Insertion)>,
    shared_start: Option<TimeOfDay>,
}

#[derive(Debug, Clone, Default)]
pub struct GreedyOutcome {
    pub placed: Vec<JobId>,
    pub unassigned: Vec<UnassignedJob>,
    pub violations: Vec<CapabilityViolation>,
}

/// Tightest window first, then earliest window start, then id.
pub fn priority_order<'a>(jobs: &[&'a Job]) -> Vec<&'a Job> {
    let mut ordered = jobs.to_vec();
    ordered.sort_by(|a, b| {
        b.tightness()
            .total_cmp(&a.tightness())
            .then(a.window.start.cmp(&b.window.start))
            .then(a.id.cmp(&b.id))
    });
    ordered
}

pub struct GreedyAssigner<'c, 'a> {
    ctx: RoutingContext<'c>,
    weights: &'c CostWeights,
    pool: Vec<&'a Technician>,
}

impl<'c, 'a> GreedyAssigner<'c, 'a> {
    pub fn new(
        ctx: RoutingContext<'c>,
        weights: &'c CostWeights,
        pool: &[&'a Technician],
    ) -> Self {
        let mut pool = pool.to_vec();
        pool.sort_by(|a, b| a.id.cmp(&b.id));
        Self { ctx, weights, pool }
    }

    pub fn run(
        &self,
        jobs: &[&'a Job],
        plan: &mut DayPlan<'a>,
        ledger: &mut OverrideLedger,
    ) -> OptimizerResult<GreedyOutcome> {
        let mut outcome = GreedyOutcome::default();

        for job in priority_order(jobs) {
            let starts = plan.assignment.shared_starts();
            let row =
                FeasibilityRow::build(&self.ctx, job, &self.pool, &plan.routes, ledger, &starts);

            let choice = if job.requires_two_techs {
                self.best_pair(job, &row, plan, &starts)
            } else {
                self.best_single(&row, plan)
            };

            match choice {
                Some(picked) => {
                    let techs = match picked.seats.as_slice() {
                        [(a, _), (b, _)] => AssignedTechs::pair(a.id.clone(), b.id.clone()),
                        [(a, _)] => AssignedTechs::Single(a.id.clone()),
                        _ => continue,
                    };
                    let mut overridden = Vec::new();
                    let mut positions = Vec::new();
                    for (tech, insertion) in &picked.seats {
                        if insertion.overridden {
                            overridden.push(tech.id.clone());
                            ledger.record_approved(tech, job);
                        }
                        positions.push((tech.id.clone(), insertion.position));
                    }
                    log::debug!("Assigned job {} to {}", job.id, techs);
                    plan.place(job, techs, overridden, &positions)?;
                    if let Some(start) = picked.shared_start {
                        plan.assignment.set_shared_start(&job.id, start)?;
                    }
                    outcome.placed.push(job.id.clone());
                }
                None => {
                    let reason = row.reason(job.techs_required());
                    log::debug!("Job {} left unassigned: {}", job.id, reason);
                    if reason == UnassignedReason::NoCapableTechnician {
                        outcome.violations.extend(
                            row.violations()
                                .into_iter()
                                .filter(|v| self.tech(&v.tech_id).is_some_and(|t| t.available)),
                        );
                    }
                    outcome.unassigned.push(UnassignedJob {
                        job_id: job.id.clone(),
                        reason,
                        detail: self.describe(job, &row, reason),
                    });
                }
            }
        }

        Ok(outcome)
    }

    fn tech(&self, id: &TechId) -> Option<&'a Technician> {
        self.pool
            .binary_search_by(|t| t.id.cmp(id))
            .ok()
            .map(|i| self.pool[i])
    }

    fn cost(&self, plan: &DayPlan<'_>, tech: &TechId, insertion: &Insertion) -> f64 {
        let zone = if insertion.zone_mismatch { 1.0 } else { 0.0 };
        self.weights.zone_mismatch * zone
            + self.weights.drive_minutes * f64::from(insertion.added_drive_minutes)
            + self.weights.load_hours * plan.load_hours(tech)
    }

    fn best_single(&self, row: &FeasibilityRow, plan: &DayPlan<'_>) -> Option<Pick<'a>> {
        row.feasible()
            .filter_map(|(id, ins)| Some((self.tech(id)?, ins, self.cost(plan, id, ins))))
            .min_by(|a, b| a.2.total_cmp(&b.2).then(a.0.id.cmp(&b.0.id)))
            .map(|(tech, ins, _)| Pick {
                seats: vec![(tech, ins.clone())],
                shared_start: None,
            })
    }

    /// Cheapest pair of technicians who can both start the job at the later
    /// of their own earliest starts. Demo jobs get the configured bonus when
    /// both are demo crew.
    fn best_pair(
        &self,
        job: &Job,
        row: &FeasibilityRow,
        plan: &DayPlan<'_>,
        starts: &SharedStarts,
    ) -> Option<Pick<'a>> {
        let candidates: Vec<(&'a Technician, &Insertion)> = row
            .feasible()
            .filter_map(|(id, ins)| Some((self.tech(id)?, ins)))
            .collect();

        let mut best: Option<(f64, Pick<'a>)> = None;
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                let (a, ins_a) = candidates[i];
                let (b, ins_b) = candidates[j];
                let shared = ins_a.service_start.max(ins_b.service_start);
                let (Some(seat_a), Some(seat_b)) = (
                    self.seat(a, ins_a, job, shared, plan, starts),
                    self.seat(b, ins_b, job, shared, plan, starts),
                ) else {
                    continue;
                };

                let mut cost = self.cost(plan, &a.id, &seat_a) + self.cost(plan, &b.id, &seat_b);
                if job.job_type.is_demo() && a.demo_crew && b.demo_crew {
                    cost -= self.weights.demo_pair_bonus;
                }
                // Candidates come in id order, so the first pair found at a
                // given cost is also the smallest by id.
                if best.as_ref().map_or(true, |(c, _)| cost.total_cmp(c).is_lt()) {
                    let pick = Pick {
                        seats: vec![(a, seat_a), (b, seat_b)],
                        shared_start: Some(shared),
                    };
                    best = Some((cost, pick));
                }
            }
        }

        best.map(|(_, pick)| pick)
    }

    /// Re-slots a pair member with the job held at `shared`. Keeps the
    /// individual insertion when it already starts then.
    fn seat(
        &self,
        tech: &Technician,
        own: &Insertion,
        job: &Job,
        shared: TimeOfDay,
        plan: &DayPlan<'_>,
        starts: &SharedStarts,
    ) -> Option<Insertion> {
        if own.service_start == shared {
            return Some(own.clone());
        }
        let slot = slot_at(&self.ctx, tech, plan.route(&tech.id), job, shared, starts).ok()?;
        Some(Insertion {
            position: slot.position,
            added_drive_minutes: slot.added_drive_minutes,
            service_start: slot.service_start,
            ..own.clone()
        })
    }

    fn describe(&self, job: &Job, row: &FeasibilityRow, reason: UnassignedReason) -> String {
        let considered = row.cells.len();
        let feasible = row.feasible().count();
        match reason {
            UnassignedReason::NoCapableTechnician => match job.required_capability() {
                Some(cap) => format!(
                    "No technician in the pool of {} has {} capability for {} jobs",
                    considered,
                    cap.label(),
                    job.job_type.label()
                ),
                None => format!("No technician in the pool of {} can take this job", considered),
            },
            UnassignedReason::NoCompatiblePair => format!(
                "Job needs two technicians; {} of {} could take it",
                feasible, considered
            ),
            other => format!(
                "{} ({} technicians considered)",
                capitalize(&other.to_string()),
                considered
            ),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
