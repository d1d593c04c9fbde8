//! Per-technician route sequencing under hard time windows.
//!
//! Construction is nearest-neighbor from the technician's start point at
//! shift start. Jobs it cannot reach in time get a cheapest-insertion repair
//! attempt, and the caller's current order is kept as a fallback when it
//! places more jobs. A bounded 2-opt pass then shortens total drive time;
//! any reversal that breaks a window is rejected. Whatever still does not
//! fit is returned as a [`TimeWindowConflict`], so the sequenced stops plus
//! the conflicts always account for every input job.
//!
//! Two-tech jobs with a shared start stay at that minute through every
//! step; one that cannot be kept there is a conflict like any other.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, OptimizerError, OptimizerResult};
use crate::feasibility::{best_insertion, simulate, RoutingContext};
use crate::models::{
    Assignment, Job, JobId, Route, SharedStarts, Technician, TimeWindowConflict,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedRoute {
    pub route: Route,
    pub conflicts: Vec<TimeWindowConflict>,
}

/// Sequences `jobs` for `tech`. The slice order is taken as the current
/// order and used as a fallback candidate.
///
/// Every job must be on the technician's route in `assignment`; anything
/// else is a caller bug and fails without sequencing. Shared starts are
/// read from the assignment entries.
pub fn sequence_route(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    jobs: &[&Job],
    assignment: &Assignment,
) -> OptimizerResult<SequencedRoute> {
    let assigned: HashSet<&JobId> = assignment.jobs_for(&tech.id).iter().collect();
    let mut seen: HashSet<&JobId> = HashSet::new();

    for job in jobs {
        if !assigned.contains(&job.id) {
            return Err(OptimizerError::precondition(
                format!("job {} is not assigned to {}", job.id, tech.id),
                ErrorContext::new("sequence_route")
                    .with_entity("technician")
                    .with_entity_id(&tech.id)
                    .with_details(format!("job_id={}", job.id)),
            ));
        }
        if !seen.insert(&job.id) {
            return Err(OptimizerError::precondition(
                format!("job {} listed twice", job.id),
                ErrorContext::new("sequence_route")
                    .with_entity("technician")
                    .with_entity_id(&tech.id),
            ));
        }
    }

    Ok(sequence_jobs(ctx, tech, jobs, &assignment.shared_starts()))
}

fn sequence_jobs(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    jobs: &[&Job],
    starts: &SharedStarts,
) -> SequencedRoute {
    let (mut order, mut leftovers) = nearest_neighbor(ctx, tech, jobs, starts);
    repair(ctx, tech, &mut order, &mut leftovers, starts);

    let placed_fewer = !leftovers.is_empty() && order.len() < jobs.len();
    if placed_fewer && simulate(ctx, tech, jobs, starts).is_ok() {
        log::debug!(
            "Keeping current order for {}: construction placed {} of {} jobs",
            tech.id,
            order.len(),
            jobs.len()
        );
        order = jobs.to_vec();
        leftovers.clear();
    }

    let moves = two_opt(ctx, tech, &mut order, starts, ctx.routing.two_opt_max_iterations);
    if moves > 0 {
        log::debug!("2-opt applied {} improving moves for {}", moves, tech.id);
    }

    let route = match simulate(ctx, tech, &order, starts) {
        Ok(route) => route,
        // Every step above only keeps window-feasible orders.
        Err(_) => Route::empty(tech.id.clone(), ctx.shift_for(tech).start),
    };

    let conflicts = leftovers
        .into_iter()
        .map(|job| conflict_for(ctx, tech, &order, job, starts))
        .collect();

    SequencedRoute { route, conflicts }
}

/// Greedy construction: repeatedly drive to the closest job that can
/// still be reached inside its window. Ties go to the earlier window end,
/// then the lower id.
fn nearest_neighbor<'j>(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    jobs: &[&'j Job],
    starts: &SharedStarts,
) -> (Vec<&'j Job>, Vec<&'j Job>) {
    let mut remaining: Vec<&Job> = jobs.to_vec();
    remaining.sort_by(|a, b| a.id.cmp(&b.id));
    let mut order: Vec<&Job> = Vec::with_capacity(jobs.len());

    loop {
        let here = order.last().map_or_else(|| tech.start_location(), |j| j.location());

        let mut candidates: Vec<(u32, usize)> = Vec::new();
        for (i, job) in remaining.iter().enumerate() {
            let mut trial = order.clone();
            trial.push(job);
            if simulate(ctx, tech, &trial, starts).is_ok() {
                candidates.push((ctx.drive(&here, &job.location()), i));
            }
        }

        let Some(&(_, pick)) = candidates.iter().min_by(|(da, ia), (db, ib)| {
            da.cmp(db)
                .then(remaining[*ia].window.end.cmp(&remaining[*ib].window.end))
                .then(remaining[*ia].id.cmp(&remaining[*ib].id))
        }) else {
            break;
        };
        order.push(remaining.remove(pick));
    }

    (order, remaining)
}

/// Cheapest-insertion pass over jobs construction could not place, most
/// constrained first.
fn repair<'j>(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    order: &mut Vec<&'j Job>,
    leftovers: &mut Vec<&'j Job>,
    starts: &SharedStarts,
) {
    leftovers.sort_by(|a, b| a.window.start.cmp(&b.window.start).then(a.id.cmp(&b.id)));

    let mut still_left = Vec::new();
    for job in leftovers.drain(..) {
        match best_insertion(ctx, tech, order, job, starts) {
            Ok(slot) => order.insert(slot.position, job),
            Err(_) => still_left.push(job),
        }
    }
    *leftovers = still_left;
}

/// Segment-reversal improvement on total drive minutes. Only strictly
/// improving, window-feasible moves are taken; at most `budget` of them.
/// Returns the number of moves applied.
fn two_opt(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    order: &mut [&Job],
    starts: &SharedStarts,
    budget: u32,
) -> u32 {
    let Ok(route) = simulate(ctx, tech, order, starts) else {
        return 0;
    };
    let mut best = route.total_drive_minutes;
    let mut moves = 0;

    'search: while moves < budget {
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                order[i..=j].reverse();
                match simulate(ctx, tech, order, starts) {
                    Ok(candidate) if candidate.total_drive_minutes < best => {
                        best = candidate.total_drive_minutes;
                        moves += 1;
                        continue 'search;
                    }
                    _ => order[i..=j].reverse(),
                }
            }
        }
        break;
    }
    moves
}

fn conflict_for(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    order: &[&Job],
    job: &Job,
    starts: &SharedStarts,
) -> TimeWindowConflict {
    let mut trial = order.to_vec();
    trial.push(job);
    let earliest_arrival = simulate(ctx, tech, &trial, starts)
        .err()
        .map(|miss| miss.earliest_arrival);

    let detail = match (earliest_arrival, starts.get(&job.id)) {
        (Some(arrival), Some(shared)) => format!(
            "{} cannot meet the crew for job {} at {} (earliest arrival {})",
            tech.name, job.id, shared, arrival
        ),
        (Some(arrival), None) => format!(
            "{} cannot reach job {} before its window closes at {} (earliest arrival {})",
            tech.name, job.id, job.window.end, arrival
        ),
        (None, _) => format!(
            "{} has no window-feasible order that includes job {}",
            tech.name, job.id
        ),
    };

    TimeWindowConflict {
        tech_id: tech.id.clone(),
        job_id: job.id.clone(),
        window: job.window,
        earliest_arrival,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingSettings;
    use crate::drive_time::ZoneDistanceHeuristic;
    use crate::models::{AssignedTechs, JobType, TechId, TimeOfDay, TimeWindow, Zone};

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).unwrap()
    }

    fn job(id: &str, zone: &str, start: &str, end: &str, hours: f64) -> Job {
        Job {
            id: JobId::new(id),
            customer_name: "Acme".to_string(),
            address: "1 Main St".to_string(),
            zone: Zone::new(zone),
            job_type: JobType::Check,
            window: TimeWindow::new(t(start), t(end)).unwrap(),
            duration_hours: hours,
            requires_two_techs: false,
            status: Default::default(),
            assigned_tech: None,
            location: None,
            description: String::new(),
        }
    }

    fn assignment_for(tech: &Technician, jobs: &[&Job]) -> Assignment {
        let mut a = Assignment::new();
        for job in jobs {
            a.assign(job, AssignedTechs::Single(tech.id.clone()), vec![]).unwrap();
        }
        a
    }

    struct Fixture {
        heuristic: ZoneDistanceHeuristic,
        routing: RoutingSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                heuristic: ZoneDistanceHeuristic::default(),
                routing: RoutingSettings::default(),
            }
        }

        fn ctx(&self) -> RoutingContext<'_> {
            RoutingContext {
                provider: &self.heuristic,
                routing: &self.routing,
                default_shift: TimeWindow::new(self.routing.shift_start, self.routing.shift_end)
                    .unwrap(),
            }
        }
    }

    #[test]
    fn test_rejects_jobs_outside_assignment() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let a = job("A", "Zone 1", "08:00", "12:00", 1.0);
        let stray = job("X", "Zone 1", "08:00", "12:00", 1.0);
        let assignment = assignment_for(&tech, &[&a]);

        let err = sequence_route(&fx.ctx(), &tech, &[&a, &stray], &assignment).unwrap_err();
        assert!(matches!(err, OptimizerError::Precondition { .. }));
    }

    #[test]
    fn test_overlapping_windows_conflict() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let a = job("A", "Zone 1", "09:00", "09:30", 2.0);
        let b = job("B", "Zone 1", "09:00", "09:30", 2.0);
        let assignment = assignment_for(&tech, &[&a, &b]);

        let out = sequence_route(&fx.ctx(), &tech, &[&a, &b], &assignment).unwrap();
        assert_eq!(out.route.stops.len() + out.conflicts.len(), 2);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].job_id, JobId::new("B"));
        assert_eq!(out.conflicts[0].earliest_arrival, Some(t("11:25")));
        for stop in &out.route.stops {
            let job = if stop.job_id == a.id { &a } else { &b };
            assert!(job.window.contains(stop.service_start));
        }
    }

    #[test]
    fn test_nearest_neighbor_orders_by_distance() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let far = job("FAR", "Zone 4", "08:00", "17:00", 1.0);
        let near = job("NEAR", "Zone 1", "08:00", "17:00", 1.0);
        let mid = job("MID", "Zone 2", "08:00", "17:00", 1.0);
        let jobs = [&far, &near, &mid];
        let assignment = assignment_for(&tech, &jobs);

        let out = sequence_route(&fx.ctx(), &tech, &jobs, &assignment).unwrap();
        assert!(out.conflicts.is_empty());
        assert_eq!(
            out.route.job_ids(),
            vec![JobId::new("NEAR"), JobId::new("MID"), JobId::new("FAR")]
        );
    }

    #[test]
    fn test_windows_beat_distance() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let near_late = job("NEAR", "Zone 1", "13:00", "14:00", 1.0);
        let far_early = job("FAR", "Zone 3", "08:00", "08:30", 1.0);
        let jobs = [&near_late, &far_early];
        let assignment = assignment_for(&tech, &jobs);

        let out = sequence_route(&fx.ctx(), &tech, &jobs, &assignment).unwrap();
        assert!(out.conflicts.is_empty());
        assert_eq!(out.route.job_ids(), vec![JobId::new("FAR"), JobId::new("NEAR")]);
    }

    #[test]
    fn test_repair_recovers_job_skipped_by_construction() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        // Nearest-first goes to A (Zone 1) and then cannot make B's window;
        // inserting B first still leaves A reachable.
        let a = job("A", "Zone 1", "07:00", "16:00", 1.0);
        let b = job("B", "Zone 3", "07:30", "07:40", 1.0);
        let jobs = [&a, &b];
        let assignment = assignment_for(&tech, &jobs);

        let out = sequence_route(&fx.ctx(), &tech, &jobs, &assignment).unwrap();
        assert!(out.conflicts.is_empty(), "{:?}", out.conflicts);
        assert_eq!(out.route.job_ids(), vec![JobId::new("B"), JobId::new("A")]);
    }

    #[test]
    fn test_two_opt_respects_budget() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let jobs: Vec<Job> = (1..=5)
            .map(|i| job(&format!("J{i}"), &format!("Zone {}", 6 - i), "08:00", "18:00", 0.5))
            .collect();
        let refs: Vec<&Job> = jobs.iter().collect();
        let mut order = refs.clone();
        let moves = two_opt(&fx.ctx(), &tech, &mut order, &SharedStarts::new(), 1);
        assert!(moves <= 1);
    }

    #[test]
    fn test_shared_start_kept_through_sequencing() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let mut pair = job("P", "Zone 1", "08:00", "12:00", 1.0);
        pair.requires_two_techs = true;
        let solo = job("S", "Zone 1", "08:00", "17:00", 1.0);

        let mut assignment = Assignment::new();
        assignment
            .assign(&pair, AssignedTechs::pair(tech.id.clone(), TechId::new("T2")), vec![])
            .unwrap();
        assignment.assign(&solo, AssignedTechs::Single(tech.id.clone()), vec![]).unwrap();
        assignment.set_shared_start(&pair.id, t("10:15")).unwrap();

        let out = sequence_route(&fx.ctx(), &tech, &[&solo, &pair], &assignment).unwrap();
        assert!(out.conflicts.is_empty(), "{:?}", out.conflicts);
        let stop = out.route.stops.iter().find(|s| s.job_id == pair.id).unwrap();
        assert_eq!(stop.service_start, t("10:15"));
    }

    #[test]
    fn test_unreachable_shared_start_is_conflict() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let mut pair = job("P", "Zone 1", "08:00", "12:00", 1.0);
        pair.requires_two_techs = true;
        let long = job("L", "Zone 1", "08:00", "08:30", 4.0);

        let mut assignment = Assignment::new();
        assignment
            .assign(&pair, AssignedTechs::pair(tech.id.clone(), TechId::new("T2")), vec![])
            .unwrap();
        assignment.assign(&long, AssignedTechs::Single(tech.id.clone()), vec![]).unwrap();
        assignment.set_shared_start(&pair.id, t("09:00")).unwrap();

        let out = sequence_route(&fx.ctx(), &tech, &[&long, &pair], &assignment).unwrap();
        assert_eq!(out.route.stops.len() + out.conflicts.len(), 2);
        assert_eq!(out.conflicts.len(), 1);
        assert!(out.conflicts[0].detail.contains("09:00"));
    }

    #[test]
    fn test_empty_route() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let out = sequence_route(&fx.ctx(), &tech, &[], &Assignment::new()).unwrap();
        assert!(out.route.stops.is_empty());
        assert_eq!(out.route.departure, t("07:00"));
    }
}
