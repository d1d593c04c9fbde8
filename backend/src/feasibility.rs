//! Zone / time-window feasibility of technician × job pairs.
//!
//! A pair is feasible when the technician can do the job type (or holds an
//! approved override), is available, is in zone if the zone policy demands
//! it, and the job can be slotted into the technician's current day with
//! every arrival inside its window and inside the shift.
//!
//! The day itself is simulated by [`simulate`], which the route sequencer
//! also uses, so both agree on what "fits" means. Two-tech jobs carry a
//! shared start once placed; the simulation holds such a stop to exactly
//! that minute on both routes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capability::OverrideLedger;
use crate::config::{RoutingSettings, ZonePolicy};
use crate::drive_time::DriveTimeProvider;
use crate::models::{
    CapabilityViolation, Job, Location, Route, RouteStop, SharedStarts, TechId, Technician,
    TimeOfDay, TimeWindow, UnassignedReason,
};

/// Everything the timeline simulation needs besides the jobs themselves.
#[derive(Clone, Copy)]
pub struct RoutingContext<'a> {
    pub provider: &'a dyn DriveTimeProvider,
    pub routing: &'a RoutingSettings,
    pub default_shift: TimeWindow,
}

impl<'a> RoutingContext<'a> {
    pub fn shift_for(&self, tech: &Technician) -> TimeWindow {
        tech.shift.unwrap_or(self.default_shift)
    }

    pub fn drive(&self, from: &Location, to: &Location) -> u32 {
        self.provider.minutes_between(from, to)
    }
}

/// First stop in a simulated order whose window (or the shift) closed
/// before the technician could get there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMiss {
    pub index: usize,
    pub earliest_arrival: TimeOfDay,
}

/// Drives `jobs` in the given order, starting from the technician's start
/// point at shift start. Travel buffer applies between jobs, not on the
/// first leg. Arriving early means waiting for the window to open, or for
/// the job's entry in `starts` when it has one.
pub fn simulate(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    jobs: &[&Job],
    starts: &SharedStarts,
) -> Result<Route, WindowMiss> {
    let shift = ctx.shift_for(tech);
    let mut route = Route::empty(tech.id.clone(), shift.start);
    let mut here = tech.start_location();
    let mut clock = shift.start;

    for (index, job) in jobs.iter().enumerate() {
        let there = job.location();
        let drive = ctx.drive(&here, &there);
        let buffer = if index == 0 { 0 } else { ctx.routing.travel_buffer_minutes };
        let arrival = clock.plus_minutes(drive + buffer);
        let mut service_start = arrival.max(job.window.start).max(shift.start);
        let miss = WindowMiss {
            index,
            earliest_arrival: arrival,
        };

        if let Some(&agreed) = starts.get(&job.id) {
            if agreed < service_start {
                return Err(miss);
            }
            service_start = agreed;
        }
        if service_start > job.window.end || service_start > shift.end {
            return Err(miss);
        }

        let service_end = service_start.plus_minutes(job.duration_minutes());
        route.stops.push(RouteStop {
            job_id: job.id.clone(),
            drive_minutes: drive,
            arrival,
            wait_minutes: service_start.minutes() - arrival.minutes(),
            service_start,
            service_end,
        });
        route.total_drive_minutes += drive;
        route.total_service_minutes += job.duration_minutes();
        clock = service_end;
        here = there;
    }

    route.finish = clock;
    Ok(route)
}

/// Why a technician cannot take a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Infeasibility {
    Incapable { violation: CapabilityViolation },
    Unavailable,
    OutOfZone,
    NoTimeSlot {
        #[serde(skip_serializing_if = "Option::is_none")]
        earliest_arrival: Option<TimeOfDay>,
    },
}

/// Where a job lands in a route and when its service would begin there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub position: usize,
    pub added_drive_minutes: u32,
    pub service_start: TimeOfDay,
}

/// Cheapest feasible place for a job in a technician's current route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insertion {
    pub position: usize,
    pub added_drive_minutes: u32,
    pub service_start: TimeOfDay,
    pub zone_mismatch: bool,
    /// Relies on an approved capability override.
    pub overridden: bool,
}

pub type Cell = Result<Insertion, Infeasibility>;

/// Capability, availability and zone checks. Returns whether the pass
/// relies on an override.
pub fn static_check(
    tech: &Technician,
    job: &Job,
    ledger: &OverrideLedger,
    zone_policy: ZonePolicy,
) -> Result<bool, Infeasibility> {
    let overridden = ledger
        .admit(tech, job)
        .map_err(|violation| Infeasibility::Incapable { violation })?;
    if !tech.available {
        return Err(Infeasibility::Unavailable);
    }
    if zone_policy == ZonePolicy::Require && !tech.zone.matches(&job.zone) {
        return Err(Infeasibility::OutOfZone);
    }
    Ok(overridden)
}

/// Tries every position in `route` and keeps the feasible one adding the
/// least drive time; the earliest position wins ties.
pub fn best_insertion(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    route: &[&Job],
    job: &Job,
    starts: &SharedStarts,
) -> Result<Slot, Infeasibility> {
    let start = tech.start_location();
    let mut best: Option<Slot> = None;
    let mut earliest: Option<TimeOfDay> = None;

    for position in 0..=route.len() {
        let mut order: Vec<&Job> = Vec::with_capacity(route.len() + 1);
        order.extend_from_slice(&route[..position]);
        order.push(job);
        order.extend_from_slice(&route[position..]);

        match simulate(ctx, tech, &order, starts) {
            Ok(simulated) => {
                let prev = if position == 0 {
                    start.clone()
                } else {
                    route[position - 1].location()
                };
                let here = job.location();
                let mut added = ctx.drive(&prev, &here);
                if let Some(next) = route.get(position) {
                    let next = next.location();
                    added = (added + ctx.drive(&here, &next))
                        .saturating_sub(ctx.drive(&prev, &next));
                }
                if best.map_or(true, |b| added < b.added_drive_minutes) {
                    best = Some(Slot {
                        position,
                        added_drive_minutes: added,
                        service_start: simulated.stops[position].service_start,
                    });
                }
            }
            Err(miss) if miss.index == position => {
                let arrival = miss.earliest_arrival;
                earliest = Some(earliest.map_or(arrival, |e| e.min(arrival)));
            }
            Err(_) => {}
        }
    }

    best.ok_or(Infeasibility::NoTimeSlot {
        earliest_arrival: earliest,
    })
}

/// [`best_insertion`] with the job's own service start pinned to `at`.
/// Used to seat the second technician of a pair at the first one's time.
pub fn slot_at(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    route: &[&Job],
    job: &Job,
    at: TimeOfDay,
    starts: &SharedStarts,
) -> Result<Slot, Infeasibility> {
    let mut pinned = starts.clone();
    pinned.insert(job.id.clone(), at);
    best_insertion(ctx, tech, route, job, &pinned)
}

pub fn evaluate(
    ctx: &RoutingContext<'_>,
    tech: &Technician,
    route: &[&Job],
    job: &Job,
    ledger: &OverrideLedger,
    starts: &SharedStarts,
) -> Cell {
    let overridden = static_check(tech, job, ledger, ctx.routing.zone_policy)?;
    let slot = best_insertion(ctx, tech, route, job, starts)?;
    Ok(Insertion {
        position: slot.position,
        added_drive_minutes: slot.added_drive_minutes,
        service_start: slot.service_start,
        zone_mismatch: !tech.zone.matches(&job.zone),
        overridden,
    })
}

/// Feasibility of one job against every technician in the pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityRow {
    pub cells: BTreeMap<TechId, Cell>,
}

impl FeasibilityRow {
    pub fn build(
        ctx: &RoutingContext<'_>,
        job: &Job,
        techs: &[&Technician],
        routes: &BTreeMap<TechId, Vec<&Job>>,
        ledger: &OverrideLedger,
        starts: &SharedStarts,
    ) -> Self {
        let cells = techs
            .iter()
            .map(|tech| {
                let route = routes.get(&tech.id).map(Vec::as_slice).unwrap_or(&[]);
                (tech.id.clone(), evaluate(ctx, tech, route, job, ledger, starts))
            })
            .collect();
        Self { cells }
    }

    pub fn feasible(&self) -> impl Iterator<Item = (&TechId, &Insertion)> {
        self.cells
            .iter()
            .filter_map(|(id, cell)| cell.as_ref().ok().map(|ins| (id, ins)))
    }

    pub fn violations(&self) -> Vec<CapabilityViolation> {
        self.cells
            .values()
            .filter_map(|cell| match cell {
                Err(Infeasibility::Incapable { violation }) => Some(violation.clone()),
                _ => None,
            })
            .collect()
    }

    /// Explains why `techs_required` technicians could not be found. Checks
    /// are ordered capability, availability, zone, time; the first stage
    /// that leaves too few candidates names the reason. A two-tech job with
    /// exactly one candidate left is a pairing problem.
    pub fn reason(&self, techs_required: usize) -> UnassignedReason {
        let total = self.cells.len();
        let incapable = self.count(|c| matches!(c, Err(Infeasibility::Incapable { .. })));
        let unavailable = self.count(|c| matches!(c, Err(Infeasibility::Unavailable)));
        let out_of_zone = self.count(|c| matches!(c, Err(Infeasibility::OutOfZone)));
        let no_slot = self.count(|c| matches!(c, Err(Infeasibility::NoTimeSlot { .. })));

        let capable = total - incapable;
        let available = capable - unavailable;
        let in_zone = available - out_of_zone;
        let fits = in_zone - no_slot;

        let stages = [
            (capable, UnassignedReason::NoCapableTechnician),
            (available, UnassignedReason::NoAvailableTechnician),
            (in_zone, UnassignedReason::NoZoneMatch),
            (fits, UnassignedReason::TimeConflict),
        ];

        if total == 0 {
            return UnassignedReason::NoAvailableTechnician;
        }
        for (count, reason) in stages {
            if count == 0 {
                return reason;
            }
            if count < techs_required {
                return UnassignedReason::NoCompatiblePair;
            }
        }
        if techs_required > 1 {
            UnassignedReason::NoCompatiblePair
        } else {
            UnassignedReason::TimeConflict
        }
    }

    fn count(&self, pred: impl Fn(&Cell) -> bool) -> usize {
        self.cells.values().filter(|c| pred(c)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive_time::ZoneDistanceHeuristic;
    use crate::models::{Capability, JobId, JobType, OverrideApproval, StaffType, Zone};

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).unwrap()
    }

    fn job(id: &str, zone: &str, job_type: JobType, start: &str, end: &str, hours: f64) -> Job {
        Job {
            id: JobId::new(id),
            customer_name: "Acme".to_string(),
            address: "1 Main St".to_string(),
            zone: Zone::new(zone),
            job_type,
            window: TimeWindow::new(t(start), t(end)).unwrap(),
            duration_hours: hours,
            requires_two_techs: false,
            status: Default::default(),
            assigned_tech: None,
            location: None,
            description: String::new(),
        }
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
    fn test_simulate_waits_for_window() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 3");
        let j1 = job("J1", "Zone 3", JobType::Install, "08:00", "10:00", 1.0);
        let route = simulate(&fx.ctx(), &tech, &[&j1], &SharedStarts::new()).unwrap();

        let stop = &route.stops[0];
        assert_eq!(stop.drive_minutes, 15);
        assert_eq!(stop.arrival, t("07:15"));
        assert_eq!(stop.wait_minutes, 45);
        assert_eq!(stop.service_start, t("08:00"));
        assert_eq!(route.finish, t("09:00"));
    }

    #[test]
    fn test_simulate_reports_first_miss() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let a = job("A", "Zone 1", JobType::Check, "09:00", "09:30", 2.0);
        let b = job("B", "Zone 1", JobType::Check, "09:00", "09:30", 2.0);
        let miss = simulate(&fx.ctx(), &tech, &[&a, &b], &SharedStarts::new()).unwrap_err();
        assert_eq!(miss.index, 1);
        // 11:00 finish + 15 drive + 10 buffer
        assert_eq!(miss.earliest_arrival, t("11:25"));
    }

    #[test]
    fn test_shift_bounds_arrival() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1")
            .with_shift(TimeWindow::new(t("12:00"), t("16:00")).unwrap());
        let morning = job("M", "Zone 1", JobType::Check, "08:00", "10:00", 1.0);
        assert!(simulate(&fx.ctx(), &tech, &[&morning], &SharedStarts::new()).is_err());
    }

    #[test]
    fn test_best_insertion_prefers_least_added_drive() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 1");
        let a = job("A", "Zone 1", JobType::Check, "08:00", "17:00", 1.0);
        let c = job("C", "Zone 5", JobType::Check, "08:00", "17:00", 1.0);
        let b = job("B", "Zone 3", JobType::Check, "08:00", "17:00", 1.0);

        let slot = best_insertion(&fx.ctx(), &tech, &[&a, &c], &b, &SharedStarts::new()).unwrap();
        assert_eq!(slot.position, 1);
        // 1→3 (35) + 3→5 (35) - 1→5 (55)
        assert_eq!(slot.added_drive_minutes, 15);
    }

    #[test]
    fn test_shared_start_holds_stop_until_agreed_minute() {
        let fx = Fixture::new();
        let tech = Technician::new("T1", "Alex", "Zone 3");
        let j1 = job("J1", "Zone 3", JobType::Install, "08:00", "12:00", 1.0);
        let mut starts = SharedStarts::new();
        starts.insert(j1.id.clone(), t("10:15"));

        let route = simulate(&fx.ctx(), &tech, &[&j1], &starts).unwrap();
        assert_eq!(route.stops[0].service_start, t("10:15"));
        assert_eq!(route.stops[0].wait_minutes, 180);

        // Already past the agreed minute on arrival.
        starts.insert(j1.id.clone(), t("07:05"));
        let miss = simulate(&fx.ctx(), &tech, &[&j1], &starts).unwrap_err();
        assert_eq!(miss.earliest_arrival, t("07:15"));
    }

    #[test]
    fn test_slot_at_reports_pinned_start() {
        let fx = Fixture::new();
        let early = Technician::new("T1", "Alex", "Zone 3");
        let late = Technician::new("T2", "Blair", "Zone 3")
            .with_shift(TimeWindow::new(t("10:00"), t("17:00")).unwrap());
        let p1 = job("P1", "Zone 3", JobType::Install, "08:00", "12:00", 1.0);
        let none = SharedStarts::new();

        let own_early = best_insertion(&fx.ctx(), &early, &[], &p1, &none).unwrap();
        let own_late = best_insertion(&fx.ctx(), &late, &[], &p1, &none).unwrap();
        assert_eq!(own_early.service_start, t("08:00"));
        assert_eq!(own_late.service_start, t("10:15"));

        let shared = own_early.service_start.max(own_late.service_start);
        let seated = slot_at(&fx.ctx(), &early, &[], &p1, shared, &none).unwrap();
        assert_eq!(seated.service_start, t("10:15"));

        // Past the window end no seat exists.
        assert!(slot_at(&fx.ctx(), &early, &[], &p1, t("12:30"), &none).is_err());
    }

    #[test]
    fn test_static_check_order() {
        let ledger = OverrideLedger::new();
        let check = job("J2", "Zone 1", JobType::Check, "09:00", "09:30", 0.5);

        let no_cs = Technician::new("T2", "Dana", "Zone 1")
            .with_capability(Capability::Cs, false)
            .with_availability(false);
        assert!(matches!(
            static_check(&no_cs, &check, &ledger, ZonePolicy::Prefer),
            Err(Infeasibility::Incapable { .. })
        ));

        let away = Technician::new("T3", "Eli", "Zone 2");
        assert_eq!(static_check(&away, &check, &ledger, ZonePolicy::Prefer), Ok(false));
        assert_eq!(
            static_check(&away, &check, &ledger, ZonePolicy::Require),
            Err(Infeasibility::OutOfZone)
        );
    }

    #[test]
    fn test_override_admits_incapable_tech() {
        let check = job("J2", "Zone 1", JobType::Check, "09:00", "09:30", 0.5);
        let no_cs = Technician::new("T2", "Dana", "Zone 1").with_capability(Capability::Cs, false);
        let ledger = OverrideLedger::from_approvals([OverrideApproval {
            tech_id: TechId::new("T2"),
            job_id: JobId::new("J2"),
            approved_by: "ops".to_string(),
            reason: None,
        }]);
        assert_eq!(static_check(&no_cs, &check, &ledger, ZonePolicy::Prefer), Ok(true));
    }

    #[test]
    fn test_row_reasons() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let ledger = OverrideLedger::new();
        let routes = BTreeMap::new();
        let check = job("J2", "Zone 1", JobType::Check, "09:00", "09:30", 0.5);

        let no_cs = Technician::new("T2", "Dana", "Zone 1").with_capability(Capability::Cs, false);
        let starts = SharedStarts::new();
        let row = FeasibilityRow::build(&ctx, &check, &[&no_cs], &routes, &ledger, &starts);
        assert_eq!(row.reason(1), UnassignedReason::NoCapableTechnician);
        assert_eq!(row.violations().len(), 1);

        let off = Technician::new("T4", "Fay", "Zone 1").with_availability(false);
        let row = FeasibilityRow::build(&ctx, &check, &[&no_cs, &off], &routes, &ledger, &starts);
        assert_eq!(row.reason(1), UnassignedReason::NoAvailableTechnician);

        let pm = Technician::new("P1", "Pat", "Zone 1")
            .with_type(StaffType::ProjectManager)
            .with_capability(Capability::Cs, true);
        let row = FeasibilityRow::build(&ctx, &check, &[&no_cs, &pm], &routes, &ledger, &starts);
        assert_eq!(row.reason(2), UnassignedReason::NoCompatiblePair);
        assert_eq!(row.feasible().count(), 1);
    }
}
