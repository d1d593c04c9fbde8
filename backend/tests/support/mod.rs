#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use crew_dispatch::config::OptimizerConfig;
use crew_dispatch::drive_time::DriveTimeResolution;
use crew_dispatch::engine::{optimize, OptimizationRequest, OptimizationResult};
use crew_dispatch::models::{
    Capability, Job, JobId, JobStatus, JobType, TimeOfDay, TimeWindow, Technician, Zone,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn t(s: &str) -> TimeOfDay {
    TimeOfDay::parse(s).unwrap()
}

pub fn window(start: &str, end: &str) -> TimeWindow {
    TimeWindow::new(t(start), t(end)).unwrap()
}

pub fn job(id: &str, zone: &str, job_type: JobType, start: &str, end: &str, hours: f64) -> Job {
    Job {
        id: JobId::new(id),
        customer_name: format!("Customer {}", id),
        address: format!("{} Main St", id.len()),
        zone: Zone::new(zone),
        job_type,
        window: window(start, end),
        duration_hours: hours,
        requires_two_techs: false,
        status: JobStatus::Unassigned,
        assigned_tech: None,
        location: None,
        description: String::new(),
    }
}

pub fn tech(id: &str, zone: &str) -> Technician {
    Technician::new(id, format!("Tech {}", id), zone)
}

/// A regular technician with every capability flag spelled out.
pub fn capable_tech(id: &str, zone: &str, install: bool, cs: bool, pull: bool) -> Technician {
    tech(id, zone)
        .with_capability(Capability::Install, install)
        .with_capability(Capability::Cs, cs)
        .with_capability(Capability::Pull, pull)
}

pub fn request(jobs: Vec<Job>, staff: Vec<Technician>) -> OptimizationRequest {
    OptimizationRequest {
        jobs,
        staff,
        ..OptimizationRequest::default()
    }
}

/// Runs the engine with default configuration and heuristic drive times.
pub fn run(request: &OptimizationRequest) -> OptimizationResult {
    let config = OptimizerConfig::default();
    let drive_times = DriveTimeResolution::heuristic(&config.drive_time);
    optimize(request, &drive_times, &config).unwrap()
}
