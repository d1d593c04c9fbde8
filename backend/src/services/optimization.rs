//! Background optimization run: validate, resolve drive times, optimize.
//!
//! Heavy steps run under `spawn_blocking`; every step reports progress to
//! the run tracker so clients can follow along over SSE.

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::drive_time::{self, distinct_points};
use crate::engine::{optimize, OptimizationRequest, OptimizationResult};
use crate::models::{Assignment, GeoPoint, OverrideApproval};
use crate::services::run_tracker::{LogLevel, RunGuard};
use crate::storm::StormFilter;
use crate::validation::{
    BatchValidationStats, FlaggedRecord, InvalidRecord, JobValidator, RawJobRecord, RawStaffRecord,
    StaffRoster, StaffValidator,
};

/// Raw inputs for one scheduling day, as the client sends them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub jobs: Vec<RawJobRecord>,
    /// Staff grouped by roster category.
    #[serde(default)]
    pub roster: StaffRoster,
    /// Staff as one flat list; each record names its own type.
    #[serde(default)]
    pub staff: Vec<RawStaffRecord>,
    #[serde(default)]
    pub filter: StormFilter,
    #[serde(default)]
    pub prior_assignment: Option<Assignment>,
    #[serde(default)]
    pub approvals: Vec<OverrideApproval>,
}

impl RunInput {
    /// Scheduling day the run is serialized on; today when not given.
    pub fn day(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub result: OptimizationResult,
    pub job_stats: BatchValidationStats,
    pub rejected_jobs: Vec<InvalidRecord>,
    pub rejected_staff: Vec<InvalidRecord>,
    pub validation_warnings: Vec<String>,
    pub flagged_records: Vec<FlaggedRecord>,
}

/// Validation half of a run: typed request plus what was rejected.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub request: OptimizationRequest,
    pub job_stats: BatchValidationStats,
    pub rejected_jobs: Vec<InvalidRecord>,
    pub rejected_staff: Vec<InvalidRecord>,
    pub warnings: Vec<String>,
    pub flagged_records: Vec<FlaggedRecord>,
}

pub fn prepare(input: RunInput) -> PreparedRun {
    let date = input.day();
    let jobs = JobValidator::validate_batch(&input.jobs);

    let mut staff_records = input.roster.into_records();
    staff_records.extend(input.staff);
    let staff = StaffValidator::validate_roster(&staff_records);

    let mut warnings = jobs.warnings;
    warnings.extend(staff.warnings);
    let mut flagged_records = jobs.flagged_records;
    flagged_records.extend(staff.flagged_records);

    PreparedRun {
        request: OptimizationRequest {
            date: Some(date),
            jobs: jobs.valid_jobs,
            staff: staff.technicians,
            filter: input.filter,
            prior_assignment: input.prior_assignment,
            approvals: input.approvals,
        },
        job_stats: jobs.stats,
        rejected_jobs: jobs.invalid_jobs,
        rejected_staff: staff.invalid_staff,
        warnings,
        flagged_records,
    }
}

/// Coordinates the drive-time matrix would need for this request.
pub fn request_points(request: &OptimizationRequest) -> Vec<GeoPoint> {
    let jobs = request.jobs.iter().filter_map(|j| j.location);
    let homes = request.staff.iter().filter_map(|t| t.home);
    distinct_points(jobs.chain(homes))
}

/// Runs one optimization, holding the day lock in `guard` until it ends.
pub async fn run_optimization(
    guard: RunGuard,
    input: RunInput,
    config: OptimizerConfig,
) -> anyhow::Result<RunOutput> {
    match execute(&guard, input, config).await {
        Ok(output) => {
            let value = serde_json::to_value(&output).context("Failed to serialize run output")?;
            guard.log(LogLevel::Success, "✓ Optimization complete");
            guard.complete(Some(value));
            Ok(output)
        }
        Err(e) => {
            guard.fail(format!("{:#}", e));
            Err(e)
        }
    }
}

async fn execute(
    guard: &RunGuard,
    input: RunInput,
    config: OptimizerConfig,
) -> anyhow::Result<RunOutput> {
    guard.log(
        LogLevel::Info,
        format!("Validating {} job records for {}...", input.jobs.len(), guard.date()),
    );

    let prepared = tokio::task::spawn_blocking(move || prepare(input))
        .await
        .context("Validation task panicked")?;

    guard.log(
        LogLevel::Success,
        format!(
            "✓ {} valid jobs, {} rejected; {} staff, {} rejected",
            prepared.request.jobs.len(),
            prepared.rejected_jobs.len(),
            prepared.request.staff.len(),
            prepared.rejected_staff.len()
        ),
    );
    if !prepared.flagged_records.is_empty() {
        guard.log(
            LogLevel::Warning,
            format!("{} records flagged for unsafe content", prepared.flagged_records.len()),
        );
    }

    let points = request_points(&prepared.request);
    guard.log(
        LogLevel::Info,
        format!("Resolving drive times for {} locations...", points.len()),
    );
    let drive_times = drive_time::resolve(&config.drive_time, &points).await;
    match &drive_times.degradation {
        Some(degradation) => guard.log(
            LogLevel::Warning,
            format!(
                "Drive times fall back to the zone heuristic: {} ({})",
                degradation.reason, degradation.detail
            ),
        ),
        None => guard.log(
            LogLevel::Info,
            format!("Drive times from {:?}", drive_times.provider.source()),
        ),
    }

    guard.log(LogLevel::Info, "Assigning and sequencing...");
    let PreparedRun {
        request,
        job_stats,
        rejected_jobs,
        rejected_staff,
        warnings,
        flagged_records,
    } = prepared;

    let result = tokio::task::spawn_blocking(move || optimize(&request, &drive_times, &config))
        .await
        .context("Optimization task panicked")?
        .context("Optimization failed")?;

    guard.log(
        LogLevel::Info,
        format!(
            "{} jobs assigned, {} unassigned, {} time-window conflicts",
            result.metadata.assigned_jobs,
            result.metadata.unassigned_jobs,
            result.exceptions.time_window_violations.len()
        ),
    );

    Ok(RunOutput {
        result,
        job_stats,
        rejected_jobs,
        rejected_staff,
        validation_warnings: warnings,
        flagged_records,
    })
}
