//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! validation, engine and service layers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

use super::dto::{
    BatchValidation, CommandOutcome, CommandRequest, DriveTimeTokenRequest, DriveTimeTokenResponse,
    HealthResponse, OptimizeAccepted, OptimizeQuery, RosterValidation, RunInput, RunStatusResponse,
    ValidateJobsRequest, ValidateStaffRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::engine::{apply_command as engine_apply_command, OverrideRequest};
use crate::services::{run_optimization, RunStatus};
use crate::validation::{apply_manual_timeframe, JobValidator, StaffValidator};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let config = state.config.read();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        drive_time_provider: config.drive_time.provider,
        drive_time_token_configured: config.drive_time.token().is_some(),
    }))
}

// =============================================================================
// Validation
// =============================================================================

/// POST /v1/jobs/validate
///
/// Batch-validate raw job records. Manual timeframes are applied to their
/// records first; a manual timeframe that is itself invalid fails the
/// request.
pub async fn validate_jobs(
    Json(request): Json<ValidateJobsRequest>,
) -> HandlerResult<BatchValidation> {
    let mut records = request.jobs;
    for manual in &request.manual_timeframes {
        let raw = records.get(manual.index).ok_or_else(|| {
            AppError::BadRequest(format!("manual timeframe for missing record {}", manual.index))
        })?;
        let updated = apply_manual_timeframe(raw, &manual.start, &manual.end).map_err(|issues| {
            let messages: Vec<String> = issues.into_iter().map(|i| i.message).collect();
            AppError::BadRequest(format!(
                "invalid manual timeframe for record {}: {}",
                manual.index,
                messages.join("; ")
            ))
        })?;
        records[manual.index] = updated;
    }

    let batch = tokio::task::spawn_blocking(move || JobValidator::validate_batch(&records))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?;

    Ok(Json(batch))
}

/// POST /v1/staff/validate
pub async fn validate_staff(
    Json(request): Json<ValidateStaffRequest>,
) -> HandlerResult<RosterValidation> {
    let mut records = request.roster.into_records();
    records.extend(request.staff);
    Ok(Json(StaffValidator::validate_roster(&records)))
}

// =============================================================================
// Optimization
// =============================================================================

/// POST /v1/optimize
///
/// Validate and optimize one scheduling day. Returns a run id for tracking
/// progress, or the finished output with `?wait=true`. A second request for
/// a day that already has an active run is rejected with 409.
pub async fn optimize(
    State(state): State<AppState>,
    Query(query): Query<OptimizeQuery>,
    Json(input): Json<RunInput>,
) -> Result<Response, AppError> {
    let guard = state.run_tracker.start_run(input.day())?;
    let run_id = guard.run_id().to_string();
    let config = state.config_snapshot();

    if query.wait {
        let output = run_optimization(guard, input, config).await?;
        return Ok(Json(output).into_response());
    }

    tokio::spawn(async move {
        if let Err(e) = run_optimization(guard, input, config).await {
            log::warn!("Optimization run failed: {:#}", e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(OptimizeAccepted {
            run_id: run_id.clone(),
            message: format!("Optimization started. Track progress at /v1/runs/{}/logs", run_id),
        }),
    )
        .into_response())
}

/// POST /v1/assignments/commands
///
/// Apply one manual override command to the given assignment snapshot.
pub async fn apply_command(Json(request): Json<CommandRequest>) -> HandlerResult<CommandOutcome> {
    let CommandRequest {
        assignment,
        jobs,
        staff,
        command,
        confirmation,
    } = request;
    let override_request = OverrideRequest { command, confirmation };
    let outcome = engine_apply_command(&assignment, &jobs, &staff, &override_request)?;
    Ok(Json(outcome))
}

// =============================================================================
// Run Management
// =============================================================================

/// GET /v1/runs/{run_id}
pub async fn get_run_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> HandlerResult<RunStatusResponse> {
    let run = state
        .run_tracker
        .get_run(&run_id)
        .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))?;

    Ok(Json(RunStatusResponse {
        run_id: run.run_id,
        date: run.date,
        status: format!("{:?}", run.status).to_lowercase(),
        logs: run.logs,
        result: run.result,
    }))
}

/// GET /v1/runs/{run_id}/logs
///
/// Stream run logs via Server-Sent Events (SSE).
pub async fn stream_run_logs(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if state.run_tracker.get_run(&run_id).is_none() {
        return Err(AppError::NotFound(format!("Run {} not found", run_id)));
    }

    let tracker = state.run_tracker.clone();
    let stream = async_stream::stream! {
        let mut last_log_count = 0;
        loop {
            let logs = tracker.get_logs(&run_id);

            for log in logs.iter().skip(last_log_count) {
                let event_data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(event_data));
            }
            last_log_count = logs.len();

            if let Some(run) = tracker.get_run(&run_id) {
                if run.status != RunStatus::Running {
                    let final_event = serde_json::json!({
                        "status": run.status,
                        "result": run.result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
            } else {
                break;
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

// =============================================================================
// Settings
// =============================================================================

/// PUT /v1/settings/drive-time-token
///
/// Set or clear the drive-time service token. Takes effect on the next run.
pub async fn set_drive_time_token(
    State(state): State<AppState>,
    Json(request): Json<DriveTimeTokenRequest>,
) -> HandlerResult<DriveTimeTokenResponse> {
    let mut config = state.config.write();
    config.set_drive_time_token(request.token);
    log::info!("Drive-time provider set to {:?}", config.drive_time.provider);

    Ok(Json(DriveTimeTokenResponse {
        provider: config.drive_time.provider,
        configured: config.drive_time.token().is_some(),
    }))
}
