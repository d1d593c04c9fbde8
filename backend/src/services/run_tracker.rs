//! Run tracking for optimization passes.
//!
//! Keeps progress logs and results for background optimization runs in
//! memory, and makes sure only one run per scheduling day is active at a
//! time. The day lock belongs to a [`RunGuard`] and is released when the
//! guard drops, whether the run finished, failed or panicked.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{ErrorContext, OptimizerError, OptimizerResult};

/// A single log entry with timestamp and message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Run metadata and logs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub date: NaiveDate,
    pub status: RunStatus,
    pub logs: Vec<LogEntry>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Serialized `OptimizationResult` once the run completes.
    pub result: Option<serde_json::Value>,
}

/// In-memory run tracker. Clones share state.
#[derive(Clone, Default)]
pub struct RunTracker {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
    active_days: Arc<RwLock<HashSet<NaiveDate>>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `date` and registers a new run for it.
    ///
    /// Fails with `RunInProgress` while another guard for the same day is
    /// alive.
    pub fn start_run(&self, date: NaiveDate) -> OptimizerResult<RunGuard> {
        if !self.active_days.write().insert(date) {
            return Err(OptimizerError::run_in_progress(
                format!("an optimization run for {} is already active", date),
                ErrorContext::new("start_run")
                    .with_entity("date")
                    .with_entity_id(date),
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        let run = RunRecord {
            run_id: run_id.clone(),
            date,
            status: RunStatus::Running,
            logs: vec![],
            created_at: chrono::Utc::now(),
            completed_at: None,
            result: None,
        };
        self.runs.write().insert(run_id.clone(), run);
        log::info!("Run {} started for {}", run_id, date);

        Ok(RunGuard {
            tracker: self.clone(),
            run_id,
            date,
        })
    }

    pub fn is_day_active(&self, date: NaiveDate) -> bool {
        self.active_days.read().contains(&date)
    }

    /// Add a log entry to a run.
    pub fn log(&self, run_id: &str, level: LogLevel, message: impl Into<String>) {
        let mut runs = self.runs.write();
        if let Some(run) = runs.get_mut(run_id) {
            run.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level,
                message: message.into(),
            });
        }
    }

    pub fn complete_run(&self, run_id: &str, result: Option<serde_json::Value>) {
        let mut runs = self.runs.write();
        if let Some(run) = runs.get_mut(run_id) {
            run.status = RunStatus::Completed;
            run.completed_at = Some(chrono::Utc::now());
            run.result = result;
        }
    }

    pub fn fail_run(&self, run_id: &str, error_message: impl Into<String>) {
        let mut runs = self.runs.write();
        if let Some(run) = runs.get_mut(run_id) {
            run.status = RunStatus::Failed;
            run.completed_at = Some(chrono::Utc::now());
            run.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level: LogLevel::Error,
                message: error_message.into(),
            });
        }
    }

    pub fn get_run(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.read().get(run_id).cloned()
    }

    pub fn get_logs(&self, run_id: &str) -> Vec<LogEntry> {
        self.runs
            .read()
            .get(run_id)
            .map(|run| run.logs.clone())
            .unwrap_or_default()
    }

    fn release(&self, run_id: &str, date: NaiveDate) {
        let still_running = self
            .get_run(run_id)
            .is_some_and(|run| run.status == RunStatus::Running);
        if still_running {
            self.fail_run(run_id, "Run ended without a result");
        }
        self.active_days.write().remove(&date);
        log::debug!("Run {} released {}", run_id, date);
    }
}

/// Owns the day lock for one run.
pub struct RunGuard {
    tracker: RunTracker,
    run_id: String,
    date: NaiveDate,
}

impl RunGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.tracker.log(&self.run_id, level, message);
    }

    pub fn complete(&self, result: Option<serde_json::Value>) {
        self.tracker.complete_run(&self.run_id, result);
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.tracker.fail_run(&self.run_id, message);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.run_id, self.date);
    }
}
