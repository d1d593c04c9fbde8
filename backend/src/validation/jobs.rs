//! Job record validation with detailed error and warning reporting.
//!
//! Raw import records arrive loosely typed: ids may be numbers, durations
//! may be numeric strings, and the service window may only exist as a
//! `TF(HH:MM-HH:MM)` tag inside the route description. This module turns
//! them into [`Job`] values or into a full list of reasons why it could not.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::safety::{scan_job_record, SafetyWarning};
use super::{
    coerce_flag, coerce_text, coerce_typed, value_as_string, FlaggedRecord, InvalidRecord,
    IssueClass, IssueKind, RecordIssues, ValidationIssue,
};
use crate::models::{
    AssignedTechs, GeoPoint, Job, JobId, JobStatus, JobType, TimeOfDay, TimeParseError, TimeWindow,
    Zone,
};

/// Duration assumed when a record does not carry one.
pub const DEFAULT_DURATION_HOURS: f64 = 1.0;
/// Longest duration a single job may request.
pub const MAX_DURATION_HOURS: f64 = 24.0;

/// A job as it comes out of CSV import or manual entry.
///
/// Field aliases accept the column names of the route export (`text`,
/// `route_title`, `customer_address`, `Zone`, `route_description`) next to
/// the camelCase names used by the web client. Every field is kept as raw
/// JSON and read by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobRecord {
    #[serde(default, alias = "text")]
    pub id: Option<Value>,
    #[serde(default, alias = "route_title", alias = "customer_name")]
    pub customer_name: Option<Value>,
    #[serde(default, alias = "customer_address")]
    pub address: Option<Value>,
    #[serde(default, alias = "Zone")]
    pub zone: Option<Value>,
    #[serde(default, alias = "job_type", alias = "type")]
    pub job_type: Option<Value>,
    #[serde(default, alias = "timeframe_start")]
    pub timeframe_start: Option<Value>,
    #[serde(default, alias = "timeframe_end")]
    pub timeframe_end: Option<Value>,
    #[serde(default, alias = "durationHours", alias = "duration_hours")]
    pub duration: Option<Value>,
    #[serde(default)]
    pub workers: Option<Value>,
    #[serde(default, alias = "requires_two_techs")]
    pub requires_two_techs: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default, alias = "assigned_tech")]
    pub assigned_tech: Option<Value>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default, alias = "route_description")]
    pub description: Option<Value>,
}

impl RawJobRecord {
    /// Record id as a string, if one can be read.
    pub fn id_string(&self) -> Option<String> {
        self.id.as_ref().and_then(value_as_string)
    }
}

/// Outcome of validating one job record.
///
/// Errors make `is_valid` false; warnings and safety warnings never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    pub safety_warnings: Vec<SafetyWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
}

impl JobValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            safety_warnings: Vec::new(),
            job: None,
        }
    }

    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.is_valid = false;
        self.errors.push(issue);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl RecordIssues for JobValidationResult {
    fn add_error(&mut self, issue: ValidationIssue) {
        JobValidationResult::add_error(self, issue);
    }
}

impl Default for JobValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchValidationStats {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub duplicate_ids: usize,
    pub flagged_records: usize,
    /// Valid records as a percentage of the batch, `0.0` for an empty batch.
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchValidation {
    pub valid_jobs: Vec<Job>,
    pub invalid_jobs: Vec<InvalidRecord>,
    pub warnings: Vec<String>,
    pub flagged_records: Vec<FlaggedRecord>,
    pub stats: BatchValidationStats,
}

/// Validator for imported job records.
///
/// # Examples
///
/// ```
/// use crew_dispatch::validation::{JobValidator, RawJobRecord};
/// use serde_json::json;
///
/// let raw: RawJobRecord = serde_json::from_value(json!({
///     "text": "J1",
///     "route_title": "Acme",
///     "customer_address": "1 Main St",
///     "Zone": "Zone 1",
///     "jobType": "install",
///     "route_description": "TF(9:00-11:00) basement",
/// }))
/// .unwrap();
///
/// let result = JobValidator::validate_record(&raw);
/// assert!(result.is_valid);
/// assert_eq!(result.job.unwrap().window.start.to_string(), "09:00");
/// ```
pub struct JobValidator;

impl JobValidator {
    /// Validates a single record. Every problem is reported, not just the
    /// first one found.
    pub fn validate_record(raw: &RawJobRecord) -> JobValidationResult {
        let mut result = JobValidationResult::new();
        result.safety_warnings = scan_job_record(raw);

        let id = result.require_text(raw.id.as_ref(), "id", "Job ID is required");
        let customer_name = result.require_text(
            raw.customer_name.as_ref(),
            "customerName",
            "Customer name is required",
        );
        let address = result.require_text(raw.address.as_ref(), "address", "Address is required");
        let zone = result.accept(coerce_text(raw.zone.as_ref(), "zone"));

        let job_type = Self::resolve_job_type(raw, &mut result);
        let duration_hours = Self::resolve_duration(raw, &mut result);
        let requires_two_techs = Self::resolve_crew_size(raw, &mut result);

        let description = result
            .accept(coerce_text(raw.description.as_ref(), "description"))
            .unwrap_or_default();
        let window = Self::resolve_window(raw, &description, &mut result);

        let (status, assigned_tech) = Self::resolve_status(raw, &mut result);

        let location = result.accept(coerce_typed::<GeoPoint>(raw.location.as_ref(), "location"));
        if let Some(point) = location.filter(|p| !p.is_valid()) {
            result.add_warning(format!(
                "Ignoring out-of-range coordinates ({}, {})",
                point.lat, point.lon
            ));
        }

        if !result.is_valid {
            return result;
        }

        // Every branch above that leaves one of these `None` also pushed an error.
        if let (
            Some(id),
            Some(customer_name),
            Some(address),
            Some(job_type),
            Some(duration_hours),
            Some(window),
        ) = (id, customer_name, address, job_type, duration_hours, window)
        {
            result.job = Some(Job {
                id: JobId::new(id),
                customer_name,
                address,
                zone: zone.map(Zone::new).unwrap_or_else(Zone::unzoned),
                job_type,
                window,
                duration_hours,
                requires_two_techs,
                status,
                assigned_tech,
                location: location.filter(GeoPoint::is_valid),
                description,
            });
        }
        result
    }

    /// Validates a batch, partitioning it into valid jobs and rejected
    /// records. A duplicate id is rejected on its second occurrence.
    pub fn validate_batch(records: &[RawJobRecord]) -> BatchValidation {
        let mut batch = BatchValidation::default();
        batch.stats.total_records = records.len();

        let mut seen: HashSet<String> = HashSet::new();

        for (index, raw) in records.iter().enumerate() {
            let mut result = Self::validate_record(raw);
            let id = raw.id_string();

            if let Some(ref id) = id {
                if !seen.insert(id.clone()) {
                    batch.stats.duplicate_ids += 1;
                    result.add_error(ValidationIssue::field(
                        "id",
                        IssueKind::DuplicateId,
                        format!("Duplicate job ID: {}", id),
                    ));
                    result.job = None;
                }
            }

            let label = id.clone().unwrap_or_else(|| format!("#{}", index));
            for warning in result.warnings.drain(..) {
                batch.warnings.push(format!("Job {}: {}", label, warning));
            }

            if !result.safety_warnings.is_empty() {
                batch.flagged_records.push(FlaggedRecord {
                    index,
                    id: id.clone(),
                    warnings: std::mem::take(&mut result.safety_warnings),
                });
            }

            match result.job {
                Some(job) if result.is_valid => batch.valid_jobs.push(job),
                _ => batch.invalid_jobs.push(InvalidRecord {
                    index,
                    id,
                    errors: result.errors,
                }),
            }
        }

        batch.stats.valid_records = batch.valid_jobs.len();
        batch.stats.invalid_records = batch.invalid_jobs.len();
        batch.stats.flagged_records = batch.flagged_records.len();
        batch.stats.success_rate = if records.is_empty() {
            0.0
        } else {
            batch.valid_jobs.len() as f64 / records.len() as f64 * 100.0
        };

        log::debug!(
            "Validated {} job records: {} valid, {} invalid, {} flagged",
            batch.stats.total_records,
            batch.stats.valid_records,
            batch.stats.invalid_records,
            batch.stats.flagged_records
        );

        batch
    }

    /// An absent type defaults to `Other`; an explicitly blank one is a
    /// missing required field; an unrecognized one becomes `Other` with a
    /// warning.
    fn resolve_job_type(raw: &RawJobRecord, result: &mut JobValidationResult) -> Option<JobType> {
        let declared = match &raw.job_type {
            None | Some(Value::Null) => return Some(JobType::Other),
            Some(value) => coerce_text(Some(value), "jobType"),
        };
        match declared {
            Err(issue) => {
                result.add_error(issue);
                None
            }
            Ok(None) => {
                result.add_error(ValidationIssue::field(
                    "jobType",
                    IssueKind::MissingField,
                    "Job type is required",
                ));
                None
            }
            Ok(Some(text)) => match JobType::parse_lenient(&text) {
                Some(job_type) => Some(job_type),
                None => {
                    result.add_warning(format!("Unknown job type '{}', treating as Other", text));
                    Some(JobType::Other)
                }
            },
        }
    }

    /// Explicit timeframe fields win; without either one the description's
    /// `TF(...)` tag is used.
    fn resolve_window(
        raw: &RawJobRecord,
        description: &str,
        result: &mut JobValidationResult,
    ) -> Option<TimeWindow> {
        let mut bound = |value: &Option<Value>, field: &str| {
            coerce_text(value.as_ref(), field).map_err(|mut issue| {
                issue.class = IssueClass::TimeWindowConflict;
                result.add_error(issue);
            })
        };
        let start = bound(&raw.timeframe_start, "timeframeStart");
        let end = bound(&raw.timeframe_end, "timeframeEnd");
        let (Ok(start), Ok(end)) = (start, end) else {
            return None;
        };

        let (start, end) = match (start, end) {
            (None, None) => match extract_timeframe(description) {
                Some((start, end)) => (Some(start), Some(end)),
                None => (None, None),
            },
            explicit => explicit,
        };
        let mut issues = Vec::new();
        let window = check_window(start.as_deref(), end.as_deref(), &mut issues);
        for issue in issues {
            result.add_error(issue);
        }
        window
    }

    fn resolve_duration(raw: &RawJobRecord, result: &mut JobValidationResult) -> Option<f64> {
        let hours = match &raw.duration {
            None | Some(Value::Null) => Some(DEFAULT_DURATION_HOURS),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) if s.trim().is_empty() => Some(DEFAULT_DURATION_HOURS),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        match hours {
            Some(h) if h.is_finite() && h > 0.0 && h <= MAX_DURATION_HOURS => Some(h),
            Some(h) if h.is_finite() => {
                result.add_error(ValidationIssue::field(
                    "duration",
                    IssueKind::OutOfRange,
                    format!("Duration must be greater than 0 and at most 24 hours, got {}", h),
                ));
                None
            }
            _ => {
                result.add_error(ValidationIssue::field(
                    "duration",
                    IssueKind::InvalidFormat,
                    "Duration must be a number of hours",
                ));
                None
            }
        }
    }

    /// `workers >= 2` on the import implies a two-technician job.
    fn resolve_crew_size(raw: &RawJobRecord, result: &mut JobValidationResult) -> bool {
        let workers = match &raw.workers {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    result.add_warning(format!(
                        "Ignoring non-numeric workers value '{}'",
                        s.trim()
                    ));
                    None
                }
            },
            Some(other) => {
                result.add_warning(format!("Ignoring workers value {}", other));
                None
            }
        };

        let from_workers = workers.is_some_and(|w| w >= 2.0);
        let flagged = result
            .accept(coerce_flag(raw.requires_two_techs.as_ref(), "requiresTwoTechs"))
            .unwrap_or(false);
        flagged || from_workers
    }

    fn resolve_status(
        raw: &RawJobRecord,
        result: &mut JobValidationResult,
    ) -> (JobStatus, Option<AssignedTechs>) {
        let status = result.accept(coerce_text(raw.status.as_ref(), "status"));
        let status = match status.map(|s| s.to_ascii_lowercase()) {
            None => JobStatus::Unassigned,
            Some(s) if s == "unassigned" => JobStatus::Unassigned,
            Some(s) if s == "assigned" => JobStatus::Assigned,
            Some(other) => {
                result.add_warning(format!("Unknown status '{}', treating as unassigned", other));
                JobStatus::Unassigned
            }
        };

        let assigned = result.accept(coerce_typed::<AssignedTechs>(
            raw.assigned_tech.as_ref(),
            "assignedTech",
        ));
        match (status, assigned) {
            (_, Some(techs)) => (JobStatus::Assigned, Some(techs)),
            (JobStatus::Assigned, None) => {
                result.add_warning(
                    "Marked assigned without a technician, treating as unassigned".to_string(),
                );
                (JobStatus::Unassigned, None)
            }
            (status, None) => (status, None),
        }
    }
}

/// Normalizes `H:MM` / `HH:MM` to zero-padded `HH:MM`.
pub fn normalize_time(raw: &str) -> Result<String, TimeParseError> {
    TimeOfDay::parse(raw).map(|t| t.to_string())
}

/// Reads a `TF(HH:MM-HH:MM)` tag out of a route description. The returned
/// strings are untrimmed of format problems; they still go through the
/// normal window checks.
pub fn extract_timeframe(description: &str) -> Option<(String, String)> {
    let open = description.find("TF(")?;
    let rest = &description[open + 3..];
    let close = rest.find(')')?;
    let (start, end) = rest[..close].split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() {
        return None;
    }
    Some((start.to_string(), end.to_string()))
}

/// Fills in a timeframe entered by an operator for a record whose import
/// carried none. The strings are held to the same rules as imported ones;
/// on success the record carries the normalized times.
pub fn apply_manual_timeframe(
    raw: &RawJobRecord,
    start: &str,
    end: &str,
) -> Result<RawJobRecord, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let window = check_window(Some(start), Some(end), &mut issues);
    match window {
        Some(window) => Ok(RawJobRecord {
            timeframe_start: Some(Value::String(window.start.to_string())),
            timeframe_end: Some(Value::String(window.end.to_string())),
            ..raw.clone()
        }),
        None => Err(issues),
    }
}

/// Checks start and end independently, then their order. Pushes every
/// problem found and returns the window only when there were none.
pub(super) fn check_window(
    start: Option<&str>,
    end: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<TimeWindow> {
    let start = parse_bound("timeframeStart", "Start time", start, issues);
    let end = parse_bound("timeframeEnd", "End time", end, issues);
    let (start, end) = (start?, end?);

    match TimeWindow::new(start, end) {
        Ok(window) => Some(window),
        Err(_) => {
            issues.push(ValidationIssue::window(
                "timeframeEnd",
                IssueKind::InvertedWindow,
                format!("Start time {} must be before end time {}", start, end),
            ));
            None
        }
    }
}

fn parse_bound(
    field: &str,
    label: &str,
    raw: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<TimeOfDay> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => {
            issues.push(ValidationIssue::window(
                field,
                IssueKind::MissingField,
                format!("{} is required", label),
            ));
            return None;
        }
    };

    match TimeOfDay::parse(raw) {
        Ok(t) => Some(t),
        Err(err) => {
            let kind = match err {
                TimeParseError::HourOutOfRange(_) | TimeParseError::MinuteOutOfRange(_) => {
                    IssueKind::OutOfRange
                }
                TimeParseError::Empty => IssueKind::MissingField,
                TimeParseError::Format(_) => IssueKind::InvalidFormat,
            };
            issues.push(ValidationIssue::window(field, kind, format!("{}: {}", label, err)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawJobRecord {
        serde_json::from_value(value).unwrap()
    }

    fn complete() -> serde_json::Value {
        json!({
            "id": "J1",
            "customerName": "Acme",
            "address": "1 Main St",
            "zone": "Zone 1",
            "jobType": "install",
            "timeframeStart": "9:00",
            "timeframeEnd": "11:00",
            "duration": 2,
        })
    }

    fn with(mut base: serde_json::Value, key: &str, value: serde_json::Value) -> serde_json::Value {
        base[key] = value;
        base
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("9:00").unwrap(), "09:00");
        assert_eq!(normalize_time("09:00").unwrap(), "09:00");
        assert!(normalize_time("25:00").is_err());
        assert!(normalize_time("12:60").is_err());
    }

    #[test]
    fn test_complete_record_is_valid() {
        let result = JobValidator::validate_record(&raw(complete()));
        assert!(result.is_valid, "{:?}", result.errors);
        let job = result.job.unwrap();
        assert_eq!(job.window.start.to_string(), "09:00");
        assert_eq!(job.duration_hours, 2.0);
        assert_eq!(job.status, JobStatus::Unassigned);
        assert!(!job.requires_two_techs);
    }

    #[test]
    fn test_defaults() {
        let mut base = complete();
        base.as_object_mut().unwrap().remove("jobType");
        base.as_object_mut().unwrap().remove("duration");
        base.as_object_mut().unwrap().remove("zone");
        let job = JobValidator::validate_record(&raw(base)).job.unwrap();
        assert_eq!(job.job_type, JobType::Other);
        assert_eq!(job.duration_hours, DEFAULT_DURATION_HOURS);
        assert!(job.zone.is_unzoned());
    }

    #[test]
    fn test_all_errors_reported() {
        let result = JobValidator::validate_record(&raw(json!({
            "jobType": "",
            "timeframeStart": "25:00",
            "duration": "-3",
        })));
        assert!(!result.is_valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        let expected_fields = [
            "id",
            "customerName",
            "address",
            "jobType",
            "duration",
            "timeframeStart",
            "timeframeEnd",
        ];
        for expected in expected_fields {
            assert!(fields.contains(&expected), "missing error for {expected}: {fields:?}");
        }
        assert!(result.job.is_none());
    }

    #[test]
    fn test_window_errors_are_classified() {
        let record = raw(with(complete(), "timeframeEnd", json!("8:00")));
        let result = JobValidator::validate_record(&record);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].class, IssueClass::TimeWindowConflict);
        assert_eq!(result.errors[0].kind, IssueKind::InvertedWindow);
    }

    #[test]
    fn test_equal_bounds_rejected() {
        let record = raw(with(complete(), "timeframeEnd", json!("09:00")));
        let result = JobValidator::validate_record(&record);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_duration_bounds() {
        for bad in [json!(0), json!(24.5), json!("abc"), json!(true)] {
            let record = raw(with(complete(), "duration", bad.clone()));
            let result = JobValidator::validate_record(&record);
            assert!(!result.is_valid, "{bad} should be rejected");
        }
        let ok = JobValidator::validate_record(&raw(with(complete(), "duration", json!(" 1.5 "))));
        assert_eq!(ok.job.unwrap().duration_hours, 1.5);
        let max = JobValidator::validate_record(&raw(with(complete(), "duration", json!(24))));
        assert!(max.is_valid);
    }

    #[test]
    fn test_workers_imply_two_techs() {
        let job = JobValidator::validate_record(&raw(with(complete(), "workers", json!("2"))))
            .job
            .unwrap();
        assert!(job.requires_two_techs);
        let job = JobValidator::validate_record(&raw(with(complete(), "workers", json!(1))))
            .job
            .unwrap();
        assert!(!job.requires_two_techs);
    }

    #[test]
    fn test_unknown_job_type_warns() {
        let record = raw(with(complete(), "jobType", json!("mold")));
        let result = JobValidator::validate_record(&record);
        assert!(result.is_valid);
        assert_eq!(result.job.unwrap().job_type, JobType::Other);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_import_aliases_and_tf_tag() {
        let result = JobValidator::validate_record(&raw(json!({
            "text": 1042,
            "route_title": " Acme ",
            "customer_address": "1 Main St",
            "Zone": "Zone 4",
            "type": "Demo Prep",
            "workers": 2,
            "route_description": "Crawlspace TF(7:30-9:00) call first",
        })));
        assert!(result.is_valid, "{:?}", result.errors);
        let job = result.job.unwrap();
        assert_eq!(job.id.as_str(), "1042");
        assert_eq!(job.customer_name, "Acme");
        assert_eq!(job.zone.as_str(), "Zone 4");
        assert_eq!(job.job_type, JobType::DemoPrep);
        assert_eq!(job.window.to_string(), "07:30-09:00");
        assert!(job.requires_two_techs);
    }

    #[test]
    fn test_extract_timeframe() {
        assert_eq!(
            extract_timeframe("x TF(9:00 - 10:30) y"),
            Some(("9:00".to_string(), "10:30".to_string()))
        );
        assert_eq!(extract_timeframe("no tag"), None);
        assert_eq!(extract_timeframe("TF(9:00)"), None);
        assert_eq!(extract_timeframe("TF(9:00-"), None);
    }

    #[test]
    fn test_missing_timeframe_then_manual_entry() {
        let mut base = complete();
        base.as_object_mut().unwrap().remove("timeframeStart");
        base.as_object_mut().unwrap().remove("timeframeEnd");
        let record = raw(base);

        let result = JobValidator::validate_record(&record);
        assert!(!result.is_valid);
        assert!(result.errors.iter().all(|e| e.class == IssueClass::TimeWindowConflict));

        let issues = apply_manual_timeframe(&record, "11:00", "10:00").unwrap_err();
        assert_eq!(issues[0].kind, IssueKind::InvertedWindow);

        let fixed = apply_manual_timeframe(&record, "8:00", "10:00").unwrap();
        assert_eq!(fixed.timeframe_start, Some(json!("08:00")));
        assert!(JobValidator::validate_record(&fixed).is_valid);
    }

    #[test]
    fn test_assigned_tech_sets_status() {
        let record = raw(with(complete(), "assignedTech", json!("T1")));
        let job = JobValidator::validate_record(&record).job.unwrap();
        assert_eq!(job.status, JobStatus::Assigned);

        let record = raw(with(complete(), "status", json!("assigned")));
        let result = JobValidator::validate_record(&record);
        assert_eq!(result.job.unwrap().status, JobStatus::Unassigned);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_batch_partition_and_stats() {
        let records = vec![
            raw(complete()),
            raw(json!({"id": "J2"})),
            raw(complete()),
            raw(with(complete(), "id", json!("J3"))),
        ];
        let batch = JobValidator::validate_batch(&records);

        assert_eq!(batch.valid_jobs.len(), 2);
        assert_eq!(batch.invalid_jobs.len(), 2);
        assert_eq!(batch.invalid_jobs[0].index, 1);
        assert_eq!(batch.invalid_jobs[0].id.as_deref(), Some("J2"));
        assert_eq!(batch.invalid_jobs[1].index, 2);
        assert_eq!(batch.invalid_jobs[1].errors[0].kind, IssueKind::DuplicateId);
        assert_eq!(batch.stats.duplicate_ids, 1);
        assert_eq!(batch.stats.success_rate, 50.0);
    }

    #[test]
    fn test_safety_warnings_do_not_invalidate() {
        let record = raw(with(
            complete(),
            "customerName",
            json!("<script>alert(1)</script>"),
        ));
        let result = JobValidator::validate_record(&record);
        assert!(result.is_valid);
        assert!(!result.safety_warnings.is_empty());

        let batch = JobValidator::validate_batch(&[record]);
        assert_eq!(batch.valid_jobs.len(), 1);
        assert_eq!(batch.stats.flagged_records, 1);
    }

    #[test]
    fn test_loose_values_are_coerced() {
        let mut base = complete();
        base["zone"] = json!(3);
        base["customerName"] = json!(1042);
        base["requiresTwoTechs"] = json!("true");
        let result = JobValidator::validate_record(&raw(base));

        assert!(result.is_valid, "{:?}", result.errors);
        let job = result.job.unwrap();
        assert_eq!(job.zone.as_str(), "3");
        assert_eq!(job.customer_name, "1042");
        assert!(job.requires_two_techs);
    }

    #[test]
    fn test_mistyped_fields_are_invalid_format() {
        let mut base = complete();
        base["address"] = json!({"street": "Elm"});
        base["requiresTwoTechs"] = json!("maybe");
        base["timeframeStart"] = json!(true);
        base["assignedTech"] = json!({"id": "T1"});
        let result = JobValidator::validate_record(&raw(base));

        assert!(!result.is_valid);
        assert!(result.job.is_none());
        let mistyped: Vec<(&str, IssueKind)> =
            result.errors.iter().map(|e| (e.field.as_str(), e.kind)).collect();
        assert_eq!(
            mistyped,
            vec![
                ("address", IssueKind::InvalidFormat),
                ("requiresTwoTechs", IssueKind::InvalidFormat),
                ("timeframeStart", IssueKind::InvalidFormat),
                ("assignedTech", IssueKind::InvalidFormat),
            ]
        );
        assert_eq!(result.errors[2].class, IssueClass::TimeWindowConflict);
    }

    #[test]
    fn test_empty_batch() {
        let batch = JobValidator::validate_batch(&[]);
        assert_eq!(batch.stats.total_records, 0);
        assert_eq!(batch.stats.success_rate, 0.0);
    }
}
