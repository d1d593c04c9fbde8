//! Import validation for job and staff records.
//!
//! Loosely-typed records from CSV import or manual entry are normalized and
//! checked here before anything reaches the engine. Every problem on a record
//! is reported, not just the first; a bad record never fails the batch.
//!
//! Raw records keep their fields as JSON values so that a mistyped field
//! (an object where text belongs, `"maybe"` for a flag) only fails its own
//! record, as an `InvalidFormat` issue, instead of the whole import.

pub mod jobs;
pub mod safety;
pub mod staff;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use jobs::{
    apply_manual_timeframe, extract_timeframe, normalize_time, BatchValidation,
    BatchValidationStats, JobValidationResult, JobValidator, RawJobRecord,
};
pub use safety::{scan_job_record, scan_staff_record, scan_text, SafetyConcern, SafetyWarning};
pub use staff::{
    RawStaffRecord, RosterValidation, StaffRoster, StaffValidationResult, StaffValidator,
};

/// Error family an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueClass {
    /// Malformed or missing field.
    ValidationError,
    /// Time window missing, malformed or inverted.
    TimeWindowConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    MissingField,
    InvalidFormat,
    OutOfRange,
    InvertedWindow,
    DuplicateId,
    UnknownValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field: String,
    pub class: IssueClass,
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn field(field: &str, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            class: IssueClass::ValidationError,
            kind,
            message: message.into(),
        }
    }

    pub fn window(field: &str, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            class: IssueClass::TimeWindowConflict,
            kind,
            message: message.into(),
        }
    }
}

/// A rejected record, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub errors: Vec<ValidationIssue>,
}

/// A record carrying safety warnings, valid or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub warnings: Vec<SafetyWarning>,
}

/// Reads a string-ish JSON value: strings are trimmed, numbers are rendered.
pub(crate) fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn unreadable(field: &str, message: String) -> ValidationIssue {
    ValidationIssue::field(field, IssueKind::InvalidFormat, message)
}

/// Text field: strings trimmed, numbers rendered, blank or absent is
/// `Ok(None)`.
pub(crate) fn coerce_text(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<String>, ValidationIssue> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v @ (Value::String(_) | Value::Number(_))) => Ok(value_as_string(v)),
        Some(other) => Err(unreadable(
            field,
            format!("Expected text, got {}", describe(other)),
        )),
    }
}

/// Yes/no field. Accepts booleans, `0` / `1`, and the usual spellings
/// (`"true"`, `"yes"`, `"n"`...).
pub(crate) fn coerce_flag(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<bool>, ValidationIssue> {
    let invalid = |shown: String| unreadable(field, format!("Expected yes or no, got {}", shown));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(invalid(n.to_string())),
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "y" | "1" => Ok(Some(true)),
            "false" | "no" | "n" | "0" => Ok(Some(false)),
            _ => Err(invalid(format!("'{}'", s.trim()))),
        },
        Some(other) => Err(invalid(describe(other).to_string())),
    }
}

/// Structured field such as a coordinate or a technician pair.
pub(crate) fn coerce_typed<T: DeserializeOwned>(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<T>, ValidationIssue> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| unreadable(field, format!("Unreadable {}: {}", field, e))),
    }
}

/// Error sink shared by the per-record validation results.
pub(crate) trait RecordIssues {
    fn add_error(&mut self, issue: ValidationIssue);

    /// Unwraps a coerced field, filing the issue when it did not read.
    fn accept<T>(&mut self, coerced: Result<Option<T>, ValidationIssue>) -> Option<T> {
        coerced.unwrap_or_else(|issue| {
            self.add_error(issue);
            None
        })
    }

    /// Text that must be present. A mistyped value is reported as such,
    /// not as missing.
    fn require_text(
        &mut self,
        value: Option<&Value>,
        field: &str,
        missing: &str,
    ) -> Option<String> {
        match coerce_text(value, field) {
            Ok(Some(text)) => Some(text),
            Ok(None) => {
                self.add_error(ValidationIssue::field(field, IssueKind::MissingField, missing));
                None
            }
            Err(issue) => {
                self.add_error(issue);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_string() {
        assert_eq!(value_as_string(&json!("  J1 ")), Some("J1".to_string()));
        assert_eq!(value_as_string(&json!(1042)), Some("1042".to_string()));
        assert_eq!(value_as_string(&json!("   ")), None);
        assert_eq!(value_as_string(&json!(null)), None);
        assert_eq!(value_as_string(&json!(true)), None);
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(coerce_text(Some(&json!(" Zone 3 ")), "zone"), Ok(Some("Zone 3".to_string())));
        assert_eq!(coerce_text(Some(&json!(3)), "zone"), Ok(Some("3".to_string())));
        assert_eq!(coerce_text(Some(&json!("")), "zone"), Ok(None));
        assert_eq!(coerce_text(None, "zone"), Ok(None));

        let issue = coerce_text(Some(&json!({"street": "Elm"})), "address").unwrap_err();
        assert_eq!(issue.field, "address");
        assert_eq!(issue.kind, IssueKind::InvalidFormat);
    }

    #[test]
    fn test_coerce_flag() {
        assert_eq!(coerce_flag(Some(&json!("true")), "f"), Ok(Some(true)));
        assert_eq!(coerce_flag(Some(&json!(" No ")), "f"), Ok(Some(false)));
        assert_eq!(coerce_flag(Some(&json!(1)), "f"), Ok(Some(true)));
        assert_eq!(coerce_flag(Some(&json!(false)), "f"), Ok(Some(false)));
        assert_eq!(coerce_flag(Some(&json!(null)), "f"), Ok(None));
        assert!(coerce_flag(Some(&json!("maybe")), "f").is_err());
        assert!(coerce_flag(Some(&json!(2)), "f").is_err());
        assert!(coerce_flag(Some(&json!([true])), "f").is_err());
    }

    #[test]
    fn test_coerce_typed() {
        let point: Option<crate::models::GeoPoint> =
            coerce_typed(Some(&json!({"lat": 40.0, "lon": -75.0})), "location").unwrap();
        assert!(point.is_some());
        let bad: Result<Option<crate::models::GeoPoint>, _> =
            coerce_typed(Some(&json!("north")), "location");
        assert_eq!(bad.unwrap_err().kind, IssueKind::InvalidFormat);
    }
}
