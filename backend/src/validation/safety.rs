//! Suspicious-payload scan for imported text fields.
//!
//! Findings are warnings for manual review. They never make a record invalid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jobs::RawJobRecord;
use super::staff::RawStaffRecord;

/// Longest value accepted without a warning for short fields.
pub const MAX_FIELD_LENGTH: usize = 500;
/// Longest description accepted without a warning.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

const SCRIPT_PATTERNS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "vbscript:",
    "<iframe",
    "<object",
    "<embed",
    "<svg",
    "<img",
    "onerror=",
    "onload=",
    "onclick=",
    "onmouseover=",
    "eval(",
    "document.cookie",
];

const SQL_PATTERNS: &[&str] = &[
    "drop table",
    "drop database",
    "delete from",
    "insert into",
    "truncate table",
    "union select",
    "union all select",
    "select * from",
    "exec(",
    "xp_cmdshell",
    "' or '1'='1",
    "' or 1=1",
    "\" or 1=1",
    "or 1=1--",
    "'; --",
    "';--",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafetyConcern {
    ScriptInjection,
    SqlPattern,
    ExcessiveLength,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyWarning {
    pub field: String,
    pub concern: SafetyConcern,
    pub message: String,
}

/// Scans one text value.
pub fn scan_text(field: &str, text: &str) -> Vec<SafetyWarning> {
    let mut warnings = Vec::new();
    // Collapse whitespace so "DROP    TABLE" still matches.
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    if let Some(pattern) = SCRIPT_PATTERNS.iter().find(|p| normalized.contains(*p)) {
        warnings.push(SafetyWarning {
            field: field.to_string(),
            concern: SafetyConcern::ScriptInjection,
            message: format!("Possible script/HTML injection ({})", pattern),
        });
    }

    if let Some(pattern) = SQL_PATTERNS.iter().find(|p| normalized.contains(*p)) {
        warnings.push(SafetyWarning {
            field: field.to_string(),
            concern: SafetyConcern::SqlPattern,
            message: format!("Possible SQL injection pattern ({})", pattern),
        });
    }

    let limit = if field == "description" {
        MAX_DESCRIPTION_LENGTH
    } else {
        MAX_FIELD_LENGTH
    };
    let length = text.chars().count();
    if length > limit {
        warnings.push(SafetyWarning {
            field: field.to_string(),
            concern: SafetyConcern::ExcessiveLength,
            message: format!("Value is {} characters long (limit {})", length, limit),
        });
    }

    warnings
}

fn scan_fields(fields: &[(&str, Option<&str>)]) -> Vec<SafetyWarning> {
    fields
        .iter()
        .filter_map(|(field, value)| value.map(|v| scan_text(field, v)))
        .flatten()
        .collect()
}

/// Only text values are scanned; mistyped fields are the validator's concern.
fn text(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str)
}

pub fn scan_job_record(raw: &RawJobRecord) -> Vec<SafetyWarning> {
    let id = raw.id_string();
    scan_fields(&[
        ("id", id.as_deref()),
        ("customerName", text(&raw.customer_name)),
        ("address", text(&raw.address)),
        ("zone", text(&raw.zone)),
        ("jobType", text(&raw.job_type)),
        ("description", text(&raw.description)),
    ])
}

pub fn scan_staff_record(raw: &RawStaffRecord) -> Vec<SafetyWarning> {
    let id = raw.id_string();
    scan_fields(&[("id", id.as_deref()), ("name", text(&raw.name)), ("zone", text(&raw.zone))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_has_no_warnings() {
        assert!(scan_text("address", "1204 Elm St, Apt 3").is_empty());
        let note = "Call before arrival; select tile in basement";
        assert!(scan_text("description", note).is_empty());
    }

    #[test]
    fn test_script_injection() {
        let w = scan_text("customerName", "<SCRIPT>alert(1)</SCRIPT>");
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].concern, SafetyConcern::ScriptInjection);
        assert!(!scan_text("address", "<img src=x onerror=alert(1)>").is_empty());
    }

    #[test]
    fn test_sql_patterns() {
        let w = scan_text("id", "1; DROP   TABLE jobs");
        assert_eq!(w[0].concern, SafetyConcern::SqlPattern);
        assert!(!scan_text("customerName", "x' OR '1'='1").is_empty());
    }

    #[test]
    fn test_length_limits_per_field() {
        let long = "a".repeat(MAX_FIELD_LENGTH + 1);
        let w = scan_text("address", &long);
        assert_eq!(w[0].concern, SafetyConcern::ExcessiveLength);
        assert!(scan_text("description", &long).is_empty());
    }

    #[test]
    fn test_scan_record_tags_field() {
        let raw = RawJobRecord {
            address: Some(Value::String("javascript:void(0)".to_string())),
            ..Default::default()
        };
        let w = scan_job_record(&raw);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].field, "address");
    }
}
