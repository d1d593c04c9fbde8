//! Staff roster validation.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jobs::check_window;
use super::safety::{scan_staff_record, SafetyWarning};
use super::{
    coerce_flag, coerce_text, coerce_typed, value_as_string, FlaggedRecord, InvalidRecord,
    IssueKind, RecordIssues, ValidationIssue,
};
use crate::models::{
    Capability, CapabilityGrant, CapabilitySet, GeoPoint, StaffType, TechId, Technician, Zone,
};

/// A staff member as it comes from the roster screen or an import. Fields
/// stay raw JSON until the validator reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStaffRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, alias = "displayName")]
    pub name: Option<Value>,
    #[serde(default, alias = "Zone")]
    pub zone: Option<Value>,
    #[serde(default, alias = "type", alias = "staff_type", alias = "category")]
    pub staff_type: Option<Value>,
    /// Capability name → flag. Values may be booleans, `null`, or strings
    /// such as `"yes"` / `"granted"`.
    #[serde(default)]
    pub capabilities: Option<Value>,
    #[serde(default)]
    pub available: Option<Value>,
    #[serde(default, alias = "shift_start")]
    pub shift_start: Option<Value>,
    #[serde(default, alias = "shift_end")]
    pub shift_end: Option<Value>,
    #[serde(default)]
    pub home: Option<Value>,
    #[serde(default, alias = "demo_crew")]
    pub demo_crew: Option<Value>,
}

impl RawStaffRecord {
    pub fn id_string(&self) -> Option<String> {
        self.id.as_ref().and_then(value_as_string)
    }
}

/// Storm Mode roster, grouped by category. Records that do not name their
/// own type take the type of the list they appear in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRoster {
    #[serde(default)]
    pub technicians: Vec<RawStaffRecord>,
    #[serde(default)]
    pub project_managers: Vec<RawStaffRecord>,
    #[serde(default)]
    pub ehq_leaders: Vec<RawStaffRecord>,
    #[serde(default, rename = "ehqCSStaff")]
    pub ehq_cs_staff: Vec<RawStaffRecord>,
    #[serde(default)]
    pub sub_contractors: Vec<RawStaffRecord>,
}

impl StaffRoster {
    pub fn into_records(self) -> Vec<RawStaffRecord> {
        let groups = [
            (self.technicians, "regularTech"),
            (self.project_managers, "projectManager"),
            (self.ehq_leaders, "ehqLeader"),
            (self.ehq_cs_staff, "ehqCSStaff"),
            (self.sub_contractors, "subContractor"),
        ];

        groups
            .into_iter()
            .flat_map(|(records, category)| {
                records.into_iter().map(move |mut record| {
                    if let Ok(None) = coerce_text(record.staff_type.as_ref(), "staffType") {
                        record.staff_type = Some(Value::String(category.to_string()));
                    }
                    record
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    pub safety_warnings: Vec<SafetyWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician: Option<Technician>,
}

impl StaffValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            safety_warnings: Vec::new(),
            technician: None,
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

impl RecordIssues for StaffValidationResult {
    fn add_error(&mut self, issue: ValidationIssue) {
        StaffValidationResult::add_error(self, issue);
    }
}

impl Default for StaffValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterValidation {
    pub technicians: Vec<Technician>,
    pub invalid_staff: Vec<InvalidRecord>,
    pub warnings: Vec<String>,
    pub flagged_records: Vec<FlaggedRecord>,
}

pub struct StaffValidator;

impl StaffValidator {
    pub fn validate_record(raw: &RawStaffRecord) -> StaffValidationResult {
        let mut result = StaffValidationResult::new();
        result.safety_warnings = scan_staff_record(raw);

        let id = result.require_text(raw.id.as_ref(), "id", "Staff ID is required");
        let name = result.require_text(raw.name.as_ref(), "name", "Name is required");

        let staff_type = match coerce_text(raw.staff_type.as_ref(), "staffType") {
            Err(issue) => {
                result.add_error(issue);
                None
            }
            Ok(None) => Some(StaffType::RegularTech),
            Ok(Some(text)) => {
                let parsed = StaffType::parse_lenient(&text);
                if parsed.is_none() {
                    result.add_error(ValidationIssue::field(
                        "staffType",
                        IssueKind::UnknownValue,
                        format!("Unknown staff type '{}'", text),
                    ));
                }
                parsed
            }
        };

        let capabilities = Self::parse_capabilities(raw, &mut result);

        // `None` marks a mistyped bound, already reported.
        let shift_start =
            result.accept(coerce_text(raw.shift_start.as_ref(), "shiftStart").map(Some));
        let shift_end = result.accept(coerce_text(raw.shift_end.as_ref(), "shiftEnd").map(Some));
        let shift = match (shift_start, shift_end) {
            (None, _) | (_, None) => None,
            (Some(None), Some(None)) => None,
            (Some(start), Some(end)) => {
                let mut issues = Vec::new();
                let window = check_window(start.as_deref(), end.as_deref(), &mut issues);
                for mut issue in issues {
                    issue.field = issue.field.replace("timeframe", "shift");
                    issue.message = format!("Shift {}", issue.message.to_lowercase());
                    result.add_error(issue);
                }
                window
            }
        };

        let zone = match coerce_text(raw.zone.as_ref(), "zone") {
            Ok(Some(zone)) => Zone::new(zone),
            Ok(None) => {
                result.add_warning(
                    "No zone set; every job will count as a zone mismatch".to_string(),
                );
                Zone::unzoned()
            }
            Err(issue) => {
                result.add_error(issue);
                Zone::unzoned()
            }
        };
        let available = result.accept(coerce_flag(raw.available.as_ref(), "available"));
        let demo_crew = result.accept(coerce_flag(raw.demo_crew.as_ref(), "demoCrew"));

        if let Some(staff_type) = staff_type {
            if staff_type.is_storm_role() && capabilities.is_empty() {
                result.add_warning(format!(
                    "{} has no capability map and will not be matched to any job",
                    staff_type
                ));
            }
        }

        let home = match result.accept(coerce_typed::<GeoPoint>(raw.home.as_ref(), "home")) {
            Some(point) if !point.is_valid() => {
                result.add_warning(format!(
                    "Ignoring out-of-range home coordinates ({}, {})",
                    point.lat, point.lon
                ));
                None
            }
            other => other,
        };

        if !result.is_valid {
            return result;
        }

        if let (Some(id), Some(name), Some(staff_type)) = (id, name, staff_type) {
            result.technician = Some(Technician {
                id: TechId::new(id),
                name,
                zone,
                staff_type,
                capabilities,
                available: available.unwrap_or(true),
                shift,
                home,
                demo_crew: demo_crew.unwrap_or(false),
            });
        }
        result
    }

    pub fn validate_roster(records: &[RawStaffRecord]) -> RosterValidation {
        let mut roster = RosterValidation::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, raw) in records.iter().enumerate() {
            let mut result = Self::validate_record(raw);
            let id = raw.id_string();

            if let Some(ref id) = id {
                if !seen.insert(id.clone()) {
                    result.add_error(ValidationIssue::field(
                        "id",
                        IssueKind::DuplicateId,
                        format!("Duplicate staff ID: {}", id),
                    ));
                    result.technician = None;
                }
            }

            let label = id.clone().unwrap_or_else(|| format!("#{}", index));
            for warning in result.warnings.drain(..) {
                roster.warnings.push(format!("Staff {}: {}", label, warning));
            }

            if !result.safety_warnings.is_empty() {
                roster.flagged_records.push(FlaggedRecord {
                    index,
                    id: id.clone(),
                    warnings: std::mem::take(&mut result.safety_warnings),
                });
            }

            match result.technician {
                Some(tech) if result.is_valid => roster.technicians.push(tech),
                _ => roster.invalid_staff.push(InvalidRecord {
                    index,
                    id,
                    errors: result.errors,
                }),
            }
        }

        log::debug!(
            "Validated {} staff records: {} usable, {} rejected",
            records.len(),
            roster.technicians.len(),
            roster.invalid_staff.len()
        );

        roster
    }

    fn parse_capabilities(
        raw: &RawStaffRecord,
        result: &mut StaffValidationResult,
    ) -> CapabilitySet {
        let mut set = CapabilitySet::default();
        let map = coerce_typed::<BTreeMap<String, Value>>(
            raw.capabilities.as_ref(),
            "capabilities",
        );
        let Some(map) = result.accept(map) else {
            return set;
        };

        for (key, value) in &map {
            let Some(capability) = capability_key(key) else {
                result.add_warning(format!("Ignoring unknown capability '{}'", key));
                continue;
            };
            match grant_value(value) {
                Some(grant) => set = set.with(capability, grant),
                None => result.add_warning(format!(
                    "Capability '{}' has unreadable value {}, leaving it unspecified",
                    key, value
                )),
            }
        }
        set
    }
}

fn capability_key(key: &str) -> Option<Capability> {
    let key: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "install" | "installdemo" => Some(Capability::Install),
        "cs" | "checkservice" => Some(Capability::Cs),
        "pull" | "pulls" => Some(Capability::Pull),
        "sub" | "subcrew" | "subcrews" => Some(Capability::Sub),
        _ => None,
    }
}

fn grant_value(value: &Value) -> Option<CapabilityGrant> {
    match value {
        Value::Null => Some(CapabilityGrant::Unspecified),
        Value::Bool(flag) => Some(CapabilityGrant::from(Some(*flag))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "granted" => Some(CapabilityGrant::Granted),
            "false" | "no" | "n" | "0" | "denied" => Some(CapabilityGrant::Denied),
            "" | "unspecified" => Some(CapabilityGrant::Unspecified),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawStaffRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_regular_tech_defaults() {
        let result = StaffValidator::validate_record(&raw(json!({
            "id": "T1", "name": "Alex", "zone": "Zone 1"
        })));
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
        let tech = result.technician.unwrap();
        assert_eq!(tech.staff_type, StaffType::RegularTech);
        assert!(tech.available);
        assert!(tech.capabilities.is_empty());
    }

    #[test]
    fn test_missing_fields_all_reported() {
        let result = StaffValidator::validate_record(&raw(json!({"type": "wizard"})));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_capability_map_three_states() {
        let result = StaffValidator::validate_record(&raw(json!({
            "id": 7,
            "name": "Pat",
            "zone": "Zone 2",
            "type": "projectManagers",
            "capabilities": {"install": true, "CS": "no", "pull": null, "teleport": true}
        })));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        let tech = result.technician.unwrap();
        assert_eq!(tech.id.as_str(), "7");
        assert_eq!(tech.staff_type, StaffType::ProjectManager);
        assert_eq!(tech.capabilities.install, CapabilityGrant::Granted);
        assert_eq!(tech.capabilities.cs, CapabilityGrant::Denied);
        assert_eq!(tech.capabilities.pull, CapabilityGrant::Unspecified);
    }

    #[test]
    fn test_storm_role_without_capabilities_warns() {
        let result = StaffValidator::validate_record(&raw(json!({
            "id": "L1", "name": "Lee", "zone": "Zone 1", "type": "ehqLeader"
        })));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_shift_validation() {
        let result = StaffValidator::validate_record(&raw(json!({
            "id": "T1", "name": "Alex", "zone": "Zone 1", "shiftStart": "16:00", "shiftEnd": "8:00"
        })));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].field, "shiftEnd");

        let result = StaffValidator::validate_record(&raw(json!({
            "id": "T1", "name": "Alex", "zone": "Zone 1", "shiftStart": "6:30"
        })));
        assert!(!result.is_valid);

        let tech = StaffValidator::validate_record(&raw(json!({
            "id": "T1", "name": "Alex", "zone": "Zone 1", "shiftStart": "6:30", "shiftEnd": "15:00"
        })))
        .technician
        .unwrap();
        assert_eq!(tech.shift.unwrap().to_string(), "06:30-15:00");
    }

    #[test]
    fn test_roster_categories_fill_type() {
        let roster: StaffRoster = serde_json::from_value(json!({
            "technicians": [{"id": "T1", "name": "Alex", "zone": "Zone 1"}],
            "projectManagers": [{"id": "P1", "name": "Pat", "zone": "Zone 1"}],
            "ehqCSStaff": [
                {"id": "C1", "name": "Cam", "zone": "Zone 1", "capabilities": {"cs": true}}
            ],
            "subContractors": [
                {"id": "S1", "name": "Sam", "zone": "Zone 1", "type": "regularTech"}
            ]
        }))
        .unwrap();

        let records = roster.into_records();
        let validation = StaffValidator::validate_roster(&records);
        let types: Vec<StaffType> = validation.technicians.iter().map(|t| t.staff_type).collect();
        assert_eq!(
            types,
            vec![
                StaffType::RegularTech,
                StaffType::ProjectManager,
                StaffType::EhqCsStaff,
                StaffType::RegularTech
            ]
        );
    }

    #[test]
    fn test_roster_duplicate_ids() {
        let records = vec![
            raw(json!({"id": "T1", "name": "Alex", "zone": "Zone 1"})),
            raw(json!({"id": "T1", "name": "Alex again", "zone": "Zone 1"})),
        ];
        let validation = StaffValidator::validate_roster(&records);
        assert_eq!(validation.technicians.len(), 1);
        assert_eq!(validation.invalid_staff[0].index, 1);
        assert_eq!(validation.invalid_staff[0].errors[0].kind, IssueKind::DuplicateId);
    }

    #[test]
    fn test_loose_values_are_coerced() {
        let tech = StaffValidator::validate_record(&raw(json!({
            "id": "T1",
            "name": 42,
            "Zone": 3,
            "available": "no",
            "demoCrew": 1
        })))
        .technician
        .unwrap();
        assert_eq!(tech.name, "42");
        assert_eq!(tech.zone.as_str(), "3");
        assert!(!tech.available);
        assert!(tech.demo_crew);
    }

    #[test]
    fn test_mistyped_record_rejected_alone() {
        let records: Vec<RawStaffRecord> = serde_json::from_value(json!([
            {"id": "T1", "name": "Alex", "zone": "Zone 1"},
            {"id": "T2", "name": ["Dana"], "zone": "Zone 1", "available": "sometimes",
             "capabilities": "all"}
        ]))
        .unwrap();

        let validation = StaffValidator::validate_roster(&records);

        assert_eq!(validation.technicians.len(), 1);
        assert_eq!(validation.technicians[0].id.as_str(), "T1");
        let rejected = &validation.invalid_staff[0];
        assert_eq!(rejected.id.as_deref(), Some("T2"));
        let fields: Vec<&str> = rejected.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "capabilities", "available"]);
        assert!(rejected.errors.iter().all(|e| e.kind == IssueKind::InvalidFormat));
    }
}
