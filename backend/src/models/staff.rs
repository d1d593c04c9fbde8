//! Technician / staff roster records.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::location::{GeoPoint, Location, Zone};
use super::time::TimeWindow;

crate::define_id_type!(TechId);

/// Staff category. Everything except `RegularTech` is a Storm Mode surge role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StaffType {
    RegularTech,
    ProjectManager,
    EhqLeader,
    #[serde(rename = "ehqCSStaff")]
    EhqCsStaff,
    SubContractor,
}

impl StaffType {
    pub fn is_storm_role(&self) -> bool {
        !matches!(self, StaffType::RegularTech)
    }

    /// Accepts the roster spellings, including the plural Storm Mode
    /// category keys (`projectManagers`, `ehqLeaders`, ...).
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "" | "regular" | "regulartech" | "tech" | "technician" | "technicians" => {
                Some(StaffType::RegularTech)
            }
            "pm" | "projectmanager" | "projectmanagers" => Some(StaffType::ProjectManager),
            "ehqleader" | "ehqleaders" => Some(StaffType::EhqLeader),
            "ehqcsstaff" | "ehqcs" => Some(StaffType::EhqCsStaff),
            "sub" | "subs" | "subcontractor" | "subcontractors" => Some(StaffType::SubContractor),
            _ => None,
        }
    }
}

impl fmt::Display for StaffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StaffType::RegularTech => "Regular Tech",
            StaffType::ProjectManager => "Project Manager",
            StaffType::EhqLeader => "EHQ Leader",
            StaffType::EhqCsStaff => "EHQ CS Staff",
            StaffType::SubContractor => "Sub-Contractor",
        };
        f.write_str(label)
    }
}

/// Capability flags. Independent booleans, not a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Install,
    Cs,
    Pull,
    Sub,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Install,
        Capability::Cs,
        Capability::Pull,
        Capability::Sub,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Capability::Install => "install",
            Capability::Cs => "cs",
            Capability::Pull => "pull",
            Capability::Sub => "sub",
        }
    }

    /// Operator-facing label used in capability warnings.
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Install => "Install/Demo",
            Capability::Cs => "CS (Check/Service)",
            Capability::Pull => "Pull",
            Capability::Sub => "Sub Crew",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Three-state capability flag. `Unspecified` is resolved by staff type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityGrant {
    Granted,
    Denied,
    #[default]
    Unspecified,
}

impl From<Option<bool>> for CapabilityGrant {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => CapabilityGrant::Granted,
            Some(false) => CapabilityGrant::Denied,
            None => CapabilityGrant::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub install: CapabilityGrant,
    #[serde(default)]
    pub cs: CapabilityGrant,
    #[serde(default)]
    pub pull: CapabilityGrant,
    #[serde(default)]
    pub sub: CapabilityGrant,
}

impl CapabilitySet {
    pub fn get(&self, capability: Capability) -> CapabilityGrant {
        match capability {
            Capability::Install => self.install,
            Capability::Cs => self.cs,
            Capability::Pull => self.pull,
            Capability::Sub => self.sub,
        }
    }

    pub fn with(mut self, capability: Capability, grant: CapabilityGrant) -> Self {
        match capability {
            Capability::Install => self.install = grant,
            Capability::Cs => self.cs = grant,
            Capability::Pull => self.pull = grant,
            Capability::Sub => self.sub = grant,
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        Capability::ALL
            .iter()
            .all(|c| self.get(*c) == CapabilityGrant::Unspecified)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: TechId,
    pub name: String,
    pub zone: Zone,
    #[serde(rename = "type")]
    pub staff_type: StaffType,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    pub available: bool,
    /// Working window; `None` falls back to the configured default shift.
    #[serde(default)]
    pub shift: Option<TimeWindow>,
    /// Route start point; `None` starts from the zone centroid.
    #[serde(default)]
    pub home: Option<GeoPoint>,
    /// Member of a demo crew, preferred when pairing demo jobs.
    #[serde(default)]
    pub demo_crew: bool,
}

impl Technician {
    pub fn new(id: impl Into<String>, name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            id: TechId::new(id),
            name: name.into(),
            zone: Zone::new(zone),
            staff_type: StaffType::RegularTech,
            capabilities: CapabilitySet::default(),
            available: true,
            shift: None,
            home: None,
            demo_crew: false,
        }
    }

    pub fn with_type(mut self, staff_type: StaffType) -> Self {
        self.staff_type = staff_type;
        self
    }

    pub fn with_capability(mut self, capability: Capability, granted: bool) -> Self {
        self.capabilities = self
            .capabilities
            .with(capability, CapabilityGrant::from(Some(granted)));
        self
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn with_shift(mut self, shift: TimeWindow) -> Self {
        self.shift = Some(shift);
        self
    }

    pub fn with_home(mut self, home: GeoPoint) -> Self {
        self.home = Some(home);
        self
    }

    pub fn with_demo_crew(mut self, demo_crew: bool) -> Self {
        self.demo_crew = demo_crew;
        self
    }

    pub fn start_location(&self) -> Location {
        Location::new(self.zone.clone(), self.home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_type_roster_aliases() {
        assert_eq!(StaffType::parse_lenient("projectManagers"), Some(StaffType::ProjectManager));
        assert_eq!(StaffType::parse_lenient("EHQ Leaders"), Some(StaffType::EhqLeader));
        assert_eq!(StaffType::parse_lenient("ehqCSStaff"), Some(StaffType::EhqCsStaff));
        assert_eq!(StaffType::parse_lenient("sub-contractors"), Some(StaffType::SubContractor));
        assert_eq!(StaffType::parse_lenient(""), Some(StaffType::RegularTech));
        assert_eq!(StaffType::parse_lenient("astronaut"), None);
    }

    #[test]
    fn test_storm_roles() {
        assert!(!StaffType::RegularTech.is_storm_role());
        assert!(StaffType::ProjectManager.is_storm_role());
        assert!(StaffType::SubContractor.is_storm_role());
    }

    #[test]
    fn test_staff_type_wire_names() {
        assert_eq!(serde_json::to_string(&StaffType::EhqCsStaff).unwrap(), "\"ehqCSStaff\"");
        assert_eq!(serde_json::to_string(&StaffType::RegularTech).unwrap(), "\"regularTech\"");
    }

    #[test]
    fn test_grant_from_optional_flag() {
        assert_eq!(CapabilityGrant::from(Some(true)), CapabilityGrant::Granted);
        assert_eq!(CapabilityGrant::from(Some(false)), CapabilityGrant::Denied);
        assert_eq!(CapabilityGrant::from(None), CapabilityGrant::Unspecified);
    }

    #[test]
    fn test_capability_set_builder() {
        let caps = CapabilitySet::default().with(Capability::Pull, CapabilityGrant::Granted);
        assert_eq!(caps.get(Capability::Pull), CapabilityGrant::Granted);
        assert_eq!(caps.get(Capability::Install), CapabilityGrant::Unspecified);
        assert!(!caps.is_empty());
        assert!(CapabilitySet::default().is_empty());
    }

    #[test]
    fn test_missing_capability_fields_deserialize_unspecified() {
        let caps: CapabilitySet = serde_json::from_str(r#"{"install":"granted"}"#).unwrap();
        assert_eq!(caps.install, CapabilityGrant::Granted);
        assert_eq!(caps.cs, CapabilityGrant::Unspecified);
    }
}
