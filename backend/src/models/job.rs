//! Validated job records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::location::{GeoPoint, Location, Zone};
use super::staff::{Capability, TechId};
use super::time::{TimeWindow, MINUTES_PER_HOUR};

crate::define_id_type!(JobId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    Install,
    Demo,
    DemoPrep,
    Check,
    Service,
    Pull,
    FsVisit,
    Other,
}

impl JobType {
    /// Case-insensitive; spaces, underscores and hyphens are interchangeable.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "install" => Some(JobType::Install),
            "demo" => Some(JobType::Demo),
            "demoprep" => Some(JobType::DemoPrep),
            "check" => Some(JobType::Check),
            "service" => Some(JobType::Service),
            "pull" => Some(JobType::Pull),
            "fsvisit" => Some(JobType::FsVisit),
            "other" => Some(JobType::Other),
            _ => None,
        }
    }

    /// Capability a technician needs for this job type; `None` for `Other`.
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            JobType::Install | JobType::Demo | JobType::DemoPrep => Some(Capability::Install),
            JobType::Check | JobType::Service | JobType::FsVisit => Some(Capability::Cs),
            JobType::Pull => Some(Capability::Pull),
            JobType::Other => None,
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, JobType::Demo | JobType::DemoPrep)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobType::Install => "Install",
            JobType::Demo => "Demo",
            JobType::DemoPrep => "Demo Prep",
            JobType::Check => "Check",
            JobType::Service => "Service",
            JobType::Pull => "Pull",
            JobType::FsVisit => "FS Visit",
            JobType::Other => "Other",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::parse_lenient(s).ok_or_else(|| format!("Unknown job type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Unassigned,
    Assigned,
}

/// Technicians on a job: one, or an unordered pair for two-tech jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssignedTechs {
    Single(TechId),
    Pair(TechId, TechId),
}

impl AssignedTechs {
    /// Builds a pair with a stable member order.
    pub fn pair(a: TechId, b: TechId) -> Self {
        if a <= b {
            AssignedTechs::Pair(a, b)
        } else {
            AssignedTechs::Pair(b, a)
        }
    }

    pub fn techs(&self) -> Vec<&TechId> {
        match self {
            AssignedTechs::Single(t) => vec![t],
            AssignedTechs::Pair(a, b) => vec![a, b],
        }
    }

    pub fn contains(&self, tech: &TechId) -> bool {
        match self {
            AssignedTechs::Single(t) => t == tech,
            AssignedTechs::Pair(a, b) => a == tech || b == tech,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AssignedTechs::Single(_) => 1,
            AssignedTechs::Pair(..) => 2,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, AssignedTechs::Pair(..))
    }
}

impl fmt::Display for AssignedTechs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignedTechs::Single(t) => write!(f, "{}", t),
            AssignedTechs::Pair(a, b) => write!(f, "{} + {}", a, b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub customer_name: String,
    pub address: String,
    pub zone: Zone,
    pub job_type: JobType,
    pub window: TimeWindow,
    pub duration_hours: f64,
    #[serde(default)]
    pub requires_two_techs: bool,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub assigned_tech: Option<AssignedTechs>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub description: String,
}

impl Job {
    pub fn duration_minutes(&self) -> u32 {
        (self.duration_hours * MINUTES_PER_HOUR as f64).round().max(1.0) as u32
    }

    pub fn required_capability(&self) -> Option<Capability> {
        self.job_type.required_capability()
    }

    /// Duration relative to window length. Higher means less slack.
    pub fn tightness(&self) -> f64 {
        let window = self.window.length_minutes().max(1) as f64;
        self.duration_minutes() as f64 / window
    }

    pub fn location(&self) -> Location {
        Location::new(self.zone.clone(), self.location)
    }

    pub fn techs_required(&self) -> usize {
        if self.requires_two_techs {
            2
        } else {
            1
        }
    }
}
