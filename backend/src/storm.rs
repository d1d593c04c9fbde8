//! Storm Mode filter: a read-only view narrowing the jobs and staff an
//! optimization run considers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capability::resolves_to;
use crate::models::{Capability, CapabilityGrant, Job, JobType, StaffType, Technician};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StormFilter {
    #[default]
    All,
    SubCrewsAndDemos,
    CheckServices,
    Installs,
    Pulls,
    RegularOnly,
}

impl StormFilter {
    pub const ALL_FILTERS: [StormFilter; 6] = [
        StormFilter::All,
        StormFilter::SubCrewsAndDemos,
        StormFilter::CheckServices,
        StormFilter::Installs,
        StormFilter::Pulls,
        StormFilter::RegularOnly,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StormFilter::All => "all",
            StormFilter::SubCrewsAndDemos => "subCrewsAndDemos",
            StormFilter::CheckServices => "checkServices",
            StormFilter::Installs => "installs",
            StormFilter::Pulls => "pulls",
            StormFilter::RegularOnly => "regularOnly",
        }
    }

    pub fn is_active(&self) -> bool {
        *self != StormFilter::All
    }

    pub fn job_visible(&self, job: &Job) -> bool {
        match self {
            StormFilter::All | StormFilter::RegularOnly => true,
            StormFilter::SubCrewsAndDemos => job.job_type.is_demo(),
            StormFilter::CheckServices => matches!(
                job.job_type,
                JobType::Check | JobType::Service | JobType::FsVisit
            ),
            StormFilter::Installs => matches!(
                job.job_type,
                JobType::Install | JobType::Demo | JobType::DemoPrep
            ),
            StormFilter::Pulls => job.job_type == JobType::Pull,
        }
    }

    pub fn staff_visible(&self, tech: &Technician) -> bool {
        match self {
            StormFilter::All => true,
            StormFilter::SubCrewsAndDemos => {
                tech.staff_type == StaffType::SubContractor
                    || tech.capabilities.sub == CapabilityGrant::Granted
            }
            StormFilter::CheckServices => resolves_to(tech, Capability::Cs),
            StormFilter::Installs => resolves_to(tech, Capability::Install),
            StormFilter::Pulls => resolves_to(tech, Capability::Pull),
            StormFilter::RegularOnly => tech.staff_type == StaffType::RegularTech,
        }
    }

    /// Splits the inputs into what the filter shows and how much it hid.
    /// Input order is preserved.
    pub fn apply<'a>(&self, jobs: &'a [Job], staff: &'a [Technician]) -> StormView<'a> {
        let visible_jobs: Vec<&Job> = jobs.iter().filter(|j| self.job_visible(j)).collect();
        let visible_staff: Vec<&Technician> =
            staff.iter().filter(|t| self.staff_visible(t)).collect();

        if self.is_active() {
            log::debug!(
                "Storm filter {}: {}/{} jobs, {}/{} staff visible",
                self,
                visible_jobs.len(),
                jobs.len(),
                visible_staff.len(),
                staff.len()
            );
        }

        StormView {
            filtered_out_jobs: jobs.len() - visible_jobs.len(),
            filtered_out_staff: staff.len() - visible_staff.len(),
            jobs: visible_jobs,
            staff: visible_staff,
        }
    }
}

impl fmt::Display for StormFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StormFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StormFilter::ALL_FILTERS
            .into_iter()
            .find(|f| f.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown storm filter: {}", s))
    }
}

#[derive(Debug, Clone)]
pub struct StormView<'a> {
    pub jobs: Vec<&'a Job>,
    pub staff: Vec<&'a Technician>,
    pub filtered_out_jobs: usize,
    pub filtered_out_staff: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobId, TimeOfDay, TimeWindow, Zone};

    fn job(id: &str, job_type: JobType) -> Job {
        Job {
            id: JobId::new(id),
            customer_name: "Acme".to_string(),
            address: "1 Main St".to_string(),
            zone: Zone::new("Zone 1"),
            job_type,
            window: TimeWindow::new(TimeOfDay::from_minutes(480), TimeOfDay::from_minutes(600))
                .unwrap(),
            duration_hours: 1.0,
            requires_two_techs: false,
            status: Default::default(),
            assigned_tech: None,
            location: None,
            description: String::new(),
        }
    }

    fn jobs() -> Vec<Job> {
        vec![
            job("install", JobType::Install),
            job("demo", JobType::Demo),
            job("prep", JobType::DemoPrep),
            job("check", JobType::Check),
            job("service", JobType::Service),
            job("fs", JobType::FsVisit),
            job("pull", JobType::Pull),
            job("other", JobType::Other),
        ]
    }

    fn ids(view: &StormView<'_>) -> Vec<String> {
        view.jobs.iter().map(|j| j.id.to_string()).collect()
    }

    #[test]
    fn test_job_visibility_table() {
        let jobs = jobs();
        let staff: Vec<Technician> = Vec::new();

        assert_eq!(StormFilter::All.apply(&jobs, &staff).jobs.len(), 8);
        assert_eq!(StormFilter::RegularOnly.apply(&jobs, &staff).jobs.len(), 8);
        assert_eq!(ids(&StormFilter::SubCrewsAndDemos.apply(&jobs, &staff)), ["demo", "prep"]);
        assert_eq!(
            ids(&StormFilter::CheckServices.apply(&jobs, &staff)),
            ["check", "service", "fs"]
        );
        assert_eq!(ids(&StormFilter::Installs.apply(&jobs, &staff)), ["install", "demo", "prep"]);

        let pulls = StormFilter::Pulls.apply(&jobs, &staff);
        assert_eq!(ids(&pulls), ["pull"]);
        assert_eq!(pulls.filtered_out_jobs, 7);
    }

    #[test]
    fn test_installs_filter_pm_vs_ehq_leader() {
        let staff = vec![
            Technician::new("PM1", "Pat", "Zone 1")
                .with_type(StaffType::ProjectManager)
                .with_capability(Capability::Install, true),
            Technician::new("L1", "Lee", "Zone 1")
                .with_type(StaffType::EhqLeader)
                .with_capability(Capability::Install, false),
        ];
        let view = StormFilter::Installs.apply(&[], &staff);
        assert_eq!(view.staff.len(), 1);
        assert_eq!(view.staff[0].id.as_str(), "PM1");
        assert_eq!(view.filtered_out_staff, 1);
    }

    #[test]
    fn test_staff_visibility() {
        let regular = Technician::new("T1", "Alex", "Zone 1");
        let sub = Technician::new("S1", "Sam", "Zone 1").with_type(StaffType::SubContractor);
        let pm_sub = Technician::new("P1", "Pat", "Zone 1")
            .with_type(StaffType::ProjectManager)
            .with_capability(Capability::Sub, true);
        let ehq_cs = Technician::new("C1", "Cam", "Zone 1").with_type(StaffType::EhqCsStaff);

        assert!(!StormFilter::SubCrewsAndDemos.staff_visible(&regular));
        assert!(StormFilter::SubCrewsAndDemos.staff_visible(&sub));
        assert!(StormFilter::SubCrewsAndDemos.staff_visible(&pm_sub));

        // Unspecified cs resolves open for regular techs, closed for storm roles.
        assert!(StormFilter::CheckServices.staff_visible(&regular));
        assert!(!StormFilter::CheckServices.staff_visible(&ehq_cs));

        assert!(StormFilter::RegularOnly.staff_visible(&regular));
        assert!(!StormFilter::RegularOnly.staff_visible(&sub));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&StormFilter::SubCrewsAndDemos).unwrap(),
            "\"subCrewsAndDemos\""
        );
        assert_eq!("regularonly".parse::<StormFilter>(), Ok(StormFilter::RegularOnly));
        assert!("everything".parse::<StormFilter>().is_err());
    }
}
