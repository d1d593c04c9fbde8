//! Optimizer configuration file support.
//!
//! Configuration is read from TOML. Every field has a default, so an empty
//! file (or no file at all) yields a working heuristic-only setup.
//!
//! ```toml
//! [weights]
//! zone_mismatch = 30.0
//! drive_minutes = 1.0
//! load_hours = 10.0
//! demo_pair_bonus = 15.0
//!
//! [routing]
//! two_opt_max_iterations = 200
//! travel_buffer_minutes = 10
//! shift_start = "07:00"
//! shift_end = "19:00"
//! zone_policy = "prefer"
//!
//! [drive_time]
//! provider = "mapbox"
//! mapbox_token = "pk.xxx"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{TimeOfDay, TimeWindow};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Cost-function weights for the assignment engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Flat penalty when technician and job zones differ.
    #[serde(default = "default_zone_mismatch")]
    pub zone_mismatch: f64,
    /// Cost per minute of added drive time.
    #[serde(default = "default_drive_minutes")]
    pub drive_minutes: f64,
    /// Cost per hour of work already on the technician's route.
    #[serde(default = "default_load_hours")]
    pub load_hours: f64,
    /// Discount for pairing two demo-crew techs on a demo job.
    #[serde(default = "default_demo_pair_bonus")]
    pub demo_pair_bonus: f64,
}

fn default_zone_mismatch() -> f64 {
    30.0
}

fn default_drive_minutes() -> f64 {
    1.0
}

fn default_load_hours() -> f64 {
    10.0
}

fn default_demo_pair_bonus() -> f64 {
    15.0
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            zone_mismatch: default_zone_mismatch(),
            drive_minutes: default_drive_minutes(),
            load_hours: default_load_hours(),
            demo_pair_bonus: default_demo_pair_bonus(),
        }
    }
}

/// Whether zone affinity is a cost or a hard rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonePolicy {
    #[default]
    Prefer,
    Require,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Upper bound on accepted 2-opt moves per route.
    #[serde(default = "default_two_opt_max_iterations")]
    pub two_opt_max_iterations: u32,
    /// Slack added to every drive leg after the first.
    #[serde(default = "default_travel_buffer_minutes")]
    pub travel_buffer_minutes: u32,
    #[serde(default = "default_shift_start")]
    pub shift_start: TimeOfDay,
    #[serde(default = "default_shift_end")]
    pub shift_end: TimeOfDay,
    #[serde(default)]
    pub zone_policy: ZonePolicy,
}

fn default_two_opt_max_iterations() -> u32 {
    200
}

fn default_travel_buffer_minutes() -> u32 {
    10
}

fn default_shift_start() -> TimeOfDay {
    TimeOfDay::from_minutes(7 * 60)
}

fn default_shift_end() -> TimeOfDay {
    TimeOfDay::from_minutes(19 * 60)
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            two_opt_max_iterations: default_two_opt_max_iterations(),
            travel_buffer_minutes: default_travel_buffer_minutes(),
            shift_start: default_shift_start(),
            shift_end: default_shift_end(),
            zone_policy: ZonePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveTimeProviderKind {
    #[default]
    Heuristic,
    Mapbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveTimeSettings {
    #[serde(default)]
    pub provider: DriveTimeProviderKind,
    #[serde(default)]
    pub mapbox_token: Option<String>,
    #[serde(default = "default_mapbox_base_url")]
    pub mapbox_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Mapbox matrix requests accept at most 25 coordinates.
    #[serde(default = "default_max_matrix_locations")]
    pub max_matrix_locations: usize,
    /// Straight-line speed used when both ends have coordinates.
    #[serde(default = "default_average_speed_kmh")]
    pub average_speed_kmh: f64,
    #[serde(default = "default_intra_zone_minutes")]
    pub intra_zone_minutes: u32,
    #[serde(default = "default_per_zone_step_minutes")]
    pub per_zone_step_minutes: u32,
    /// Used between zones whose tags carry no number.
    #[serde(default = "default_cross_zone_minutes")]
    pub cross_zone_minutes: u32,
}

fn default_mapbox_base_url() -> String {
    "https://api.mapbox.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_matrix_locations() -> usize {
    25
}

fn default_average_speed_kmh() -> f64 {
    48.0
}

fn default_intra_zone_minutes() -> u32 {
    15
}

fn default_per_zone_step_minutes() -> u32 {
    10
}

fn default_cross_zone_minutes() -> u32 {
    45
}

impl Default for DriveTimeSettings {
    fn default() -> Self {
        Self {
            provider: DriveTimeProviderKind::default(),
            mapbox_token: None,
            mapbox_base_url: default_mapbox_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_matrix_locations: default_max_matrix_locations(),
            average_speed_kmh: default_average_speed_kmh(),
            intra_zone_minutes: default_intra_zone_minutes(),
            per_zone_step_minutes: default_per_zone_step_minutes(),
            cross_zone_minutes: default_cross_zone_minutes(),
        }
    }
}

impl DriveTimeSettings {
    /// Token, ignoring blank strings.
    pub fn token(&self) -> Option<&str> {
        self.mapbox_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub weights: CostWeights,
    #[serde(default)]
    pub routing: RoutingSettings,
    #[serde(default)]
    pub drive_time: DriveTimeSettings,
}

impl OptimizerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: OptimizerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Searches for `optimizer.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Option<Self>, ConfigError> {
        let search_paths = [
            PathBuf::from("optimizer.toml"),
            PathBuf::from("backend/optimizer.toml"),
            PathBuf::from("../optimizer.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// `DISPATCH_CONFIG` path if set, otherwise the default search, otherwise
    /// built-in defaults. Environment overrides are applied last.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("DISPATCH_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::from_default_location()?.unwrap_or_default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `MAPBOX_TOKEN` wins over the file and switches the provider to Mapbox.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = env::var("MAPBOX_TOKEN") {
            self.set_drive_time_token(Some(token));
        }
    }

    /// Sets or clears the drive-time token. A blank token clears it.
    pub fn set_drive_time_token(&mut self, token: Option<String>) {
        match token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(token) => {
                self.drive_time.mapbox_token = Some(token);
                self.drive_time.provider = DriveTimeProviderKind::Mapbox;
            }
            None => {
                self.drive_time.mapbox_token = None;
                self.drive_time.provider = DriveTimeProviderKind::Heuristic;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        for (name, value) in [
            ("weights.zone_mismatch", w.zone_mismatch),
            ("weights.drive_minutes", w.drive_minutes),
            ("weights.load_hours", w.load_hours),
            ("weights.demo_pair_bonus", w.demo_pair_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.routing.two_opt_max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "routing.two_opt_max_iterations must be at least 1".to_string(),
            ));
        }
        if self.routing.shift_start >= self.routing.shift_end {
            return Err(ConfigError::Invalid(format!(
                "routing.shift_start {} must be before routing.shift_end {}",
                self.routing.shift_start, self.routing.shift_end
            )));
        }
        let speed = self.drive_time.average_speed_kmh;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::Invalid(
                "drive_time.average_speed_kmh must be positive".to_string(),
            ));
        }
        if self.drive_time.max_matrix_locations < 2 {
            return Err(ConfigError::Invalid(
                "drive_time.max_matrix_locations must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_shift(&self) -> TimeWindow {
        TimeWindow {
            start: self.routing.shift_start,
            end: self.routing.shift_end,
        }
    }
}
