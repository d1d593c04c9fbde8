use crate::config::DriveTimeSettings;
use crate::models::{GeoPoint, Location};

use super::{DriveTimeProvider, DriveTimeSource};

/// Drive-time estimate that needs no external service.
///
/// With coordinates on both ends it uses the great-circle distance at a
/// fixed average speed. Otherwise it falls back on zone tags: a flat
/// intra-zone time, a per-step cost between numbered zones, and a flat
/// cross-zone time when the tags carry no number.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDistanceHeuristic {
    pub average_speed_kmh: f64,
    pub intra_zone_minutes: u32,
    pub per_zone_step_minutes: u32,
    pub cross_zone_minutes: u32,
}

impl ZoneDistanceHeuristic {
    pub fn from_settings(settings: &DriveTimeSettings) -> Self {
        Self {
            average_speed_kmh: settings.average_speed_kmh,
            intra_zone_minutes: settings.intra_zone_minutes,
            per_zone_step_minutes: settings.per_zone_step_minutes,
            cross_zone_minutes: settings.cross_zone_minutes,
        }
    }

    pub fn straight_line_minutes(&self, from: &GeoPoint, to: &GeoPoint) -> u32 {
        let hours = from.haversine_km(to) / self.average_speed_kmh;
        (hours * 60.0).ceil() as u32
    }

    pub fn zone_minutes(&self, from: &Location, to: &Location) -> u32 {
        if from.zone.matches(&to.zone) {
            return self.intra_zone_minutes;
        }
        match (from.zone.number(), to.zone.number()) {
            (Some(a), Some(b)) => {
                self.intra_zone_minutes + a.abs_diff(b) * self.per_zone_step_minutes
            }
            _ => self.cross_zone_minutes,
        }
    }
}

impl Default for ZoneDistanceHeuristic {
    fn default() -> Self {
        Self::from_settings(&DriveTimeSettings::default())
    }
}

impl DriveTimeProvider for ZoneDistanceHeuristic {
    fn minutes_between(&self, from: &Location, to: &Location) -> u32 {
        match (from.point, to.point) {
            (Some(a), Some(b)) if a.is_valid() && b.is_valid() => {
                self.straight_line_minutes(&a, &b)
            }
            _ => self.zone_minutes(from, to),
        }
    }

    fn source(&self) -> DriveTimeSource {
        DriveTimeSource::ZoneHeuristic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Zone;

    fn zone_only(zone: &str) -> Location {
        Location::zone_centroid(Zone::new(zone))
    }

    #[test]
    fn test_same_zone() {
        let h = ZoneDistanceHeuristic::default();
        assert_eq!(h.minutes_between(&zone_only("Zone 3"), &zone_only("zone 3")), 15);
    }

    #[test]
    fn test_numbered_zones_scale_with_distance() {
        let h = ZoneDistanceHeuristic::default();
        assert_eq!(h.minutes_between(&zone_only("Zone 1"), &zone_only("Zone 2")), 25);
        assert_eq!(h.minutes_between(&zone_only("Zone 4"), &zone_only("Zone 1")), 45);
    }

    #[test]
    fn test_named_zones_use_cross_zone_time() {
        let h = ZoneDistanceHeuristic::default();
        assert_eq!(h.minutes_between(&zone_only("North"), &zone_only("South")), 45);
        assert_eq!(h.minutes_between(&zone_only(""), &zone_only("")), 45);
    }

    #[test]
    fn test_coordinates_use_straight_line() {
        let h = ZoneDistanceHeuristic::default();
        let a = Location::new(Zone::new("Zone 1"), Some(GeoPoint::new(40.0, -75.0)));
        let b = Location::new(Zone::new("Zone 9"), Some(GeoPoint::new(40.2, -75.0)));
        // ~22.2 km at 48 km/h
        assert_eq!(h.minutes_between(&a, &b), 28);
        assert_eq!(h.minutes_between(&a, &a), 0);

        let zone_only_b = Location::new(Zone::new("Zone 1"), None);
        assert_eq!(h.minutes_between(&a, &zone_only_b), 15);
    }
}
