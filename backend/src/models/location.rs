//! Zones and geographic points.

use serde::{Deserialize, Serialize};

crate::define_id_type!(Zone);

impl Zone {
    /// Zone used when an import row carries no zone tag.
    pub fn unzoned() -> Self {
        Zone::new("")
    }

    pub fn is_unzoned(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Numeric part of tags such as `Zone 3` or `z12`.
    pub fn number(&self) -> Option<u32> {
        let digits: String = self
            .0
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    /// Case- and whitespace-insensitive comparison.
    pub fn matches(&self, other: &Zone) -> bool {
        if self.is_unzoned() || other.is_unzoned() {
            return false;
        }
        let normalize = |z: &Zone| {
            z.0.split_whitespace()
                .collect::<String>()
                .to_ascii_lowercase()
        };
        normalize(self) == normalize(other)
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance.
    pub fn haversine_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Where a technician is or where a job happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub zone: Zone,
    pub point: Option<GeoPoint>,
}

impl Location {
    pub fn new(zone: Zone, point: Option<GeoPoint>) -> Self {
        Self { zone, point }
    }

    pub fn zone_centroid(zone: Zone) -> Self {
        Self { zone, point: None }
    }
}
