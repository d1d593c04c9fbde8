//! Drive-time estimation between job sites and technician start points.
//!
//! The engine only sees [`DriveTimeProvider`]. Which implementation backs a
//! run is decided once, up front, by [`resolve`]: the zone-distance
//! heuristic, or a travel-time matrix fetched from an external service with
//! the heuristic covering any pair the matrix lacks. When the external
//! service cannot be used the run still proceeds on the heuristic and the
//! reason is reported as an [`ExternalServiceDegradation`].

mod heuristic;
mod matrix;

#[cfg(feature = "mapbox")]
pub mod mapbox;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{DriveTimeProviderKind, DriveTimeSettings};
use crate::models::{DegradationReason, ExternalServiceDegradation, GeoPoint, Location};

pub use heuristic::ZoneDistanceHeuristic;
pub use matrix::MatrixDriveTimes;

/// Minutes of driving between two locations.
pub trait DriveTimeProvider: Send + Sync {
    fn minutes_between(&self, from: &Location, to: &Location) -> u32;

    /// Where the numbers come from, for run metadata.
    fn source(&self) -> DriveTimeSource;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriveTimeSource {
    ZoneHeuristic,
    Matrix,
}

#[derive(Debug, thiserror::Error)]
pub enum DriveTimeError {
    #[error("Drive-time service rejected the token: {0}")]
    Unauthorized(String),

    #[error("Drive-time service unavailable: {0}")]
    Unavailable(String),

    #[error("Matrix request has {count} locations, the service accepts at most {max}")]
    TooManyLocations { count: usize, max: usize },

    #[error("Unexpected drive-time response: {0}")]
    InvalidResponse(String),
}

impl DriveTimeError {
    pub fn degradation_reason(&self) -> DegradationReason {
        match self {
            DriveTimeError::Unauthorized(_) => DegradationReason::Unauthorized,
            DriveTimeError::TooManyLocations { .. } => DegradationReason::TooManyLocations,
            DriveTimeError::Unavailable(_) | DriveTimeError::InvalidResponse(_) => {
                DegradationReason::Unavailable
            }
        }
    }
}

/// Point-to-point travel-time matrix from an external routing service.
#[async_trait]
pub trait MatrixService: Send + Sync {
    fn name(&self) -> &str;

    /// Row `i`, column `j` holds the minutes from `points[i]` to
    /// `points[j]`, or `None` when the service found no route.
    async fn matrix(&self, points: &[GeoPoint]) -> Result<Vec<Vec<Option<u32>>>, DriveTimeError>;
}

/// Provider chosen for a run plus why, if it is not the configured one.
#[derive(Clone)]
pub struct DriveTimeResolution {
    pub provider: Arc<dyn DriveTimeProvider>,
    pub degradation: Option<ExternalServiceDegradation>,
}

impl DriveTimeResolution {
    pub fn heuristic(settings: &DriveTimeSettings) -> Self {
        Self {
            provider: Arc::new(ZoneDistanceHeuristic::from_settings(settings)),
            degradation: None,
        }
    }

    fn degraded(
        settings: &DriveTimeSettings,
        provider: &str,
        reason: DegradationReason,
        detail: String,
    ) -> Self {
        log::warn!("Drive times degraded to zone heuristic: {} ({})", reason, detail);
        Self {
            provider: Arc::new(ZoneDistanceHeuristic::from_settings(settings)),
            degradation: Some(ExternalServiceDegradation {
                provider: provider.to_string(),
                reason,
                detail,
            }),
        }
    }
}

/// Unique valid coordinates among `points`, in first-seen order.
pub fn distinct_points(points: impl IntoIterator<Item = GeoPoint>) -> Vec<GeoPoint> {
    let mut seen = std::collections::HashSet::new();
    points
        .into_iter()
        .filter(GeoPoint::is_valid)
        .filter(|p| seen.insert((p.lat.to_bits(), p.lon.to_bits())))
        .collect()
}

/// Picks the provider for a run. `service` is the configured external
/// client, or `None` when none could be built.
pub async fn resolve_with(
    settings: &DriveTimeSettings,
    service: Option<&dyn MatrixService>,
    points: &[GeoPoint],
) -> DriveTimeResolution {
    if settings.provider == DriveTimeProviderKind::Heuristic {
        return DriveTimeResolution::heuristic(settings);
    }

    let provider_name = service.map_or("mapbox", |s| s.name()).to_string();

    if settings.token().is_none() {
        return DriveTimeResolution::degraded(
            settings,
            &provider_name,
            DegradationReason::NotConfigured,
            "no access token configured".to_string(),
        );
    }

    let Some(service) = service else {
        return DriveTimeResolution::degraded(
            settings,
            &provider_name,
            DegradationReason::FeatureDisabled,
            "built without the mapbox feature".to_string(),
        );
    };

    let points = distinct_points(points.iter().copied());
    if points.len() < 2 {
        // Nothing to ask the service; the heuristic covers zone-only stops.
        return DriveTimeResolution::heuristic(settings);
    }
    if points.len() > settings.max_matrix_locations {
        return DriveTimeResolution::degraded(
            settings,
            &provider_name,
            DegradationReason::TooManyLocations,
            format!(
                "{} locations, limit {}",
                points.len(),
                settings.max_matrix_locations
            ),
        );
    }

    match service.matrix(&points).await {
        Ok(minutes) => match MatrixDriveTimes::new(
            points,
            minutes,
            ZoneDistanceHeuristic::from_settings(settings),
        ) {
            Ok(matrix) => {
                log::info!(
                    "Using {} drive-time matrix for {} locations",
                    provider_name,
                    matrix.len()
                );
                DriveTimeResolution {
                    provider: Arc::new(matrix),
                    degradation: None,
                }
            }
            Err(err) => DriveTimeResolution::degraded(
                settings,
                &provider_name,
                err.degradation_reason(),
                err.to_string(),
            ),
        },
        Err(err) => DriveTimeResolution::degraded(
            settings,
            &provider_name,
            err.degradation_reason(),
            err.to_string(),
        ),
    }
}

/// Resolves with the compiled-in external client, if any.
pub async fn resolve(settings: &DriveTimeSettings, points: &[GeoPoint]) -> DriveTimeResolution {
    #[cfg(feature = "mapbox")]
    {
        if settings.provider == DriveTimeProviderKind::Mapbox {
            if let Some(token) = settings.token() {
                match mapbox::MapboxClient::new(settings, token) {
                    Ok(client) => return resolve_with(settings, Some(&client), points).await,
                    Err(err) => {
                        return DriveTimeResolution::degraded(
                            settings,
                            "mapbox",
                            err.degradation_reason(),
                            err.to_string(),
                        )
                    }
                }
            }
        }
    }
    resolve_with(settings, None, points).await
}
