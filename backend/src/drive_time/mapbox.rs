//! Mapbox Directions Matrix client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::DriveTimeSettings;
use crate::models::GeoPoint;

use super::{DriveTimeError, MatrixService};

const PROFILE: &str = "mapbox/driving";

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    /// Seconds, row-major, `null` where no route exists.
    #[serde(default)]
    durations: Option<Vec<Vec<Option<f64>>>>,
}

pub struct MapboxClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_locations: usize,
}

impl MapboxClient {
    pub fn new(settings: &DriveTimeSettings, token: &str) -> Result<Self, DriveTimeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| {
                DriveTimeError::Unavailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: settings.mapbox_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            max_locations: settings.max_matrix_locations,
        })
    }

    fn url(&self, points: &[GeoPoint]) -> String {
        let coordinates = points
            .iter()
            .map(|p| format!("{},{}", p.lon, p.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!("{}/directions-matrix/v1/{}/{}", self.base_url, PROFILE, coordinates)
    }
}

fn to_minutes(seconds: Option<f64>) -> Option<u32> {
    seconds
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| (s / 60.0).ceil() as u32)
}

#[async_trait]
impl MatrixService for MapboxClient {
    fn name(&self) -> &str {
        "mapbox"
    }

    async fn matrix(&self, points: &[GeoPoint]) -> Result<Vec<Vec<Option<u32>>>, DriveTimeError> {
        if points.len() > self.max_locations {
            return Err(DriveTimeError::TooManyLocations {
                count: points.len(),
                max: self.max_locations,
            });
        }

        let response = self
            .http
            .get(self.url(points))
            .query(&[("annotations", "duration"), ("access_token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| DriveTimeError::Unavailable(format!("Matrix request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<empty response>".to_string());

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DriveTimeError::Unauthorized(format!("{}", status)));
        }
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(DriveTimeError::TooManyLocations {
                count: points.len(),
                max: self.max_locations,
            });
        }
        if !status.is_success() {
            return Err(DriveTimeError::Unavailable(format!(
                "Matrix request failed ({}): {}",
                status,
                body.trim()
            )));
        }

        let parsed: MatrixResponse = serde_json::from_str(&body)
            .map_err(|e| DriveTimeError::InvalidResponse(format!("{} ({})", e, body.trim())))?;

        if parsed.code != "Ok" {
            return Err(DriveTimeError::InvalidResponse(format!(
                "{}: {}",
                parsed.code,
                parsed.message.unwrap_or_default()
            )));
        }

        let durations = parsed
            .durations
            .ok_or_else(|| DriveTimeError::InvalidResponse("missing durations".to_string()))?;

        Ok(durations
            .into_iter()
            .map(|row| row.into_iter().map(to_minutes).collect())
            .collect())
    }
}
