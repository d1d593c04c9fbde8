use std::collections::HashMap;

use crate::models::{GeoPoint, Location};

use super::{DriveTimeError, DriveTimeProvider, DriveTimeSource, ZoneDistanceHeuristic};

type PointKey = (u64, u64);

fn key(point: &GeoPoint) -> PointKey {
    (point.lat.to_bits(), point.lon.to_bits())
}

/// Travel times fetched for a fixed set of coordinates. Lookups for
/// locations outside the set, or for pairs with no route, go to the
/// heuristic.
#[derive(Debug, Clone)]
pub struct MatrixDriveTimes {
    index: HashMap<PointKey, usize>,
    minutes: Vec<Vec<Option<u32>>>,
    fallback: ZoneDistanceHeuristic,
}

impl MatrixDriveTimes {
    pub fn new(
        points: Vec<GeoPoint>,
        minutes: Vec<Vec<Option<u32>>>,
        fallback: ZoneDistanceHeuristic,
    ) -> Result<Self, DriveTimeError> {
        let n = points.len();
        if minutes.len() != n || minutes.iter().any(|row| row.len() != n) {
            return Err(DriveTimeError::InvalidResponse(format!(
                "expected a {n}x{n} matrix, got {} rows",
                minutes.len()
            )));
        }

        let index = points
            .iter()
            .enumerate()
            .map(|(i, p)| (key(p), i))
            .collect();

        Ok(Self {
            index,
            minutes,
            fallback,
        })
    }

    pub fn len(&self) -> usize {
        self.minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minutes.is_empty()
    }

    fn lookup(&self, from: &GeoPoint, to: &GeoPoint) -> Option<u32> {
        let i = *self.index.get(&key(from))?;
        let j = *self.index.get(&key(to))?;
        self.minutes[i][j]
    }
}

impl DriveTimeProvider for MatrixDriveTimes {
    fn minutes_between(&self, from: &Location, to: &Location) -> u32 {
        if let (Some(a), Some(b)) = (&from.point, &to.point) {
            if let Some(minutes) = self.lookup(a, b) {
                return minutes;
            }
        }
        self.fallback.minutes_between(from, to)
    }

    fn source(&self) -> DriveTimeSource {
        DriveTimeSource::Matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Zone;

    fn loc(zone: &str, point: Option<GeoPoint>) -> Location {
        Location::new(Zone::new(zone), point)
    }

    #[test]
    fn test_lookup_and_fallback() {
        let a = GeoPoint::new(40.0, -75.0);
        let b = GeoPoint::new(40.1, -75.1);
        let matrix = MatrixDriveTimes::new(
            vec![a, b],
            vec![vec![Some(0), Some(12)], vec![None, Some(0)]],
            ZoneDistanceHeuristic::default(),
        )
        .unwrap();

        assert_eq!(matrix.minutes_between(&loc("Zone 1", Some(a)), &loc("Zone 1", Some(b))), 12);
        // No route back: heuristic straight line.
        let back = matrix.minutes_between(&loc("Zone 1", Some(b)), &loc("Zone 1", Some(a)));
        assert_eq!(
            back,
            ZoneDistanceHeuristic::default().straight_line_minutes(&b, &a)
        );
        // Zone-only stop: zone heuristic.
        assert_eq!(matrix.minutes_between(&loc("Zone 1", Some(a)), &loc("Zone 2", None)), 25);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = MatrixDriveTimes::new(
            vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)],
            vec![vec![Some(0)]],
            ZoneDistanceHeuristic::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DriveTimeError::InvalidResponse(_)));
    }
}
