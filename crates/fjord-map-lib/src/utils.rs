//! Coordinate type and small geodesic helpers

use crate::{MapError, Result};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Earth's mean radius in meters
const EARTH_RADIUS_M: f64 = 6371000.0;

/// A WGS84 position in degrees
///
/// Serialized as `{"lat": .., "lng": ..}`, the shape used by the itinerary
/// files and by the persisted point-of-interest slot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters (Haversine formula)
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Whether both components are finite and inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<Point<f64>> for Coordinate {
    #[inline]
    fn from(point: Point<f64>) -> Self {
        Coordinate::new(point.y(), point.x())
    }
}

impl From<Coordinate> for Point<f64> {
    #[inline]
    fn from(coordinate: Coordinate) -> Self {
        Point::new(coordinate.longitude, coordinate.latitude)
    }
}

/// Parses `"<lat>,<lon>"`, as accepted on the command line
impl FromStr for Coordinate {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| MapError::InvalidCoordinate(format!("expected LAT,LON, got '{s}'")))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|e| MapError::InvalidCoordinate(format!("latitude '{lat}': {e}")))?;
        let longitude = lon
            .trim()
            .parse::<f64>()
            .map_err(|e| MapError::InvalidCoordinate(format!("longitude '{lon}': {e}")))?;

        let coordinate = Coordinate::new(latitude, longitude);
        if !coordinate.is_valid() {
            return Err(MapError::InvalidCoordinate(format!(
                "({latitude}, {longitude}) is out of range"
            )));
        }
        Ok(coordinate)
    }
}

/// Total length of a path in meters
pub fn path_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .sum()
}
