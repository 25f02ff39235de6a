//! Geolocation
//!
//! Position lookups are an external collaborator. The emulator only needs a
//! current fix for navigation routes and periodic location reports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A location as it appears on timeline items and location reports
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    /// Latitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Accuracy in metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Display name of the place
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Street address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    /// Create a location from coordinates
    #[must_use]
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    /// Both coordinates, if present
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(long)) => Some((lat, long)),
            _ => None,
        }
    }
}

/// Geolocation failures
#[derive(Debug, Error)]
pub enum LocationError {
    /// No position could be determined
    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

/// Source of the device's current position
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Resolve the current position
    async fn current(&self) -> Result<Location, LocationError>;
}

/// Geolocator that always reports the same fix (or none)
#[derive(Clone, Debug, Default)]
pub struct FixedGeolocator {
    fix: Option<Location>,
}

impl FixedGeolocator {
    /// Always report `location`
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            fix: Some(location),
        }
    }

    /// Never report a position
    #[must_use]
    pub fn unavailable() -> Self {
        Self { fix: None }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current(&self) -> Result<Location, LocationError> {
        self.fix
            .clone()
            .ok_or_else(|| LocationError::Unavailable("no fix configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_need_both_axes() {
        assert_eq!(Location::at(1.0, 2.0).coordinates(), Some((1.0, 2.0)));
        let half = Location {
            latitude: Some(1.0),
            ..Default::default()
        };
        assert_eq!(half.coordinates(), None);
    }

    #[tokio::test]
    async fn test_fixed_geolocator() {
        let geo = FixedGeolocator::new(Location::at(42.36, -71.1));
        assert_eq!(geo.current().await.unwrap(), Location::at(42.36, -71.1));
        assert!(FixedGeolocator::unavailable().current().await.is_err());
    }
}
