//! Place records supplied by the place-lookup collaborator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;
/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors raised when a place cannot become a geofence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaceError {
    #[error("Place id must not be empty")]
    EmptyId,

    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),
}

/// A named place to monitor.
///
/// Mirrors the `{id, lat, lon}` records produced by the place lookup, so a JSON
/// array of places deserializes straight into `Vec<PlaceRecord>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// Stable place identifier; becomes the geofence request id.
    pub id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl PlaceRecord {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
        }
    }

    /// Check that the record can be turned into a geofence.
    pub fn validate(&self) -> Result<(), PlaceError> {
        if self.id.is_empty() {
            return Err(PlaceError::EmptyId);
        }
        // NaN fails both range checks
        if !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(PlaceError::InvalidLatitude(self.lat));
        }
        if !(MIN_LON..=MAX_LON).contains(&self.lon) {
            return Err(PlaceError::InvalidLongitude(self.lon));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_place() {
        let place = PlaceRecord::new("ChIJ-hamburg", 53.5511, 9.9937);
        assert!(place.validate().is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let place = PlaceRecord::new("", 0.0, 0.0);
        assert_eq!(place.validate(), Err(PlaceError::EmptyId));
    }

    #[test]
    fn test_invalid_latitude() {
        let result = PlaceRecord::new("north", 90.5, 0.0).validate();
        assert!(matches!(result, Err(PlaceError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = PlaceRecord::new("east", 0.0, -180.1).validate();
        assert!(matches!(result, Err(PlaceError::InvalidLongitude(_))));
    }

    #[test]
    fn test_nan_coordinates_rejected() {
        let result = PlaceRecord::new("nan", f64::NAN, 0.0).validate();
        assert!(matches!(result, Err(PlaceError::InvalidLatitude(_))));
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"[{"id":"A","lat":1.0,"lon":1.0},{"id":"B","lat":2.5,"lon":-2.5}]"#;
        let places: Vec<PlaceRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[1], PlaceRecord::new("B", 2.5, -2.5));
    }
}
