//! Great-circle distance between listing and viewer locations.

use serde::{Deserialize, Serialize};

use crate::constants::EARTH_RADIUS_MILES;
use crate::error::MarketError;

/// A device-reported location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MarketError> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), MarketError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(MarketError::validation(format!(
                "latitude out of range: {}",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(MarketError::validation(format!(
                "longitude out of range: {}",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Pair up two optional columns; a half-present location counts as absent.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn distance_miles(&self, other: &GeoPoint) -> f64 {
        haversine_miles(self, other)
    }
}

/// Haversine distance in miles.
pub fn haversine_miles(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_MILES * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(40.730, -73.935).unwrap();
        assert_eq!(haversine_miles(&p, &p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(40.730, -73.935).unwrap();
        let b = GeoPoint::new(34.052, -118.244).unwrap();
        let ab = haversine_miles(&a, &b);
        let ba = haversine_miles(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn short_campus_hop() {
        let post = GeoPoint::new(40.730, -73.935).unwrap();
        let viewer = GeoPoint::new(40.731, -73.936).unwrap();
        let d = post.distance_miles(&viewer);
        assert!(d > 0.05 && d < 0.1, "got {d}");
    }

    #[test]
    fn new_york_to_los_angeles() {
        let nyc = GeoPoint::new(40.7128, -74.0060).unwrap();
        let la = GeoPoint::new(34.0522, -118.2437).unwrap();
        let d = nyc.distance_miles(&la);
        assert!((d - 2445.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn out_of_range_coordinates_rejected() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
    }

    #[test]
    fn half_present_location_is_absent() {
        assert!(GeoPoint::from_parts(Some(1.0), None).is_none());
        assert!(GeoPoint::from_parts(None, Some(1.0)).is_none());
        assert!(GeoPoint::from_parts(Some(1.0), Some(2.0)).is_some());
    }
}
