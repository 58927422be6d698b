use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius (IUGG), kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Default search radius when the caller does not supply one.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Largest radius a proximity search accepts.
pub const MAX_RADIUS_KM: f64 = 500.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("latitude must be between -90 and 90")]
    Latitude,
    #[error("longitude must be between -180 and 180")]
    Longitude,
    #[error("radius_km must be greater than 0 and at most {MAX_RADIUS_KM}")]
    Radius,
}

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let point = Self { latitude, longitude };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), GeoError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoError::Latitude);
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoError::Longitude);
        }
        Ok(())
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Point) -> f64 {
        haversine_km(self, other)
    }
}

pub fn haversine_km(a: &Point, b: &Point) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn validate_radius(radius_km: f64) -> Result<(), GeoError> {
    if radius_km.is_finite() && radius_km > 0.0 && radius_km <= MAX_RADIUS_KM {
        Ok(())
    } else {
        Err(GeoError::Radius)
    }
}

/// Lat/lng rectangle enclosing a search circle. Used as a cheap indexed
/// prefilter before the exact distance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: &Point, radius_km: f64) -> Self {
        let dlat = (radius_km / EARTH_RADIUS_KM).to_degrees();
        let min_lat = center.latitude - dlat;
        let max_lat = center.latitude + dlat;

        // Near a pole every meridian is in range.
        if min_lat <= -90.0 || max_lat >= 90.0 {
            return Self {
                min_lat: min_lat.max(-90.0),
                max_lat: max_lat.min(90.0),
                min_lng: -180.0,
                max_lng: 180.0,
            };
        }

        // The circle is widest poleward of its center, not at the center's
        // latitude, so the half-width is asin(sin(d) / cos(lat)).
        let reach = (radius_km / EARTH_RADIUS_KM).sin() / center.latitude.to_radians().cos();
        if reach >= 1.0 {
            return Self { min_lat, max_lat, min_lng: -180.0, max_lng: 180.0 };
        }
        let dlng = reach.asin().to_degrees();
        let min_lng = center.longitude - dlng;
        let max_lng = center.longitude + dlng;

        // Crossing the antimeridian: widen instead of splitting the box.
        if min_lng < -180.0 || max_lng > 180.0 {
            return Self { min_lat, max_lat, min_lng: -180.0, max_lng: 180.0 };
        }

        Self { min_lat, max_lat, min_lng, max_lng }
    }

    pub fn contains(&self, point: &Point) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lng..=self.max_lng).contains(&point.longitude)
    }
}
