//! Great-circle distance on a spherical Earth.

use serde::{Deserialize, Serialize};

use crate::SpatialError;

/// Mean Earth radius used by the Haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = SpatialError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Creates a coordinate, rejecting latitudes outside `[-90, 90]`,
    /// longitudes outside `[-180, 180]`, and non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CoordinateOutOfRange`] for invalid input.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SpatialError> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(SpatialError::CoordinateOutOfRange {
                latitude,
                longitude,
            })
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.longitude
    }
}

/// Haversine distance between two coordinates, in kilometres.
#[must_use]
pub fn haversine_km(origin: Coordinate, destination: Coordinate) -> f64 {
    let d_lat = (destination.latitude - origin.latitude).to_radians();
    let d_lon = (destination.longitude - origin.longitude).to_radians();

    let half_lat = (d_lat / 2.0).sin();
    let half_lon = (d_lon / 2.0).sin();

    let a = origin.latitude.to_radians().cos()
        * destination.latitude.to_radians().cos()
        * half_lon
        * half_lon
        + half_lat * half_lat;
    // Rounding can push `a` a hair past 1 for antipodal points.
    let a = a.min(1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance between two `(latitude, longitude)` pairs.
///
/// # Errors
///
/// Returns [`SpatialError::CoordinateOutOfRange`] if either point is
/// outside WGS84 bounds.
pub fn distance_km(origin: (f64, f64), destination: (f64, f64)) -> Result<f64, SpatialError> {
    let origin = Coordinate::new(origin.0, origin.1)?;
    let destination = Coordinate::new(destination.0, destination.1)?;
    Ok(haversine_km(origin, destination))
}

/// Renders the Haversine formula as a SQL expression.
///
/// Arguments are SQL expressions (column names or literals) in degrees.
/// The result is in kilometres and matches [`haversine_km`] up to
/// floating-point evaluation order.
#[must_use]
pub fn haversine_sql(lat1: &str, lon1: &str, lat2: &str, lon2: &str) -> String {
    let a = format!(
        "least(pow(sin(radians({lat2} - {lat1}) / 2), 2) \
         + cos(radians({lat1})) * cos(radians({lat2})) \
         * pow(sin(radians({lon2} - {lon1}) / 2), 2), 1.0)"
    );
    format!(
        "({radius} * 2 * atan2(sqrt({a}), sqrt(1 - {a})))",
        radius = crate::sql_f64(EARTH_RADIUS_KM)
    )
}
