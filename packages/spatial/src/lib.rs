#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometric primitives used as filter and compute steps by the registry
//! queries.
//!
//! Provides a validated [`BoundaryPolygon`] with a point-in-polygon test,
//! and the Haversine great-circle distance between two [`Coordinate`]s.
//! Both are pure functions over immutable inputs and are safe to evaluate
//! from any number of threads. Distances can also be rendered as a SQL
//! expression so the declarative engine evaluates the same formula.

pub mod distance;
pub mod polygon;

pub use distance::{Coordinate, EARTH_RADIUS_KM, distance_km, haversine_km, haversine_sql};
pub use polygon::BoundaryPolygon;

use thiserror::Error;

/// Errors raised when constructing geometric inputs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialError {
    /// Polygon vertices do not describe a usable ring.
    #[error("Invalid polygon: {message}")]
    InvalidPolygon {
        /// Description of what went wrong.
        message: String,
    },

    /// Latitude or longitude outside WGS84 bounds (or not finite).
    #[error("Coordinate out of range: latitude={latitude}, longitude={longitude}")]
    CoordinateOutOfRange {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },

    /// Geometry text could not be parsed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },
}

/// Formats an `f64` as an unambiguous SQL `DOUBLE` literal.
///
/// Uses the shortest round-trip representation so the SQL engine sees the
/// exact same value as the host code.
#[must_use]
pub fn sql_f64(value: f64) -> String {
    format!("CAST({value:?} AS DOUBLE)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_literal_round_trips() {
        assert_eq!(sql_f64(-53.532_507_2), "CAST(-53.5325072 AS DOUBLE)");
        assert_eq!(sql_f64(1.0), "CAST(1.0 AS DOUBLE)");
    }
}
