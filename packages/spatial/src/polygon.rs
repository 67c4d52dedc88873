//! Point-in-polygon containment against a fixed boundary.
//!
//! Points lying exactly on the boundary (an edge or a vertex) are *not*
//! contained. This matches the OGC `Contains` predicate. The declarative
//! engine calls the same [`BoundaryPolygon::contains`] through a `DuckDB`
//! scalar function.

use geo::{Area as _, BoundingRect as _, Contains as _, Coord, LineString, Point, Polygon, Rect};
use geojson::GeoJson;

use crate::SpatialError;

/// A validated, immutable polygon ring in (longitude, latitude) order.
///
/// Constructed once and shared read-only by every containment check.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    polygon: Polygon<f64>,
    bounds: Rect<f64>,
}

impl BoundaryPolygon {
    /// Builds a polygon from `(longitude, latitude)` vertices.
    ///
    /// The ring may be given open or closed; it is closed automatically.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidPolygon`] if any vertex is not a finite
    /// WGS84 coordinate, if fewer than 3 distinct vertices remain, or if the
    /// vertices enclose no area.
    pub fn new(vertices: &[(f64, f64)]) -> Result<Self, SpatialError> {
        if let Some((lon, lat)) = vertices
            .iter()
            .find(|(lon, lat)| !(-180.0..=180.0).contains(lon) || !(-90.0..=90.0).contains(lat))
        {
            return Err(SpatialError::InvalidPolygon {
                message: format!("vertex ({lon}, {lat}) is not a valid longitude/latitude"),
            });
        }

        let mut ring: Vec<Coord<f64>> = Vec::with_capacity(vertices.len() + 1);
        for &(x, y) in vertices {
            if ring.last().is_none_or(|prev| prev.x != x || prev.y != y) {
                ring.push(Coord { x, y });
            }
        }
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        let mut distinct = ring.clone();
        distinct.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(SpatialError::InvalidPolygon {
                message: format!(
                    "need at least 3 distinct vertices, got {}",
                    distinct.len()
                ),
            });
        }

        let polygon = Polygon::new(LineString::new(ring), vec![]);
        if polygon.unsigned_area() <= 0.0 {
            return Err(SpatialError::InvalidPolygon {
                message: "vertices are collinear and enclose no area".to_string(),
            });
        }

        let bounds = polygon
            .bounding_rect()
            .ok_or_else(|| SpatialError::InvalidPolygon {
                message: "polygon has no bounding box".to_string(),
            })?;

        log::debug!(
            "Built boundary polygon with {} vertices",
            polygon.exterior().0.len() - 1
        );

        Ok(Self { polygon, bounds })
    }

    /// Parses a `GeoJSON` `Polygon` geometry (bare or wrapped in a
    /// `Feature`) without holes.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Parse`] if the text is not a polygon
    /// geometry, or [`SpatialError::InvalidPolygon`] if the ring is invalid.
    pub fn from_geojson(geojson_str: &str) -> Result<Self, SpatialError> {
        let geojson: GeoJson = geojson_str.parse().map_err(|e| SpatialError::Parse {
            message: format!("invalid GeoJSON: {e}"),
        })?;

        let geometry = match geojson {
            GeoJson::Geometry(geom) => geom,
            GeoJson::Feature(feature) => feature.geometry.ok_or_else(|| SpatialError::Parse {
                message: "feature has no geometry".to_string(),
            })?,
            GeoJson::FeatureCollection(_) => {
                return Err(SpatialError::Parse {
                    message: "expected a single Polygon, got a FeatureCollection".to_string(),
                });
            }
        };

        let geo_geom: geo::Geometry<f64> =
            geometry.try_into().map_err(|e| SpatialError::Parse {
                message: format!("unsupported geometry: {e}"),
            })?;

        let geo::Geometry::Polygon(polygon) = geo_geom else {
            return Err(SpatialError::Parse {
                message: "expected a Polygon geometry".to_string(),
            });
        };
        if !polygon.interiors().is_empty() {
            return Err(SpatialError::InvalidPolygon {
                message: "polygons with holes are not supported".to_string(),
            });
        }

        let vertices: Vec<(f64, f64)> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
        Self::new(&vertices)
    }

    /// Returns `true` if the point lies strictly inside the polygon.
    ///
    /// Points on an edge or vertex return `false`, as do non-finite inputs.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        let min = self.bounds.min();
        let max = self.bounds.max();
        if !(min.x..=max.x).contains(&longitude) || !(min.y..=max.y).contains(&latitude) {
            return false;
        }
        self.polygon.contains(&Point::new(longitude, latitude))
    }

    /// The closed ring as `(longitude, latitude)` pairs, first vertex
    /// repeated last.
    #[must_use]
    pub fn vertices(&self) -> Vec<(f64, f64)> {
        self.polygon.exterior().coords().map(|c| (c.x, c.y)).collect()
    }

    /// Bounding box as `(min_lon, min_lat, max_lon, max_lat)`.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let min = self.bounds.min();
        let max = self.bounds.max();
        (min.x, min.y, max.x, max.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Goiás / Mato Grosso do Sul study area.
    const STUDY_AREA: &[(f64, f64)] = &[
        (-53.532_507_2, -19.463_258_2),
        (-51.049_597_1, -19.162_584_1),
        (-51.373_450_1, -16.192_426_2),
        (-53.818_151_8, -16.401_078_3),
        (-53.532_507_2, -19.463_258_2),
    ];

    fn unit_square() -> BoundaryPolygon {
        BoundaryPolygon::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap()
    }

    #[test]
    fn study_area_inside_and_outside() {
        let polygon = BoundaryPolygon::new(STUDY_AREA).unwrap();
        assert!(polygon.contains(-17.5, -52.0));
        assert!(!polygon.contains(-30.0, -52.0));
    }

    #[test]
    fn interior_points_of_convex_polygon() {
        let square = unit_square();
        for i in 1..10 {
            for j in 1..10 {
                let lat = f64::from(i) / 10.0;
                let lon = f64::from(j) / 10.0;
                assert!(square.contains(lat, lon), "({lat}, {lon}) should be inside");
            }
        }
    }

    #[test]
    fn points_outside_bounding_box() {
        let square = unit_square();
        for (lat, lon) in [(-0.1, 0.5), (1.1, 0.5), (0.5, -0.1), (0.5, 1.1), (50.0, 50.0)] {
            assert!(!square.contains(lat, lon), "({lat}, {lon}) should be outside");
        }
    }

    #[test]
    fn boundary_is_excluded() {
        let square = unit_square();
        assert!(!square.contains(0.0, 0.5), "edge midpoint");
        assert!(!square.contains(0.5, 1.0), "edge midpoint");
        assert!(!square.contains(0.0, 0.0), "vertex");
        assert!(!square.contains(1.0, 1.0), "vertex");
    }

    #[test]
    fn concave_notch_is_outside() {
        // A "U" shape: the notch between the arms is outside.
        let u = BoundaryPolygon::new(&[
            (0.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (2.0, 3.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ])
        .unwrap();
        assert!(u.contains(2.0, 0.5));
        assert!(!u.contains(2.0, 1.5));
        assert!(u.contains(2.0, 2.5));
    }

    #[test]
    fn non_finite_point_is_outside() {
        assert!(!unit_square().contains(f64::NAN, 0.5));
        assert!(!unit_square().contains(0.5, f64::INFINITY));
    }

    #[test]
    fn open_and_closed_rings_are_equal() {
        let open = BoundaryPolygon::new(&STUDY_AREA[..4]).unwrap();
        let closed = BoundaryPolygon::new(STUDY_AREA).unwrap();
        assert_eq!(open, closed);
        assert_eq!(closed.vertices().len(), 5);
        assert_eq!(closed.vertices().first(), closed.vertices().last());
    }

    #[test]
    fn rejects_too_few_vertices() {
        let err = BoundaryPolygon::new(&[(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidPolygon { .. }));
        assert!(BoundaryPolygon::new(&[]).is_err());
        assert!(BoundaryPolygon::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (0.0, 0.0)]).is_err());
    }

    #[test]
    fn rejects_collinear_vertices() {
        let err = BoundaryPolygon::new(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidPolygon { .. }));
    }

    #[test]
    fn rejects_non_numeric_vertices() {
        assert!(BoundaryPolygon::new(&[(0.0, 0.0), (f64::NAN, 1.0), (1.0, 0.0)]).is_err());
        assert!(BoundaryPolygon::new(&[(0.0, 0.0), (200.0, 1.0), (1.0, 0.0)]).is_err());
    }

    #[test]
    fn parses_geojson_polygon() {
        let polygon = BoundaryPolygon::from_geojson(
            r#"{"type":"Polygon","coordinates":[[[-53.5325072,-19.4632582],[-51.0495971,-19.1625841],[-51.3734501,-16.1924262],[-53.8181518,-16.4010783],[-53.5325072,-19.4632582]]]}"#,
        )
        .unwrap();
        assert_eq!(polygon, BoundaryPolygon::new(STUDY_AREA).unwrap());
    }

    #[test]
    fn parses_geojson_feature() {
        let polygon = BoundaryPolygon::from_geojson(
            r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}"#,
        )
        .unwrap();
        assert!(polygon.contains(0.5, 0.5));
    }

    #[test]
    fn rejects_non_polygon_geojson() {
        let err =
            BoundaryPolygon::from_geojson(r#"{"type":"Point","coordinates":[0,0]}"#).unwrap_err();
        assert!(matches!(err, SpatialError::Parse { .. }));
        assert!(BoundaryPolygon::from_geojson("not json").is_err());
    }

    #[test]
    fn shared_across_threads() {
        let polygon = BoundaryPolygon::new(STUDY_AREA).unwrap();
        let points: Vec<(f64, f64)> = (0..400)
            .map(|i| {
                let i = f64::from(i);
                (-20.0 + (i % 20.0) * 0.25, -54.5 + (i / 20.0).floor() * 0.2)
            })
            .collect();
        let expected: Vec<bool> = points
            .iter()
            .map(|&(lat, lon)| polygon.contains(lat, lon))
            .collect();

        let results: Vec<Vec<bool>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        points
                            .iter()
                            .map(|&(lat, lon)| polygon.contains(lat, lon))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for result in results {
            assert_eq!(result, expected);
        }
        assert!(expected.iter().any(|&b| b));
        assert!(expected.iter().any(|&b| !b));
    }
}
