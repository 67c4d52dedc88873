//! Declarative evaluation: each query is rendered to SQL and run against
//! the registry's `properties` table.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use duckdb::Connection;
use rural_registry_benchmark_models::{
    LargestProperty, QueryOutput, QuerySpec, StateArea, StateCount, VegetationShare, YearCount,
};
use rural_registry_database::quote_literal;
use rural_registry_database::registry_db::{RECORD_COLUMNS, record_from_row};
use rural_registry_property_models::PropertyRecord;
use rural_registry_spatial::{BoundaryPolygon, Coordinate, haversine_sql, sql_f64};

use crate::udf::register_contains;
use crate::{BenchmarkError, QueryEngine};

/// Suffix for containment function names, unique across connections.
static NEXT_POLYGON_FUNCTION: AtomicUsize = AtomicUsize::new(0);

/// Runs queries as SQL on a borrowed `DuckDB` connection.
pub struct DuckDbEngine<'a> {
    conn: &'a Connection,
    polygon_functions: RefCell<Vec<(BoundaryPolygon, String)>>,
}

impl<'a> DuckDbEngine<'a> {
    /// Creates an engine over an open registry connection.
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            polygon_functions: RefCell::new(Vec::new()),
        }
    }

    /// Returns the name of the scalar function testing containment in
    /// `polygon`, registering it on first use.
    fn polygon_function(&self, polygon: &BoundaryPolygon) -> Result<String, BenchmarkError> {
        if let Some((_, name)) = self
            .polygon_functions
            .borrow()
            .iter()
            .find(|(registered, _)| registered == polygon)
        {
            return Ok(name.clone());
        }

        let name = format!(
            "inside_polygon_{}",
            NEXT_POLYGON_FUNCTION.fetch_add(1, Ordering::Relaxed)
        );
        register_contains(self.conn, &name, polygon)?;
        self.polygon_functions
            .borrow_mut()
            .push((polygon.clone(), name.clone()));
        Ok(name)
    }

    /// Renders the SQL for `query`. The polygon query calls
    /// `polygon_function(latitude, longitude)`, which must already be
    /// registered.
    #[must_use]
    pub fn render(query: &QuerySpec, polygon_function: &str) -> String {
        match query {
            QuerySpec::AreaByState { states } => format!(
                "SELECT state_code, SUM(area_total) AS total_area
                 FROM properties
                 WHERE state_code IN ({})
                 GROUP BY state_code
                 ORDER BY total_area DESC, state_code ASC",
                state_list(states)
            ),
            QuerySpec::PropertiesInStates { states } => format!(
                "SELECT {RECORD_COLUMNS}
                 FROM properties
                 WHERE state_code IN ({})
                 ORDER BY row_idx",
                state_list(states)
            ),
            QuerySpec::PropertiesInPolygon { states, .. } => format!(
                "SELECT {RECORD_COLUMNS}
                 FROM properties
                 WHERE state_code IN ({})
                   AND {polygon_function}(latitude, longitude)
                 ORDER BY row_idx",
                state_list(states)
            ),
            QuerySpec::RegistrationsByYear => "SELECT CAST(year(registration_date) AS INTEGER) AS year,
                        COUNT(*) AS registrations
                 FROM properties
                 WHERE registration_date IS NOT NULL
                 GROUP BY 1
                 ORDER BY 1"
                .to_string(),
            QuerySpec::NativeVegetationShare => "SELECT AVG(area_native_vegetation_remaining / area_total),
                        SUM(area_native_vegetation_remaining) / SUM(area_total),
                        COUNT(*)
                 FROM properties
                 WHERE area_total > 0
                   AND isfinite(area_total)
                   AND isfinite(area_native_vegetation_remaining)"
                .to_string(),
            QuerySpec::PropertiesByState => "SELECT state_code, COUNT(*) AS properties
                 FROM properties
                 GROUP BY state_code
                 ORDER BY state_code"
                .to_string(),
            QuerySpec::LargestProperty { reference } => format!(
                "SELECT {RECORD_COLUMNS}, {} AS distance_km
                 FROM properties
                 WHERE isfinite(area_total)
                 ORDER BY area_total DESC, row_idx ASC
                 LIMIT 1",
                haversine_sql(
                    "latitude",
                    "longitude",
                    &sql_f64(reference.latitude()),
                    &sql_f64(reference.longitude()),
                )
            ),
            QuerySpec::AboveStateAverage => "WITH state_avg AS (
                    SELECT state_code, AVG(area_total) AS avg_area
                    FROM properties
                    GROUP BY state_code
                 )
                 SELECT p.state_code, COUNT(*) AS above_average
                 FROM properties p
                 JOIN state_avg a ON p.state_code = a.state_code
                 WHERE p.area_total > a.avg_area
                 GROUP BY p.state_code
                 ORDER BY p.state_code"
                .to_string(),
        }
    }

    fn records(&self, sql: &str) -> Result<Vec<PropertyRecord>, BenchmarkError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }

    fn state_counts(&self, sql: &str) -> Result<Vec<StateCount>, BenchmarkError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            counts.push(StateCount {
                state_code: row.get(0)?,
                count: to_count(row.get(1)?)?,
            });
        }
        Ok(counts)
    }
}

impl QueryEngine for DuckDbEngine<'_> {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn execute(&self, query: &QuerySpec) -> Result<QueryOutput, BenchmarkError> {
        let polygon_function = match query {
            QuerySpec::PropertiesInPolygon { polygon, .. } => self.polygon_function(polygon)?,
            _ => String::new(),
        };
        let sql = Self::render(query, &polygon_function);
        log::debug!("duckdb: {sql}");

        match query {
            QuerySpec::AreaByState { .. } => {
                let mut stmt = self.conn.prepare(&sql)?;
                let mut rows = stmt.query([])?;

                let mut areas = Vec::new();
                while let Some(row) = rows.next()? {
                    areas.push(StateArea {
                        state_code: row.get(0)?,
                        total_area: row.get(1)?,
                    });
                }
                Ok(QueryOutput::StateAreas(areas))
            }
            QuerySpec::PropertiesInStates { .. } | QuerySpec::PropertiesInPolygon { .. } => {
                Ok(QueryOutput::Records(self.records(&sql)?))
            }
            QuerySpec::RegistrationsByYear => {
                let mut stmt = self.conn.prepare(&sql)?;
                let mut rows = stmt.query([])?;

                let mut years = Vec::new();
                while let Some(row) = rows.next()? {
                    years.push(YearCount {
                        year: row.get(0)?,
                        count: to_count(row.get(1)?)?,
                    });
                }
                Ok(QueryOutput::YearCounts(years))
            }
            QuerySpec::NativeVegetationShare => {
                let mut stmt = self.conn.prepare(&sql)?;
                let (mean_of_ratios, ratio_of_means, records) = stmt.query_row([], |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?;

                let share = match (mean_of_ratios, ratio_of_means) {
                    (Some(mean_of_ratios), Some(ratio_of_means)) if records > 0 => {
                        Some(VegetationShare {
                            mean_of_ratios,
                            ratio_of_means,
                            records: to_count(records)?,
                        })
                    }
                    _ => None,
                };
                Ok(QueryOutput::VegetationShare(share))
            }
            QuerySpec::PropertiesByState | QuerySpec::AboveStateAverage => {
                Ok(QueryOutput::StateCounts(self.state_counts(&sql)?))
            }
            QuerySpec::LargestProperty { .. } => {
                let mut stmt = self.conn.prepare(&sql)?;
                let mut rows = stmt.query([])?;

                let Some(row) = rows.next()? else {
                    return Ok(QueryOutput::Largest(None));
                };
                let record = record_from_row(row)?;
                let distance_km: f64 = row.get(11)?;
                Coordinate::new(record.latitude, record.longitude)?;

                Ok(QueryOutput::Largest(Some(LargestProperty {
                    record,
                    distance_km,
                })))
            }
        }
    }
}

/// Renders a SQL `IN` list body. An empty subset renders as `NULL`, which
/// matches nothing.
fn state_list(states: &[String]) -> String {
    if states.is_empty() {
        return "NULL".to_string();
    }
    states
        .iter()
        .map(|s| quote_literal(s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_count(value: i64) -> Result<u64, BenchmarkError> {
    u64::try_from(value).map_err(|e| BenchmarkError::Conversion {
        message: format!("negative count {value}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use rural_registry_database::registry_db;

    use super::*;
    use crate::{BenchmarkConfig, InMemoryEngine};

    #[test]
    fn state_list_quotes_and_handles_empty() {
        assert_eq!(
            state_list(&["MS".to_string(), "MT".to_string()]),
            "'MS', 'MT'"
        );
        assert_eq!(state_list(&[]), "NULL");
    }

    #[test]
    fn empty_state_subset_matches_nothing() {
        let conn = registry_db::open_in_memory().unwrap();
        registry_db::insert_records(
            &conn,
            &[PropertyRecord {
                registry_id: "a".to_string(),
                state_code: "MS".to_string(),
                municipality: None,
                ibge_code: None,
                area_total: 1.0,
                area_native_vegetation_remaining: 0.5,
                registration_date: None,
                registration_status: None,
                condition_status: None,
                latitude: -20.0,
                longitude: -54.0,
            }],
        )
        .unwrap();
        let engine = DuckDbEngine::new(&conn);
        let output = engine
            .execute(&QuerySpec::PropertiesInStates { states: vec![] })
            .unwrap();
        assert!(output.is_empty());
    }

    fn record_at(id: usize, state: &str, latitude: f64, longitude: f64) -> PropertyRecord {
        PropertyRecord {
            registry_id: format!("p{id}"),
            state_code: state.to_string(),
            municipality: None,
            ibge_code: None,
            area_total: 10.0,
            area_native_vegetation_remaining: 5.0,
            registration_date: None,
            registration_status: None,
            condition_status: None,
            latitude,
            longitude,
        }
    }

    #[test]
    fn polygon_query_agrees_with_contains_along_sloped_edges() {
        let polygon = BenchmarkConfig::default().polygon().unwrap();

        // Points interpolated along each edge sit within rounding error of
        // the boundary, on either side of it.
        let ring = polygon.vertices();
        let mut records = Vec::new();
        for edge in ring.windows(2) {
            let ((x1, y1), (x2, y2)) = (edge[0], edge[1]);
            for step in 0..=400 {
                let t = f64::from(step) / 400.0;
                records.push(record_at(
                    records.len(),
                    "GO",
                    y1 + t * (y2 - y1),
                    x1 + t * (x2 - x1),
                ));
            }
        }
        records.push(record_at(records.len(), "GO", -17.5, -52.0));

        let conn = registry_db::open_in_memory().unwrap();
        registry_db::insert_records(&conn, &records).unwrap();
        let snapshot = registry_db::load_snapshot(&conn).unwrap();

        let spec = QuerySpec::PropertiesInPolygon {
            states: vec!["GO".to_string()],
            polygon,
        };
        let declarative = DuckDbEngine::new(&conn).execute(&spec).unwrap();
        let direct = InMemoryEngine::new(&snapshot).execute(&spec).unwrap();

        assert!(!declarative.is_empty());
        assert_eq!(declarative, direct);
    }

    #[test]
    fn polygon_function_is_registered_once_per_polygon() {
        let conn = registry_db::open_in_memory().unwrap();
        registry_db::insert_records(&conn, &[record_at(0, "GO", -17.5, -52.0)]).unwrap();
        let study_area = BenchmarkConfig::default().polygon().unwrap();
        let square = BoundaryPolygon::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap();

        let engine = DuckDbEngine::new(&conn);
        let first = engine.polygon_function(&study_area).unwrap();
        assert_eq!(engine.polygon_function(&study_area).unwrap(), first);
        assert_ne!(engine.polygon_function(&square).unwrap(), first);

        // A second engine on the same connection registers its own names.
        let other = DuckDbEngine::new(&conn);
        let spec = QuerySpec::PropertiesInPolygon {
            states: vec!["GO".to_string()],
            polygon: study_area,
        };
        assert_eq!(other.execute(&spec).unwrap().row_count(), 1);
        assert_eq!(engine.execute(&spec).unwrap().row_count(), 1);
    }

    #[test]
    fn haversine_sql_matches_host_formula() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        let brasilia = Coordinate::new(-15.826_691, -47.921_822).unwrap();
        let sao_paulo = Coordinate::new(-23.550_52, -46.633_308).unwrap();

        let sql = format!(
            "SELECT {}",
            haversine_sql(
                &sql_f64(sao_paulo.latitude()),
                &sql_f64(sao_paulo.longitude()),
                &sql_f64(brasilia.latitude()),
                &sql_f64(brasilia.longitude()),
            )
        );
        let from_sql: f64 = conn.query_row(&sql, [], |row| row.get(0)).unwrap();
        let host = rural_registry_spatial::haversine_km(sao_paulo, brasilia);
        assert!((from_sql - host).abs() < 1e-9 * host, "{from_sql} vs {host}");
    }
}
