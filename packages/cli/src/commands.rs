//! Implementations of the CLI subcommands.

use std::path::{Path, PathBuf};
use std::time::Instant;

use duckdb::Connection;
use rural_registry_benchmark::queries::{parse_query_ids, select, standard_suite};
use rural_registry_benchmark::report::{render_table, write_json};
use rural_registry_benchmark::{BenchmarkConfig, BenchmarkSession, InMemoryEngine, QueryEngine};
use rural_registry_benchmark_models::{QueryOutput, QuerySpec};
use rural_registry_cli_utils::{MultiProgress, QueryProgress, spinner};
use rural_registry_database::{DbError, paths, registry_db};
use rural_registry_property_models::ValidationSummary;
use rural_registry_property_models::states::{state_name, state_region};
use rural_registry_spatial::BoundaryPolygon;

/// Options for a benchmark run.
pub struct BenchOptions {
    /// Registry file; defaults to [`paths::registry_db_path`].
    pub db: Option<PathBuf>,
    /// Raw export to benchmark against an in-memory database instead.
    pub input: Option<PathBuf>,
    /// Config file overriding the embedded defaults.
    pub config: Option<PathBuf>,
    /// Query ids to run; all when `None`.
    pub queries: Option<Vec<u8>>,
    /// Where to write the JSON report.
    pub json: Option<PathBuf>,
}

fn resolve_db(db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(paths::registry_db_path)
}

/// One-line description of the registry contents and where they came
/// from.
fn registry_summary(conn: &Connection) -> Result<String, DbError> {
    let count = registry_db::record_count(conn)?;
    let source = registry_db::get_meta(conn, "source_path")?;
    let imported_at = registry_db::get_meta(conn, "imported_at")?;

    Ok(match (source, imported_at) {
        (Some(source), Some(imported_at)) => {
            format!("{count} records imported from {source} at {imported_at}")
        }
        _ => format!("{count} records (no import recorded)"),
    })
}

/// `"MT (Mato Grosso, Centro-Oeste)"`.
fn state_label(code: &str) -> String {
    match state_region(code) {
        Some(region) => format!("{code} ({}, {})", state_name(code), region.label()),
        None => format!("{code} ({})", state_name(code)),
    }
}

fn polygon_summary(polygon: &BoundaryPolygon) -> String {
    let (min_lon, min_lat, max_lon, max_lat) = polygon.bounds();
    let vertices = polygon
        .vertices()
        .iter()
        .map(|(lon, lat)| format!("({lat}, {lon})"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "Polygon: {vertices}\nBounds:  lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon}"
    )
}

/// Imports a raw export into the registry and prints a validation summary.
///
/// # Errors
///
/// Returns an error if the config, import, or snapshot load fails.
pub fn import(
    multi: &MultiProgress,
    input: &Path,
    db: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = BenchmarkConfig::load(config)?;
    let db_path = resolve_db(db);
    let conn = registry_db::open(&db_path)?;
    registry_db::apply_settings(&conn, &config.engine_settings())?;

    let start = Instant::now();
    let bar = spinner(multi, &format!("Importing {}", input.display()));
    let summary = registry_db::import_dataset(&conn, input, &config.columns)?;
    bar.finish_and_clear();

    println!(
        "Imported {} of {} rows into {} in {:.2}s",
        summary.rows_imported,
        summary.rows_read,
        db_path.display(),
        start.elapsed().as_secs_f64()
    );

    println!("Registry: {}", registry_summary(&conn)?);

    let snapshot = registry_db::load_snapshot(&conn)?;
    print_validation(&ValidationSummary::collect(&snapshot));

    Ok(())
}

fn print_validation(summary: &ValidationSummary) {
    if summary.records_with_issues == 0 {
        println!("All {} records passed validation", summary.records);
        return;
    }

    println!(
        "{} of {} records have issues:",
        summary.records_with_issues, summary.records
    );
    for (issue, count) in &summary.issues {
        println!("  {count:>10}  {issue}");
    }
}

/// Runs the benchmark and prints the comparison table.
///
/// # Errors
///
/// Returns an error if the config, query selection, database, or report
/// output fails. Individual query failures are reported in the table.
pub fn bench(multi: &MultiProgress, options: BenchOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = BenchmarkConfig::load(options.config.as_deref())?;

    let mut queries = standard_suite(&config)?;
    if let Some(ids) = &options.queries {
        queries = select(queries, ids)?;
    }

    let session = if let Some(input) = &options.input {
        let conn = registry_db::open_in_memory()?;
        registry_db::apply_settings(&conn, &config.engine_settings())?;
        let bar = spinner(multi, &format!("Importing {}", input.display()));
        registry_db::import_dataset(&conn, input, &config.columns)?;
        bar.finish_and_clear();
        BenchmarkSession::from_connection(conn, config)?
    } else {
        BenchmarkSession::open(&resolve_db(options.db), config)?
    };

    log::info!("Registry: {}", registry_summary(session.connection())?);
    if session.snapshot().is_empty() {
        log::warn!("The registry is empty; every query will report no data");
    }

    let progress = QueryProgress::new(multi);
    let report = session.run(&queries, &progress);

    println!();
    print!("{}", render_table(&report));

    if let Some(path) = &options.json {
        write_json(&report, path)?;
    }

    session.close()?;

    Ok(())
}

/// Parses the `--queries` flag.
///
/// # Errors
///
/// Returns an error if an entry is not a number.
pub fn parse_queries(list: Option<&str>) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    Ok(list.map(parse_query_ids).transpose()?)
}

/// Prints the largest property and its distance to the reference point.
///
/// # Errors
///
/// Returns an error if the config or database cannot be read.
pub fn largest(db: Option<PathBuf>, config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = BenchmarkConfig::load(config)?;
    let reference = config.reference()?;
    let session = BenchmarkSession::open(&resolve_db(db), config)?;

    let engine = InMemoryEngine::new(session.snapshot());
    match engine.execute(&QuerySpec::LargestProperty { reference })? {
        QueryOutput::Largest(Some(largest)) => {
            let r = &largest.record;
            println!("Registry id:   {}", r.registry_id);
            println!("State:         {}", state_label(&r.state_code));
            println!(
                "Municipality:  {}",
                r.municipality.as_deref().unwrap_or("-")
            );
            println!("Area:          {:.2} ha", r.area_total);
            println!("Location:      ({}, {})", r.latitude, r.longitude);
            println!(
                "Distance to ({}, {}): {:.2} km",
                reference.latitude(),
                reference.longitude(),
                largest.distance_km
            );
        }
        _ => println!("The registry is empty"),
    }

    session.close()?;

    Ok(())
}

/// Tests a point against the configured polygon.
///
/// # Errors
///
/// Returns an error if the config or its polygon is invalid.
pub fn contains(lat: f64, lon: f64, config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let polygon = BenchmarkConfig::load(config)?.polygon()?;
    println!("{}", polygon_summary(&polygon));
    println!(
        "({lat}, {lon}) is {} the polygon",
        if polygon.contains(lat, lon) {
            "inside"
        } else {
            "outside"
        }
    );
    Ok(())
}

/// Lists the queries in the suite.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded.
pub fn list_queries(config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = BenchmarkConfig::load(config)?;
    println!("{:<4} {:<26} DESCRIPTION", "#", "NAME");
    println!("{}", "-".repeat(80));
    for query in standard_suite(&config)? {
        println!("{:<4} {:<26} {}", query.id, query.name, query.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rural_registry_property_models::PropertyRecord;

    use super::*;

    #[test]
    fn registry_summary_reports_import_metadata() {
        let conn = registry_db::open_in_memory().unwrap();
        assert_eq!(
            registry_summary(&conn).unwrap(),
            "0 records (no import recorded)"
        );

        registry_db::insert_records(
            &conn,
            &[PropertyRecord {
                registry_id: "MS-1".to_string(),
                state_code: "MS".to_string(),
                municipality: None,
                ibge_code: None,
                area_total: 10.0,
                area_native_vegetation_remaining: 2.0,
                registration_date: None,
                registration_status: None,
                condition_status: None,
                latitude: -20.0,
                longitude: -54.0,
            }],
        )
        .unwrap();
        registry_db::set_meta(&conn, "source_path", "car.parquet").unwrap();
        registry_db::set_meta(&conn, "imported_at", "2024-01-01T00:00:00+00:00").unwrap();

        assert_eq!(
            registry_summary(&conn).unwrap(),
            "1 records imported from car.parquet at 2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn state_label_includes_region() {
        assert_eq!(state_label("MT"), "MT (Mato Grosso, Centro-Oeste)");
        assert_eq!(state_label("XX"), "XX (Unknown)");
    }

    #[test]
    fn polygon_summary_lists_vertices_and_bounds() {
        let square = BoundaryPolygon::new(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)]).unwrap();
        let summary = polygon_summary(&square);
        assert!(summary.starts_with("Polygon: (0, 0) (0, 2) (1, 2) (1, 0) (0, 0)"));
        assert!(summary.ends_with("Bounds:  lat 0..1, lon 0..2"));
    }
}
