//! Registry `DuckDB` storage.
//!
//! The registry file contains a `properties` table holding one row per
//! rural property and a `_meta` table tracking import state. Every row has
//! a `row_idx` assigned at import time; it defines the snapshot order that
//! both query engines observe.

use std::path::Path;

use chrono::NaiveDate;
use duckdb::Connection;
use rural_registry_property_models::PropertyRecord;

use crate::{ColumnMapping, DbError, EngineSettings, quote_ident, quote_literal};

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 2_000;

/// Bound parameters per inserted row.
const PARAMS_PER_ROW: usize = 12;

/// Select list producing the columns [`record_from_row`] expects, in order.
pub const RECORD_COLUMNS: &str = "registry_id, state_code, municipality, ibge_code, \
     area_total, area_native_vegetation_remaining, \
     CAST(registration_date AS VARCHAR) AS registration_date, \
     registration_status, condition_status, latitude, longitude";

/// Opens (or creates) a registry `DuckDB` file and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    log::debug!("Opened registry database at {}", path.display());

    Ok(conn)
}

/// Opens a throwaway in-memory registry.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Applies thread and memory settings to an open connection.
///
/// # Errors
///
/// Returns [`DbError`] if `DuckDB` rejects a setting.
pub fn apply_settings(conn: &Connection, settings: &EngineSettings) -> Result<(), DbError> {
    conn.execute_batch(&format!(
        "SET threads = {}; SET memory_limit = {};",
        settings.threads.max(1),
        quote_literal(&settings.memory_limit)
    ))?;
    Ok(())
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS properties (
            row_idx BIGINT NOT NULL,
            registry_id TEXT NOT NULL,
            state_code TEXT NOT NULL,
            municipality TEXT,
            ibge_code TEXT,
            area_total DOUBLE NOT NULL,
            area_native_vegetation_remaining DOUBLE NOT NULL,
            registration_date DATE,
            registration_status TEXT,
            condition_status TEXT,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// Outcome of [`import_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows present in the source file.
    pub rows_read: u64,
    /// Rows written to `properties`.
    pub rows_imported: u64,
}

impl ImportSummary {
    /// Rows dropped because a required column was null.
    #[must_use]
    pub const fn rows_skipped(&self) -> u64 {
        self.rows_read.saturating_sub(self.rows_imported)
    }
}

/// Returns the `DuckDB` table function that reads `path`, chosen by file
/// extension.
fn reader_for(path: &Path) -> Result<String, DbError> {
    let path_str = path.display().to_string();
    let lower = path_str.to_ascii_lowercase();
    let literal = quote_literal(&path_str);

    if lower.ends_with(".parquet") {
        Ok(format!("read_parquet({literal})"))
    } else if lower.ends_with(".csv") || lower.ends_with(".csv.gz") {
        Ok(format!("read_csv({literal}, header = true)"))
    } else if lower.ends_with(".json") || lower.ends_with(".ndjson") || lower.ends_with(".jsonl")
    {
        Ok(format!("read_json_auto({literal})"))
    } else {
        Err(DbError::UnsupportedFormat { path: path_str })
    }
}

/// Replaces the `properties` table contents with the rows of a raw
/// registry export.
///
/// Rows missing the registry id, state, total area, native vegetation
/// area, or coordinates are skipped. Registration dates that cannot be
/// read as a date or timestamp become `NULL`.
///
/// # Errors
///
/// Returns [`DbError`] if the file format is unsupported, a mapped column
/// is missing, or the write fails. On failure the previous contents are
/// left untouched.
pub fn import_dataset(
    conn: &Connection,
    path: &Path,
    columns: &ColumnMapping,
) -> Result<ImportSummary, DbError> {
    let source = reader_for(path)?;
    log::info!("Importing registry export from {}", path.display());

    let rows_read: i64 = conn
        .prepare(&format!("SELECT COUNT(*) FROM {source}"))?
        .query_row([], |row| row.get(0))?;

    let c = |name: &str| quote_ident(name);
    let insert = format!(
        "INSERT INTO properties
         SELECT
            row_number() OVER () - 1,
            CAST({registry_id} AS VARCHAR),
            upper(trim(CAST({state_code} AS VARCHAR))),
            CAST({municipality} AS VARCHAR),
            CAST({ibge_code} AS VARCHAR),
            CAST({area_total} AS DOUBLE),
            CAST({vegetation} AS DOUBLE),
            CAST(TRY_CAST({registration_date} AS TIMESTAMP) AS DATE),
            CAST({registration_status} AS VARCHAR),
            CAST({condition_status} AS VARCHAR),
            CAST({latitude} AS DOUBLE),
            CAST({longitude} AS DOUBLE)
         FROM {source}
         WHERE {registry_id} IS NOT NULL
           AND {state_code} IS NOT NULL
           AND {area_total} IS NOT NULL
           AND {vegetation} IS NOT NULL
           AND {latitude} IS NOT NULL
           AND {longitude} IS NOT NULL",
        registry_id = c(&columns.registry_id),
        state_code = c(&columns.state_code),
        municipality = c(&columns.municipality),
        ibge_code = c(&columns.ibge_code),
        area_total = c(&columns.area_total),
        vegetation = c(&columns.area_native_vegetation_remaining),
        registration_date = c(&columns.registration_date),
        registration_status = c(&columns.registration_status),
        condition_status = c(&columns.condition_status),
        latitude = c(&columns.latitude),
        longitude = c(&columns.longitude),
    );

    conn.execute_batch("BEGIN TRANSACTION;")?;
    let written = match replace_properties(conn, &insert, path) {
        Ok(n) => {
            conn.execute_batch("COMMIT;")?;
            n
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK;").ok();
            return Err(e);
        }
    };

    let summary = ImportSummary {
        rows_read: u64::try_from(rows_read).unwrap_or(0),
        rows_imported: written,
    };

    if summary.rows_skipped() > 0 {
        log::warn!(
            "Skipped {} of {} rows with missing required columns",
            summary.rows_skipped(),
            summary.rows_read
        );
    }
    log::info!("Imported {} properties", summary.rows_imported);

    Ok(summary)
}

/// Swaps in the imported rows and records where they came from. Runs
/// inside the caller's transaction.
fn replace_properties(conn: &Connection, insert: &str, path: &Path) -> Result<u64, DbError> {
    conn.execute_batch("DELETE FROM properties;")?;
    let written = u64::try_from(conn.execute(insert, [])?).unwrap_or(0);

    set_meta(conn, "source_path", &path.display().to_string())?;
    set_meta(conn, "imported_at", &chrono::Utc::now().to_rfc3339())?;
    set_meta(conn, "row_count", &written.to_string())?;

    Ok(written)
}

/// Appends records to the `properties` table, continuing the snapshot
/// order after the current last row.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub fn insert_records(conn: &Connection, records: &[PropertyRecord]) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut next_idx: i64 = conn
        .prepare("SELECT COALESCE(MAX(row_idx) + 1, 0) FROM properties")?
        .query_row([], |row| row.get(0))?;

    let mut total_inserted = 0u64;

    for chunk in records.chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO properties (
                row_idx, registry_id, state_code, municipality, ibge_code,
                area_total, area_native_vegetation_remaining, registration_date,
                registration_status, condition_status, latitude, longitude
            ) VALUES ",
        );

        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?, ?, ?, CAST(? AS DATE), ?, ?, ?, ?)");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for record in chunk {
            let date = record
                .registration_date
                .map(|d| d.format("%Y-%m-%d").to_string());

            stmt.raw_bind_parameter(param_idx, next_idx)?;
            stmt.raw_bind_parameter(param_idx + 1, &record.registry_id)?;
            stmt.raw_bind_parameter(param_idx + 2, &record.state_code)?;
            stmt.raw_bind_parameter(param_idx + 3, record.municipality.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 4, record.ibge_code.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 5, record.area_total)?;
            stmt.raw_bind_parameter(param_idx + 6, record.area_native_vegetation_remaining)?;
            stmt.raw_bind_parameter(param_idx + 7, date.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 8, record.registration_status.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 9, record.condition_status.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 10, record.latitude)?;
            stmt.raw_bind_parameter(param_idx + 11, record.longitude)?;

            param_idx += PARAMS_PER_ROW;
            next_idx += 1;
        }

        let rows = stmt.raw_execute()?;
        total_inserted += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total_inserted)
}

/// Converts a row selected with [`RECORD_COLUMNS`] into a
/// [`PropertyRecord`].
///
/// # Errors
///
/// Returns [`DbError`] if a column has an unexpected type or the date text
/// cannot be parsed.
pub fn record_from_row(row: &duckdb::Row<'_>) -> Result<PropertyRecord, DbError> {
    let date: Option<String> = row.get(6)?;
    let registration_date = date
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| DbError::Conversion {
                message: format!("invalid registration date '{s}': {e}"),
            })
        })
        .transpose()?;

    Ok(PropertyRecord {
        registry_id: row.get(0)?,
        state_code: row.get(1)?,
        municipality: row.get(2)?,
        ibge_code: row.get(3)?,
        area_total: row.get(4)?,
        area_native_vegetation_remaining: row.get(5)?,
        registration_date,
        registration_status: row.get(7)?,
        condition_status: row.get(8)?,
        latitude: row.get(9)?,
        longitude: row.get(10)?,
    })
}

/// Loads the full `properties` table in snapshot order.
///
/// # Errors
///
/// Returns [`DbError`] if the query or row conversion fails.
pub fn load_snapshot(conn: &Connection) -> Result<Vec<PropertyRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM properties ORDER BY row_idx"
    ))?;
    let mut rows = stmt.query([])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(record_from_row(row)?);
    }

    log::info!("Loaded snapshot of {} properties", records.len());

    Ok(records)
}

/// Returns the number of rows in `properties`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn record_count(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM properties")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Gets a metadata value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    let result = stmt.query_row([key], |row| row.get(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Sets a metadata value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR REPLACE INTO _meta (key, value) VALUES (?, ?)",
        duckdb::params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn record(id: &str, state: &str, area: f64, date: Option<(i32, u32, u32)>) -> PropertyRecord {
        PropertyRecord {
            registry_id: id.to_string(),
            state_code: state.to_string(),
            municipality: Some("Dourados".to_string()),
            ibge_code: Some("5003702".to_string()),
            area_total: area,
            area_native_vegetation_remaining: area / 4.0,
            registration_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            registration_status: Some("AT".to_string()),
            condition_status: None,
            latitude: -22.22,
            longitude: -54.81,
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "rural_registry_{}_{name}",
            std::process::id()
        ))
    }

    #[test]
    fn insert_and_load_preserve_order() {
        let conn = open_in_memory().unwrap();
        let records = vec![
            record("a", "MS", 10.0, Some((2015, 1, 2))),
            record("b", "MT", 20.5, None),
            record("c", "GO", 0.0, Some((2020, 12, 31))),
        ];
        assert_eq!(insert_records(&conn, &records).unwrap(), 3);
        assert_eq!(load_snapshot(&conn).unwrap(), records);

        let more = vec![record("d", "SP", 1.0, None)];
        insert_records(&conn, &more).unwrap();
        let snapshot = load_snapshot(&conn).unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[3].registry_id, "d");
        assert_eq!(record_count(&conn).unwrap(), 4);
    }

    #[test]
    fn insert_spans_multiple_chunks() {
        let conn = open_in_memory().unwrap();
        let records: Vec<PropertyRecord> = (0..(CHUNK_SIZE + 7))
            .map(|i| record(&format!("r{i}"), "PA", 1.0, None))
            .collect();
        assert_eq!(insert_records(&conn, &records).unwrap(), records.len() as u64);
        let snapshot = load_snapshot(&conn).unwrap();
        assert_eq!(snapshot.first().unwrap().registry_id, "r0");
        assert_eq!(
            snapshot.last().unwrap().registry_id,
            format!("r{}", CHUNK_SIZE + 6)
        );
    }

    #[test]
    fn empty_table_loads_empty_snapshot() {
        let conn = open_in_memory().unwrap();
        assert!(load_snapshot(&conn).unwrap().is_empty());
        assert_eq!(insert_records(&conn, &[]).unwrap(), 0);
    }

    #[test]
    fn imports_csv_export() {
        let path = temp_file("export.csv");
        std::fs::write(
            &path,
            "registro_car,uf,municipio,codigo_ibge,area_do_imovel,area_remanescente_vegetacao_nativa,data_inscricao,situacao_cadastro,condicao_cadastro,latitude,longitude\n\
             MS-1,ms,Dourados,5003702,120.5,30.0,2016-05-04,AT,Aguardando analise,-22.2,-54.8\n\
             MT-1,MT,Sorriso,5107925,800.0,200.0,2017-01-10,AT,,-12.5,-55.7\n\
             GO-1,GO,Rio Verde,5218805,,10.0,2018-03-03,AT,,-17.8,-50.9\n\
             GO-2,GO,Jatai,5211909,50.0,10.0,not a date,PE,,-17.9,-51.7\n",
        )
        .unwrap();

        let conn = open_in_memory().unwrap();
        let summary = import_dataset(&conn, &path, &ColumnMapping::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.rows_imported, 3);
        assert_eq!(summary.rows_skipped(), 1);

        let snapshot = load_snapshot(&conn).unwrap();
        let ids: Vec<&str> = snapshot.iter().map(|r| r.registry_id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"MS-1") && ids.contains(&"MT-1") && ids.contains(&"GO-2"));

        let ms = snapshot.iter().find(|r| r.registry_id == "MS-1").unwrap();
        assert_eq!(ms.state_code, "MS");
        assert_eq!(ms.ibge_code.as_deref(), Some("5003702"));
        assert_eq!(ms.registration_date, NaiveDate::from_ymd_opt(2016, 5, 4));

        let go = snapshot.iter().find(|r| r.registry_id == "GO-2").unwrap();
        assert_eq!(go.registration_date, None);

        assert_eq!(get_meta(&conn, "row_count").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn reimport_replaces_rows() {
        let path = temp_file("reimport.csv");
        std::fs::write(
            &path,
            "registro_car,uf,municipio,codigo_ibge,area_do_imovel,area_remanescente_vegetacao_nativa,data_inscricao,situacao_cadastro,condicao_cadastro,latitude,longitude\n\
             SP-1,SP,Campinas,3509502,10.0,1.0,2019-07-01,AT,,-22.9,-47.0\n",
        )
        .unwrap();

        let conn = open_in_memory().unwrap();
        import_dataset(&conn, &path, &ColumnMapping::default()).unwrap();
        import_dataset(&conn, &path, &ColumnMapping::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(record_count(&conn).unwrap(), 1);
    }

    #[test]
    fn failed_meta_write_keeps_previous_rows() {
        let path = temp_file("meta_failure.csv");
        std::fs::write(
            &path,
            "registro_car,uf,municipio,codigo_ibge,area_do_imovel,area_remanescente_vegetacao_nativa,data_inscricao,situacao_cadastro,condicao_cadastro,latitude,longitude\n\
             SP-1,SP,Campinas,3509502,10.0,1.0,2019-07-01,AT,,-22.9,-47.0\n",
        )
        .unwrap();

        let conn = open_in_memory().unwrap();
        let existing = vec![record("a", "MS", 10.0, None), record("b", "MT", 5.0, None)];
        insert_records(&conn, &existing).unwrap();
        conn.execute_batch("DROP TABLE _meta;").unwrap();

        let result = import_dataset(&conn, &path, &ColumnMapping::default());
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
        assert_eq!(load_snapshot(&conn).unwrap(), existing);
    }

    #[test]
    fn imports_parquet_export() {
        let path = temp_file("export.parquet");
        let conn = open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "COPY (
                SELECT 'RJ-1' AS registro_car, 'RJ' AS uf, 'Petropolis' AS municipio,
                       3303906 AS codigo_ibge, 42.0 AS area_do_imovel,
                       21.0 AS area_remanescente_vegetacao_nativa,
                       DATE '2014-11-20' AS data_inscricao, 'AT' AS situacao_cadastro,
                       CAST(NULL AS VARCHAR) AS condicao_cadastro, -22.5 AS latitude, -43.2 AS longitude
            ) TO {} (FORMAT PARQUET);",
            quote_literal(&path.display().to_string())
        ))
        .unwrap();

        let summary = import_dataset(&conn, &path, &ColumnMapping::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(summary.rows_imported, 1);
        let snapshot = load_snapshot(&conn).unwrap();
        assert_eq!(snapshot[0].registry_id, "RJ-1");
        assert!((snapshot[0].area_total - 42.0).abs() < f64::EPSILON);
        assert_eq!(
            snapshot[0].registration_date,
            NaiveDate::from_ymd_opt(2014, 11, 20)
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let conn = open_in_memory().unwrap();
        let err = import_dataset(&conn, Path::new("data.xlsx"), &ColumnMapping::default())
            .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedFormat { .. }));
    }

    #[test]
    fn meta_round_trip() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get_meta(&conn, "missing").unwrap(), None);
        set_meta(&conn, "k", "v1").unwrap();
        set_meta(&conn, "k", "v2").unwrap();
        assert_eq!(get_meta(&conn, "k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn settings_apply() {
        let conn = open_in_memory().unwrap();
        apply_settings(&conn, &EngineSettings::default()).unwrap();
    }
}
