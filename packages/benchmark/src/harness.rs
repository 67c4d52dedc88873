//! Timing and comparison of the two engines.

use std::path::Path;
use std::time::{Duration, Instant};

use duckdb::Connection;
use rural_registry_benchmark_models::{
    BenchmarkReport, ComparisonRecord, QueryDefinition, QueryOutput, QuerySpec, QueryStatus,
};
use rural_registry_database::registry_db;
use rural_registry_property_models::PropertyRecord;

use crate::progress::ProgressCallback;
use crate::{BenchmarkConfig, BenchmarkError, DuckDbEngine, InMemoryEngine, QueryEngine};

/// Relative tolerance for floating-point output comparison.
pub const TOLERANCE: f64 = 1e-9;

/// Result of timing one engine on one query.
struct EngineRun {
    fastest: Duration,
    output: QueryOutput,
    stable: bool,
}

/// Runs queries through a declarative and a direct engine and compares
/// the results.
pub struct Harness<'a> {
    declarative: &'a dyn QueryEngine,
    direct: &'a dyn QueryEngine,
    repetitions: u32,
}

impl<'a> Harness<'a> {
    /// Creates a harness that runs each engine `repetitions` times per
    /// query (at least once).
    #[must_use]
    pub fn new(
        declarative: &'a dyn QueryEngine,
        direct: &'a dyn QueryEngine,
        repetitions: u32,
    ) -> Self {
        Self {
            declarative,
            direct,
            repetitions: repetitions.max(1),
        }
    }

    fn time(&self, engine: &dyn QueryEngine, spec: &QuerySpec) -> Result<EngineRun, BenchmarkError> {
        let start = Instant::now();
        let output = engine.execute(spec)?;
        let mut fastest = start.elapsed();
        let mut stable = true;

        for _ in 1..self.repetitions {
            let start = Instant::now();
            let again = engine.execute(spec)?;
            fastest = fastest.min(start.elapsed());

            // Parallel float aggregation is not bit-reproducible.
            if !again.approx_eq(&output, TOLERANCE) {
                log::warn!("{} returned different output on a repeated run", engine.name());
                stable = false;
            }
        }

        Ok(EngineRun {
            fastest,
            output,
            stable,
        })
    }

    /// Runs `query` through both engines and records timings and
    /// agreement.
    ///
    /// Engine errors never propagate; they become
    /// [`QueryStatus::Failed`].
    #[must_use]
    pub fn compare(&self, query: &QueryDefinition) -> ComparisonRecord {
        let declarative = self.time(self.declarative, &query.spec);
        let direct = self.time(self.direct, &query.spec);

        let mut record = ComparisonRecord {
            id: query.id,
            name: query.name.clone(),
            description: query.description.clone(),
            declarative_secs: 0.0,
            direct_secs: 0.0,
            rows: 0,
            outputs_match: false,
            status: QueryStatus::Ok,
        };

        let (declarative, direct) = match (declarative, direct) {
            (Ok(declarative), Ok(direct)) => (declarative, direct),
            (declarative, direct) => {
                if let Ok(run) = &declarative {
                    record.declarative_secs = run.fastest.as_secs_f64();
                }
                if let Ok(run) = &direct {
                    record.direct_secs = run.fastest.as_secs_f64();
                }

                let message = [
                    (self.declarative.name(), declarative.err()),
                    (self.direct.name(), direct.err()),
                ]
                .into_iter()
                .filter_map(|(name, err)| err.map(|e| format!("{name}: {e}")))
                .collect::<Vec<_>>()
                .join("; ");
                log::error!("Query {} ({}) failed: {message}", query.id, query.name);
                record.status = QueryStatus::Failed(message);
                return record;
            }
        };

        record.declarative_secs = declarative.fastest.as_secs_f64();
        record.direct_secs = direct.fastest.as_secs_f64();
        record.rows = declarative.output.row_count();

        let agree = declarative.output.approx_eq(&direct.output, TOLERANCE);
        if !agree {
            log::warn!(
                "Query {} ({}): {} and {} outputs differ ({} vs {} rows)",
                query.id,
                query.name,
                self.declarative.name(),
                self.direct.name(),
                declarative.output.row_count(),
                direct.output.row_count()
            );
        }
        record.outputs_match = agree && declarative.stable && direct.stable;

        if declarative.output.is_empty() && direct.output.is_empty() {
            log::warn!("Query {} ({}) returned no data", query.id, query.name);
            record.status = QueryStatus::NoData;
        }

        log::info!(
            "Query {} ({}): {}={:.4}s {}={:.4}s",
            query.id,
            query.name,
            self.declarative.name(),
            record.declarative_secs,
            self.direct.name(),
            record.direct_secs
        );

        record
    }

    /// Runs every query in order.
    pub fn run(
        &self,
        queries: &[QueryDefinition],
        progress: &dyn ProgressCallback,
    ) -> Vec<ComparisonRecord> {
        progress.set_total(queries.len() as u64);

        let mut records = Vec::with_capacity(queries.len());
        for query in queries {
            progress.set_message(format!("Query {}: {}", query.id, query.name));
            records.push(self.compare(query));
            progress.inc(1);
        }

        let failed = records
            .iter()
            .filter(|r| matches!(r.status, QueryStatus::Failed(_)))
            .count();
        progress.finish(format!(
            "{} queries, {failed} failed",
            records.len()
        ));

        records
    }
}

/// Owns the registry connection and the in-memory snapshot for one
/// benchmark run.
pub struct BenchmarkSession {
    conn: Connection,
    snapshot: Vec<PropertyRecord>,
    config: BenchmarkConfig,
}

impl BenchmarkSession {
    /// Opens the registry at `path`, applies engine settings, and loads
    /// the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError`] if the database cannot be opened or
    /// read.
    pub fn open(path: &Path, config: BenchmarkConfig) -> Result<Self, BenchmarkError> {
        let conn = registry_db::open(path)?;
        Self::from_connection(conn, config)
    }

    /// Builds a session on an already open and populated connection.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError`] if settings cannot be applied or the
    /// snapshot cannot be loaded.
    pub fn from_connection(conn: Connection, config: BenchmarkConfig) -> Result<Self, BenchmarkError> {
        registry_db::apply_settings(&conn, &config.engine_settings())?;

        let start = Instant::now();
        let snapshot = registry_db::load_snapshot(&conn)?;
        log::info!(
            "Snapshot of {} records ready in {:.2}s",
            snapshot.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            conn,
            snapshot,
            config,
        })
    }

    /// The registry connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The immutable snapshot both engines read.
    #[must_use]
    pub fn snapshot(&self) -> &[PropertyRecord] {
        &self.snapshot
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Runs `queries` through both engines and builds the report.
    #[must_use]
    pub fn run(
        &self,
        queries: &[QueryDefinition],
        progress: &dyn ProgressCallback,
    ) -> BenchmarkReport {
        let declarative = DuckDbEngine::new(&self.conn);
        let direct = InMemoryEngine::new(&self.snapshot);
        let harness = Harness::new(&declarative, &direct, self.config.repetitions);

        let start = Instant::now();
        let comparisons = harness.run(queries, progress);
        log::info!(
            "Benchmark finished in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        BenchmarkReport {
            generated_at: chrono::Utc::now(),
            record_count: self.snapshot.len(),
            repetitions: self.config.repetitions.max(1),
            declarative_engine: declarative.name().to_string(),
            direct_engine: direct.name().to_string(),
            comparisons,
        }
    }

    /// Releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Query`] if `DuckDB` fails to close.
    pub fn close(self) -> Result<(), BenchmarkError> {
        self.conn.close().map_err(|(_, e)| BenchmarkError::Query(e))
    }
}
