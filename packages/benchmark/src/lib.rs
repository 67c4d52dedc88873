#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dual-engine benchmark for rural property registry queries.
//!
//! Every query in the suite is executed twice: once as SQL through the
//! registry's `DuckDB` connection ([`DuckDbEngine`]) and once by direct
//! iteration over an in-memory snapshot ([`InMemoryEngine`]). The
//! [`Harness`] times both, checks that they agree, and records the
//! difference. A [`BenchmarkSession`] owns the connection and snapshot for
//! the lifetime of a run.

pub mod config;
pub mod duckdb_engine;
pub mod engine;
pub mod harness;
pub mod memory_engine;
pub mod progress;
pub mod queries;
pub mod report;
pub mod udf;

pub use config::BenchmarkConfig;
pub use duckdb_engine::DuckDbEngine;
pub use engine::QueryEngine;
pub use harness::{BenchmarkSession, Harness};
pub use memory_engine::InMemoryEngine;

use rural_registry_database::DbError;
use rural_registry_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur while configuring or running the benchmark.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// Registry storage error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// SQL execution error in the declarative engine.
    #[error("Query error: {0}")]
    Query(#[from] duckdb::Error),

    /// Invalid geometric input.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Invalid or unreadable configuration.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Report output error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
