#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the rural registry benchmark.
//!
//! Imports CAR registry exports into the `DuckDB` store, runs the
//! dual-engine benchmark, and exposes the geometric primitives for quick
//! checks. Without a subcommand it starts an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`rural_registry_cli_utils::init_logger`])
//! so log lines and progress bars share the terminal cleanly.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rural_registry_spatial::distance_km;

#[derive(Parser)]
#[command(name = "rural_registry", about = "Rural property registry benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a registry export (parquet, CSV, or JSON) into the `DuckDB` store
    Import {
        /// Export file to import
        #[arg(long)]
        input: PathBuf,
        /// Registry database path (overrides `RURAL_REGISTRY_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Benchmark config providing the source column names
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run every query through `DuckDB` and the in-memory engine and compare
    Bench {
        /// Registry database path (overrides `RURAL_REGISTRY_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Benchmark a raw export loaded into an in-memory database instead
        #[arg(long, conflicts_with = "db")]
        input: Option<PathBuf>,
        /// Config file overriding the embedded defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Comma-separated query ids to run (e.g. "1,3,7")
        #[arg(long)]
        queries: Option<String>,
        /// Also write the report as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Haversine distance in kilometres between two points
    Distance {
        /// Origin latitude
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        /// Origin longitude
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        /// Destination latitude
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        /// Destination longitude
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },
    /// Test whether a point lies strictly inside the configured polygon
    Contains {
        /// Point latitude
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Point longitude
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        /// Config file providing the polygon
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the largest property and its distance to the reference point
    Largest {
        /// Registry database path (overrides `RURAL_REGISTRY_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Config file providing the reference point
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the benchmark queries
    Queries {
        /// Config file overriding the embedded defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = rural_registry_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi);
    };

    match command {
        Commands::Import { input, db, config } => {
            commands::import(&multi, &input, db, config.as_deref())?;
        }
        Commands::Bench {
            db,
            input,
            config,
            queries,
            json,
        } => {
            let queries = commands::parse_queries(queries.as_deref())?;
            commands::bench(
                &multi,
                commands::BenchOptions {
                    db,
                    input,
                    config,
                    queries,
                    json,
                },
            )?;
        }
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => {
            let km = distance_km((lat1, lon1), (lat2, lon2))?;
            println!("{km:.3} km");
        }
        Commands::Contains { lat, lon, config } => {
            commands::contains(lat, lon, config.as_deref())?;
        }
        Commands::Largest { db, config } => {
            commands::largest(db, config.as_deref())?;
        }
        Commands::Queries { config } => {
            commands::list_queries(config.as_deref())?;
        }
    }

    Ok(())
}
