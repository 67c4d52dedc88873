//! Interactive menu.
//!
//! Provides a terminal UI using `dialoguer` for picking an action and the
//! queries to benchmark without memorizing CLI flags.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, MultiSelect, Select};
use rural_registry_benchmark::BenchmarkConfig;
use rural_registry_benchmark::queries::standard_suite;
use rural_registry_cli_utils::MultiProgress;
use rural_registry_database::paths;

use crate::commands::{self, BenchOptions};

/// Top-level actions.
enum Action {
    Bench,
    Import,
    Largest,
}

impl Action {
    const ALL: &[Self] = &[Self::Bench, Self::Import, Self::Largest];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Bench => "Run benchmark",
            Self::Import => "Import a registry export",
            Self::Largest => "Show the largest property",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if user input or the chosen action fails.
pub fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Rural Registry Benchmark");
    println!("Registry: {}", paths::registry_db_path().display());
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Bench => bench(multi),
        Action::Import => {
            let input: String = Input::new()
                .with_prompt("Path to the export file (parquet, CSV, or JSON)")
                .interact_text()?;
            commands::import(multi, &PathBuf::from(input.trim()), None, None)
        }
        Action::Largest => commands::largest(None, None),
    }
}

fn bench(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let suite = standard_suite(&BenchmarkConfig::load(None)?)?;
    let labels: Vec<String> = suite
        .iter()
        .map(|q| format!("{}. {}", q.id, q.description))
        .collect();
    let defaults = vec![true; labels.len()];

    let picked = MultiSelect::new()
        .with_prompt("Queries to run (space to toggle)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    if picked.is_empty() {
        println!("No queries selected");
        return Ok(());
    }

    let write_json = Confirm::new()
        .with_prompt("Write a JSON report?")
        .default(false)
        .interact()?;
    let json = if write_json {
        let path: String = Input::new()
            .with_prompt("JSON report path")
            .default("benchmark-report.json".to_string())
            .interact_text()?;
        Some(PathBuf::from(path.trim()))
    } else {
        None
    };

    commands::bench(
        multi,
        BenchOptions {
            db: None,
            input: None,
            config: None,
            queries: Some(picked.iter().map(|&i| suite[i].id).collect()),
            json,
        },
    )
}
