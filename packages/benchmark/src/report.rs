//! Report rendering.

use std::fmt::Write as _;
use std::path::Path;

use rural_registry_benchmark_models::BenchmarkReport;

use crate::BenchmarkError;

const RULE_WIDTH: usize = 98;

/// Rounds seconds to four decimals for display.
#[must_use]
pub fn round_secs(secs: f64) -> f64 {
    (secs * 10_000.0).round() / 10_000.0
}

/// Renders the report as a fixed-width text table.
#[must_use]
pub fn render_table(report: &BenchmarkReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Benchmark: {} vs {} ({} records, {} repetition(s))",
        report.declarative_engine,
        report.direct_engine,
        report.record_count,
        report.repetitions
    );
    let _ = writeln!(
        out,
        "{:<4} {:<26} {:>12} {:>12} {:>12} {:>8} {:>6}   {}",
        "#", "Query", "SQL (s)", "Direct (s)", "Diff (s)", "Rows", "Match", "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for c in &report.comparisons {
        let _ = writeln!(
            out,
            "{:<4} {:<26} {:>12.4} {:>12.4} {:>12.4} {:>8} {:>6}   {}",
            c.id,
            c.name,
            round_secs(c.declarative_secs),
            round_secs(c.direct_secs),
            round_secs(c.delta_secs()),
            c.rows,
            if c.outputs_match { "yes" } else { "NO" },
            c.status
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "Total: {:.4}s SQL, {:.4}s direct ({} mismatched, {} failed)",
        report.total_declarative_secs(),
        report.total_direct_secs(),
        report.mismatches().count(),
        report.failures().count()
    );

    out
}

/// Writes the report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`BenchmarkError`] if serialization or the write fails.
pub fn write_json(report: &BenchmarkReport, path: &Path) -> Result<(), BenchmarkError> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    log::info!("Wrote JSON report to {}", path.display());
    Ok(())
}
