//! Execution strategy seam.

use rural_registry_benchmark_models::{QueryOutput, QuerySpec};

use crate::BenchmarkError;

/// An engine that can evaluate any [`QuerySpec`] against the current
/// snapshot.
///
/// Implementations must be deterministic: executing the same spec twice
/// against the same snapshot yields identical output.
pub trait QueryEngine {
    /// Short engine name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Evaluates `query` and materializes its result.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError`] if the query cannot be evaluated.
    fn execute(&self, query: &QuerySpec) -> Result<QueryOutput, BenchmarkError>;
}
