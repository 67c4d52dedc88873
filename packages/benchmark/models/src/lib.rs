#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Benchmark query and result types.
//!
//! A [`QuerySpec`] is the logical form of one analytical query. Both
//! execution engines accept the same spec and produce a [`QueryOutput`];
//! the harness times them and folds the outcome into a
//! [`ComparisonRecord`]. A full run is a [`BenchmarkReport`].

use chrono::{DateTime, Utc};
use rural_registry_property_models::PropertyRecord;
use rural_registry_spatial::{BoundaryPolygon, Coordinate};
use serde::{Deserialize, Serialize};

/// Logical form of a benchmark query.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    /// Sum of `area_total` per state, largest first, ties by state code.
    AreaByState {
        /// States to include.
        states: Vec<String>,
    },
    /// Every record whose state is in the subset, in snapshot order.
    PropertiesInStates {
        /// States to include.
        states: Vec<String>,
    },
    /// Records in the state subset whose coordinates fall strictly inside
    /// the polygon, in snapshot order.
    PropertiesInPolygon {
        /// States to include.
        states: Vec<String>,
        /// Boundary to test against.
        polygon: BoundaryPolygon,
    },
    /// Number of registrations per year, ascending. Undated records are
    /// excluded.
    RegistrationsByYear,
    /// Share of area still covered by native vegetation.
    NativeVegetationShare,
    /// Number of records per state, ordered by state code.
    PropertiesByState,
    /// The record with the largest `area_total` plus its distance to a
    /// reference point. Ties go to the earliest record in snapshot order.
    LargestProperty {
        /// Point to measure the distance to.
        reference: Coordinate,
    },
    /// Per state, the number of records strictly larger than that state's
    /// mean area. States without any such record are omitted.
    AboveStateAverage,
}

/// Summed area for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateArea {
    /// State code.
    pub state_code: String,
    /// Total area in hectares.
    pub total_area: f64,
}

/// Row count for one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCount {
    /// State code.
    pub state_code: String,
    /// Number of matching records.
    pub count: u64,
}

/// Registrations in one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCount {
    /// Registration year.
    pub year: i32,
    /// Number of registrations.
    pub count: u64,
}

/// Native vegetation share over records with a positive total area.
///
/// The two metrics differ whenever areas are unequal: the mean of ratios
/// weights every property equally, the ratio of means weights by area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VegetationShare {
    /// Mean of `vegetation / area_total` per record.
    pub mean_of_ratios: f64,
    /// `sum(vegetation) / sum(area_total)`.
    pub ratio_of_means: f64,
    /// Records that contributed (those with `area_total > 0`).
    pub records: u64,
}

/// The largest property and how far it is from the reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestProperty {
    /// The winning record.
    pub record: PropertyRecord,
    /// Haversine distance to the reference point in kilometres.
    pub distance_km: f64,
}

/// Materialized result of a [`QuerySpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryOutput {
    /// Per-state area totals.
    StateAreas(Vec<StateArea>),
    /// Projected records.
    Records(Vec<PropertyRecord>),
    /// Per-year counts.
    YearCounts(Vec<YearCount>),
    /// Per-state counts.
    StateCounts(Vec<StateCount>),
    /// Vegetation share, `None` with no qualifying records.
    VegetationShare(Option<VegetationShare>),
    /// Largest property, `None` on an empty snapshot.
    Largest(Option<LargestProperty>),
}

impl QueryOutput {
    /// Number of result rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::StateAreas(rows) => rows.len(),
            Self::Records(rows) => rows.len(),
            Self::YearCounts(rows) => rows.len(),
            Self::StateCounts(rows) => rows.len(),
            Self::VegetationShare(share) => usize::from(share.is_some()),
            Self::Largest(largest) => usize::from(largest.is_some()),
        }
    }

    /// Whether the query produced nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Compares two outputs, allowing floating-point values to differ by
    /// `rel_tol` relative to the larger magnitude.
    ///
    /// Row order is significant.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, rel_tol: f64) -> bool {
        let close = |a: f64, b: f64| approx_eq_f64(a, b, rel_tol);

        match (self, other) {
            (Self::StateAreas(a), Self::StateAreas(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| {
                        x.state_code == y.state_code && close(x.total_area, y.total_area)
                    })
            }
            (Self::Records(a), Self::Records(b)) => a == b,
            (Self::YearCounts(a), Self::YearCounts(b)) => a == b,
            (Self::StateCounts(a), Self::StateCounts(b)) => a == b,
            (Self::VegetationShare(a), Self::VegetationShare(b)) => match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => {
                    x.records == y.records
                        && close(x.mean_of_ratios, y.mean_of_ratios)
                        && close(x.ratio_of_means, y.ratio_of_means)
                }
                _ => false,
            },
            (Self::Largest(a), Self::Largest(b)) => match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => x.record == y.record && close(x.distance_km, y.distance_km),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Relative float comparison. Identical values, infinities included,
/// compare equal.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn approx_eq_f64(a: f64, b: f64, rel_tol: f64) -> bool {
    a == b
        || (a.is_finite()
            && b.is_finite()
            && (a - b).abs() <= rel_tol * a.abs().max(b.abs()).max(f64::MIN_POSITIVE))
}

/// A query as it appears in the benchmark suite.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefinition {
    /// 1-based position in the suite, used for `--queries` selection.
    pub id: u8,
    /// Short label shown in the report.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Logical query.
    pub spec: QuerySpec,
}

/// Outcome category for a single comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum QueryStatus {
    /// Both engines returned data.
    Ok,
    /// Both engines ran but returned nothing.
    NoData,
    /// At least one engine returned an error.
    Failed(String),
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NoData => write!(f, "NO DATA"),
            Self::Failed(message) => write!(f, "FAIL: {message}"),
        }
    }
}

/// Timings and agreement for one query run through both engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    /// Query id within the suite.
    pub id: u8,
    /// Query label.
    pub name: String,
    /// Query description.
    pub description: String,
    /// Fastest declarative-engine run, in seconds.
    pub declarative_secs: f64,
    /// Fastest direct-engine run, in seconds.
    pub direct_secs: f64,
    /// Rows returned by the declarative engine.
    pub rows: usize,
    /// Whether both engines agreed and every repetition was identical.
    pub outputs_match: bool,
    /// Outcome category.
    pub status: QueryStatus,
}

impl ComparisonRecord {
    /// `declarative - direct`, in seconds.
    #[must_use]
    pub fn delta_secs(&self) -> f64 {
        self.declarative_secs - self.direct_secs
    }
}

/// Full result of a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Snapshot size.
    pub record_count: usize,
    /// Runs per engine per query.
    pub repetitions: u32,
    /// Name of the declarative engine.
    pub declarative_engine: String,
    /// Name of the direct engine.
    pub direct_engine: String,
    /// One entry per executed query.
    pub comparisons: Vec<ComparisonRecord>,
}

impl BenchmarkReport {
    /// Sum of declarative timings.
    #[must_use]
    pub fn total_declarative_secs(&self) -> f64 {
        self.comparisons.iter().map(|c| c.declarative_secs).sum()
    }

    /// Sum of direct timings.
    #[must_use]
    pub fn total_direct_secs(&self) -> f64 {
        self.comparisons.iter().map(|c| c.direct_secs).sum()
    }

    /// Comparisons whose outputs disagreed.
    pub fn mismatches(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.comparisons
            .iter()
            .filter(|c| !c.outputs_match && !matches!(c.status, QueryStatus::Failed(_)))
    }

    /// Comparisons that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.comparisons
            .iter()
            .filter(|c| matches!(c.status, QueryStatus::Failed(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(mean_of_ratios: f64) -> QueryOutput {
        QueryOutput::VegetationShare(Some(VegetationShare {
            mean_of_ratios,
            ratio_of_means: 0.25,
            records: 3,
        }))
    }

    #[test]
    fn float_tolerance() {
        assert!(approx_eq_f64(0.0, 0.0, 1e-9));
        assert!(approx_eq_f64(1.0, 1.0 + 1e-12, 1e-9));
        assert!(!approx_eq_f64(1.0, 1.001, 1e-9));
        assert!(approx_eq_f64(1.0e12, 1.0e12 + 1.0, 1e-9));
        assert!(approx_eq_f64(f64::INFINITY, f64::INFINITY, 1e-9));
        assert!(!approx_eq_f64(f64::INFINITY, f64::NEG_INFINITY, 1e-9));
        assert!(!approx_eq_f64(f64::INFINITY, 1.0, 1e-9));
        assert!(!approx_eq_f64(f64::NAN, f64::NAN, 1e-9));
    }

    #[test]
    fn approx_eq_compares_by_variant() {
        assert!(share(0.5).approx_eq(&share(0.5 + 1e-15), 1e-9));
        assert!(!share(0.5).approx_eq(&share(0.6), 1e-9));
        assert!(!share(0.5).approx_eq(&QueryOutput::VegetationShare(None), 1e-9));
        assert!(!QueryOutput::Records(vec![]).approx_eq(&QueryOutput::StateCounts(vec![]), 1e-9));
    }

    #[test]
    fn state_areas_order_matters() {
        let a = QueryOutput::StateAreas(vec![
            StateArea {
                state_code: "MS".to_string(),
                total_area: 130.0,
            },
            StateArea {
                state_code: "MT".to_string(),
                total_area: 50.0,
            },
        ]);
        let QueryOutput::StateAreas(rows) = a.clone() else {
            unreachable!()
        };
        let reversed = QueryOutput::StateAreas(rows.into_iter().rev().collect());
        assert!(a.approx_eq(&a, 1e-9));
        assert!(!a.approx_eq(&reversed, 1e-9));
    }

    #[test]
    fn row_counts() {
        assert_eq!(QueryOutput::Largest(None).row_count(), 0);
        assert!(QueryOutput::VegetationShare(None).is_empty());
        assert_eq!(share(0.1).row_count(), 1);
        assert_eq!(
            QueryOutput::YearCounts(vec![
                YearCount { year: 2015, count: 1 },
                YearCount { year: 2016, count: 2 },
            ])
            .row_count(),
            2
        );
    }

    #[test]
    fn status_serializes_with_message() {
        let json = serde_json::to_string(&QueryStatus::Failed("boom".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"failed","message":"boom"}"#);
        let json = serde_json::to_string(&QueryStatus::NoData).unwrap();
        assert_eq!(json, r#"{"status":"no_data"}"#);
        assert_eq!(QueryStatus::Ok.to_string(), "OK");
    }

    #[test]
    fn report_totals() {
        let record = |id, declarative_secs, direct_secs, status| ComparisonRecord {
            id,
            name: format!("q{id}"),
            description: String::new(),
            declarative_secs,
            direct_secs,
            rows: 1,
            outputs_match: !matches!(status, QueryStatus::Failed(_)),
            status,
        };
        let report = BenchmarkReport {
            generated_at: Utc::now(),
            record_count: 10,
            repetitions: 1,
            declarative_engine: "duckdb".to_string(),
            direct_engine: "in-memory".to_string(),
            comparisons: vec![
                record(1, 0.5, 0.25, QueryStatus::Ok),
                record(2, 0.25, 0.5, QueryStatus::Failed("x".to_string())),
            ],
        };
        assert!((report.total_declarative_secs() - 0.75).abs() < 1e-12);
        assert!((report.total_direct_secs() - 0.75).abs() < 1e-12);
        assert!((report.comparisons[0].delta_secs() - 0.25).abs() < 1e-12);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.mismatches().count(), 0);
    }
}
