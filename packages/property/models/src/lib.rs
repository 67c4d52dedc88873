#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rural property registry record types.
//!
//! A [`PropertyRecord`] is one row of the CAR (Cadastro Ambiental Rural)
//! registry as loaded from the table store. Records are read-only once
//! loaded; every query projects or aggregates over an immutable snapshot.

pub mod states;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

/// A rural property row as stored in the `properties` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    /// CAR registry number.
    pub registry_id: String,
    /// Two-letter state code (UF).
    pub state_code: String,
    /// Municipality name.
    pub municipality: Option<String>,
    /// IBGE municipality code.
    pub ibge_code: Option<String>,
    /// Total declared area in hectares.
    pub area_total: f64,
    /// Remaining native vegetation area in hectares.
    pub area_native_vegetation_remaining: f64,
    /// Date the property was registered.
    pub registration_date: Option<NaiveDate>,
    /// Registration status (e.g. "AT" for active).
    pub registration_status: Option<String>,
    /// Registration condition description.
    pub condition_status: Option<String>,
    /// Centroid latitude (WGS84).
    pub latitude: f64,
    /// Centroid longitude (WGS84).
    pub longitude: f64,
}

impl PropertyRecord {
    /// Year component of the registration date.
    #[must_use]
    pub fn registration_year(&self) -> Option<i32> {
        self.registration_date.map(|d| d.year())
    }

    /// Share of the property still covered by native vegetation.
    ///
    /// `None` when the total area is not positive or either area is not
    /// finite.
    #[must_use]
    pub fn native_vegetation_ratio(&self) -> Option<f64> {
        (self.area_total > 0.0
            && self.area_total.is_finite()
            && self.area_native_vegetation_remaining.is_finite())
        .then(|| self.area_native_vegetation_remaining / self.area_total)
    }

    /// Checks the record against the registry's assumed invariants.
    ///
    /// The source data never enforces these, so problems are reported
    /// rather than corrected.
    #[must_use]
    pub fn validate(&self) -> Vec<RecordIssue> {
        let mut issues = Vec::new();

        if !states::is_state_code(&self.state_code) {
            issues.push(RecordIssue::UnknownState);
        }
        if self.area_total < 0.0 || self.area_total.is_nan() {
            issues.push(RecordIssue::NegativeArea);
        }
        if self.area_native_vegetation_remaining < 0.0
            || self.area_native_vegetation_remaining.is_nan()
        {
            issues.push(RecordIssue::NegativeVegetationArea);
        } else if self.area_native_vegetation_remaining > self.area_total {
            issues.push(RecordIssue::VegetationExceedsArea);
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            issues.push(RecordIssue::CoordinatesOutOfRange);
        }

        issues
    }
}

/// A violated record invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordIssue {
    /// `state_code` is not a Brazilian federative unit.
    UnknownState,
    /// `area_total` is negative or NaN.
    NegativeArea,
    /// Native vegetation area is negative or NaN.
    NegativeVegetationArea,
    /// Native vegetation area is larger than the total area.
    VegetationExceedsArea,
    /// Latitude/longitude outside WGS84 bounds.
    CoordinatesOutOfRange,
}

impl std::fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownState => write!(f, "unknown state code"),
            Self::NegativeArea => write!(f, "negative total area"),
            Self::NegativeVegetationArea => write!(f, "negative native vegetation area"),
            Self::VegetationExceedsArea => write!(f, "native vegetation exceeds total area"),
            Self::CoordinatesOutOfRange => write!(f, "coordinates out of range"),
        }
    }
}

/// Counts of each [`RecordIssue`] across a record collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Number of records inspected.
    pub records: u64,
    /// Number of records with at least one issue.
    pub records_with_issues: u64,
    /// Issue counts, ordered by issue kind.
    pub issues: std::collections::BTreeMap<RecordIssue, u64>,
}

impl ValidationSummary {
    /// Validates every record and tallies the issues found.
    #[must_use]
    pub fn collect(records: &[PropertyRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.records += 1;
            let issues = record.validate();
            if !issues.is_empty() {
                summary.records_with_issues += 1;
            }
            for issue in issues {
                *summary.issues.entry(issue).or_insert(0) += 1;
            }
        }
        summary
    }
}
