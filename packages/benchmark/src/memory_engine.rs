//! Direct evaluation over the in-memory snapshot.

use std::collections::BTreeMap;

use rural_registry_benchmark_models::{
    LargestProperty, QueryOutput, QuerySpec, StateArea, StateCount, VegetationShare, YearCount,
};
use rural_registry_property_models::PropertyRecord;
use rural_registry_spatial::{BoundaryPolygon, Coordinate, haversine_km};

use crate::{BenchmarkError, QueryEngine};

/// Evaluates queries by iterating a borrowed record slice.
pub struct InMemoryEngine<'a> {
    records: &'a [PropertyRecord],
}

impl<'a> InMemoryEngine<'a> {
    /// Creates an engine over `records`, which must be in snapshot order.
    #[must_use]
    pub const fn new(records: &'a [PropertyRecord]) -> Self {
        Self { records }
    }

    fn in_states<'s>(
        &'s self,
        states: &'s [String],
    ) -> impl Iterator<Item = &'a PropertyRecord> + 's {
        self.records
            .iter()
            .filter(move |r| states.iter().any(|s| *s == r.state_code))
    }

    fn area_by_state(&self, states: &[String]) -> Vec<StateArea> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for record in self.in_states(states) {
            *totals.entry(record.state_code.as_str()).or_default() += record.area_total;
        }

        let mut rows: Vec<StateArea> = totals
            .into_iter()
            .map(|(state_code, total_area)| StateArea {
                state_code: state_code.to_string(),
                total_area,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_area
                .total_cmp(&a.total_area)
                .then_with(|| a.state_code.cmp(&b.state_code))
        });
        rows
    }

    fn in_polygon(&self, states: &[String], polygon: &BoundaryPolygon) -> Vec<PropertyRecord> {
        self.in_states(states)
            .filter(|r| polygon.contains(r.latitude, r.longitude))
            .cloned()
            .collect()
    }

    fn registrations_by_year(&self) -> Vec<YearCount> {
        let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
        for year in self.records.iter().filter_map(PropertyRecord::registration_year) {
            *counts.entry(year).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(year, count)| YearCount { year, count })
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn vegetation_share(&self) -> Option<VegetationShare> {
        let mut ratio_sum = 0.0;
        let mut vegetation_sum = 0.0;
        let mut area_sum = 0.0;
        let mut records = 0u64;

        for record in self.records {
            if let Some(ratio) = record.native_vegetation_ratio() {
                ratio_sum += ratio;
                vegetation_sum += record.area_native_vegetation_remaining;
                area_sum += record.area_total;
                records += 1;
            }
        }

        (records > 0).then(|| VegetationShare {
            mean_of_ratios: ratio_sum / records as f64,
            ratio_of_means: vegetation_sum / area_sum,
            records,
        })
    }

    fn properties_by_state(&self) -> Vec<StateCount> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for record in self.records {
            *counts.entry(record.state_code.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(state_code, count)| StateCount {
                state_code: state_code.to_string(),
                count,
            })
            .collect()
    }

    fn largest(&self, reference: Coordinate) -> Result<Option<LargestProperty>, BenchmarkError> {
        // Strict comparison keeps the earliest record on ties.
        let mut best: Option<&PropertyRecord> = None;
        for record in self.records.iter().filter(|r| r.area_total.is_finite()) {
            if best.is_none_or(|b| record.area_total > b.area_total) {
                best = Some(record);
            }
        }

        let Some(record) = best else {
            return Ok(None);
        };

        let location = Coordinate::new(record.latitude, record.longitude)?;
        Ok(Some(LargestProperty {
            record: record.clone(),
            distance_km: haversine_km(location, reference),
        }))
    }

    #[allow(clippy::cast_precision_loss)]
    fn above_state_average(&self) -> Vec<StateCount> {
        let mut totals: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
        for record in self.records {
            let entry = totals.entry(record.state_code.as_str()).or_default();
            entry.0 += record.area_total;
            entry.1 += 1;
        }

        let mut above: BTreeMap<&str, u64> = BTreeMap::new();
        for record in self.records {
            let state = record.state_code.as_str();
            if let Some(&(sum, count)) = totals.get(state)
                && record.area_total > sum / count as f64
            {
                *above.entry(state).or_default() += 1;
            }
        }

        above
            .into_iter()
            .map(|(state_code, count)| StateCount {
                state_code: state_code.to_string(),
                count,
            })
            .collect()
    }
}

impl QueryEngine for InMemoryEngine<'_> {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn execute(&self, query: &QuerySpec) -> Result<QueryOutput, BenchmarkError> {
        Ok(match query {
            QuerySpec::AreaByState { states } => QueryOutput::StateAreas(self.area_by_state(states)),
            QuerySpec::PropertiesInStates { states } => {
                QueryOutput::Records(self.in_states(states).cloned().collect())
            }
            QuerySpec::PropertiesInPolygon { states, polygon } => {
                QueryOutput::Records(self.in_polygon(states, polygon))
            }
            QuerySpec::RegistrationsByYear => QueryOutput::YearCounts(self.registrations_by_year()),
            QuerySpec::NativeVegetationShare => {
                QueryOutput::VegetationShare(self.vegetation_share())
            }
            QuerySpec::PropertiesByState => QueryOutput::StateCounts(self.properties_by_state()),
            QuerySpec::LargestProperty { reference } => {
                QueryOutput::Largest(self.largest(*reference)?)
            }
            QuerySpec::AboveStateAverage => QueryOutput::StateCounts(self.above_state_average()),
        })
    }
}
