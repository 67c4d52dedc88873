//! The standard query suite.

use rural_registry_benchmark_models::{QueryDefinition, QuerySpec};

use crate::{BenchmarkConfig, BenchmarkError};

/// Builds the eight-query suite from `config`.
///
/// # Errors
///
/// Returns [`BenchmarkError::Spatial`] if the configured polygon or
/// reference point is invalid.
pub fn standard_suite(config: &BenchmarkConfig) -> Result<Vec<QueryDefinition>, BenchmarkError> {
    let polygon = config.polygon()?;
    let reference = config.reference()?;

    let define = |id: u8, name: &str, description: String, spec: QuerySpec| QueryDefinition {
        id,
        name: name.to_string(),
        description,
        spec,
    };

    Ok(vec![
        define(
            1,
            "area_by_state",
            format!("Total area per state ({})", config.area_states.join(", ")),
            QuerySpec::AreaByState {
                states: config.area_states.clone(),
            },
        ),
        define(
            2,
            "properties_in_region",
            format!("Properties in the {} region", config.filter_region.label()),
            QuerySpec::PropertiesInStates {
                states: config.filter_states(),
            },
        ),
        define(
            3,
            "properties_in_polygon",
            format!(
                "Properties in {} inside the study polygon",
                config.polygon_states.join(", ")
            ),
            QuerySpec::PropertiesInPolygon {
                states: config.polygon_states.clone(),
                polygon,
            },
        ),
        define(
            4,
            "registrations_by_year",
            "Registrations per year".to_string(),
            QuerySpec::RegistrationsByYear,
        ),
        define(
            5,
            "native_vegetation_share",
            "Average share of remaining native vegetation".to_string(),
            QuerySpec::NativeVegetationShare,
        ),
        define(
            6,
            "properties_by_state",
            "Property count per state".to_string(),
            QuerySpec::PropertiesByState,
        ),
        define(
            7,
            "largest_property",
            format!(
                "Largest property and its distance to ({}, {})",
                reference.latitude(),
                reference.longitude()
            ),
            QuerySpec::LargestProperty { reference },
        ),
        define(
            8,
            "above_state_average",
            "Properties larger than their state's average, per state".to_string(),
            QuerySpec::AboveStateAverage,
        ),
    ])
}

/// Parses a comma-separated list of query ids such as `"1,3,7"`.
///
/// # Errors
///
/// Returns [`BenchmarkError::Config`] if an entry is not a number.
pub fn parse_query_ids(list: &str) -> Result<Vec<u8>, BenchmarkError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u8>().map_err(|e| BenchmarkError::Config {
                message: format!("invalid query id '{s}': {e}"),
            })
        })
        .collect()
}

/// Keeps the queries whose id is in `ids`, in suite order.
///
/// # Errors
///
/// Returns [`BenchmarkError::Config`] if an id does not exist in the
/// suite.
pub fn select(
    suite: Vec<QueryDefinition>,
    ids: &[u8],
) -> Result<Vec<QueryDefinition>, BenchmarkError> {
    if let Some(missing) = ids.iter().find(|id| !suite.iter().any(|q| q.id == **id)) {
        return Err(BenchmarkError::Config {
            message: format!("no query with id {missing}"),
        });
    }

    Ok(suite.into_iter().filter(|q| ids.contains(&q.id)).collect())
}
