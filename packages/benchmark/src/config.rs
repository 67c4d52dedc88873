//! Benchmark configuration.
//!
//! The defaults are embedded from `benchmark.toml` at compile time. A user
//! file passed on the command line is parsed the same way; any field it
//! leaves out keeps its default.

use std::path::Path;

use rural_registry_database::{ColumnMapping, EngineSettings};
use rural_registry_property_models::states::{Region, is_state_code};
use rural_registry_spatial::{BoundaryPolygon, Coordinate, SpatialError};
use serde::{Deserialize, Serialize};

use crate::BenchmarkError;

/// Embedded default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../benchmark.toml");

/// A point given as plain degrees in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Parameters for a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BenchmarkConfig {
    /// Runs per engine per query; the fastest is reported.
    pub repetitions: u32,
    /// `DuckDB` worker threads.
    pub threads: u32,
    /// `DuckDB` memory cap.
    pub memory_limit: String,
    /// States summed by the area-by-state query.
    pub area_states: Vec<String>,
    /// Region whose states the state-filter query selects.
    pub filter_region: Region,
    /// States the polygon query restricts to before the containment test.
    pub polygon_states: Vec<String>,
    /// Polygon ring as `(longitude, latitude)` pairs.
    pub polygon: Vec<(f64, f64)>,
    /// `GeoJSON` `Polygon` geometry or feature; replaces [`Self::polygon`]
    /// when set.
    pub polygon_geojson: Option<String>,
    /// Point the largest-property query measures its distance to.
    pub reference_point: ReferencePoint,
    /// Source column names used by dataset import.
    pub columns: ColumnMapping,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            repetitions: 1,
            threads: 4,
            memory_limit: "2GB".to_string(),
            area_states: vec!["MS".to_string(), "MT".to_string()],
            filter_region: Region::Sudeste,
            polygon_states: vec!["GO".to_string(), "MS".to_string(), "MT".to_string()],
            polygon: vec![
                (-53.532_507_2, -19.463_258_2),
                (-51.049_597_1, -19.162_584_1),
                (-51.373_450_1, -16.192_426_2),
                (-53.818_151_8, -16.401_078_3),
                (-53.532_507_2, -19.463_258_2),
            ],
            polygon_geojson: None,
            reference_point: ReferencePoint {
                latitude: -15.826_691,
                longitude: -47.921_822,
            },
            columns: ColumnMapping::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Loads the configuration from `path`, or the embedded defaults when
    /// `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Config`] if the file cannot be read,
    /// parsed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, BenchmarkError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| BenchmarkError::Config {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                log::info!("Loaded benchmark config from {}", path.display());
                Self::parse(&text)
            }
            None => Self::parse(DEFAULT_CONFIG),
        }
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Config`] on malformed TOML or invalid
    /// values.
    pub fn parse(text: &str) -> Result<Self, BenchmarkError> {
        let mut config: Self = toml::from_str(text).map_err(|e| BenchmarkError::Config {
            message: e.to_string(),
        })?;
        for code in config
            .area_states
            .iter_mut()
            .chain(config.polygon_states.iter_mut())
        {
            *code = code.trim().to_ascii_uppercase();
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges, state codes, and geometry.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Config`] describing the first problem
    /// found.
    pub fn validate(&self) -> Result<(), BenchmarkError> {
        if self.repetitions == 0 {
            return Err(BenchmarkError::Config {
                message: "repetitions must be at least 1".to_string(),
            });
        }
        if self.threads == 0 {
            return Err(BenchmarkError::Config {
                message: "threads must be at least 1".to_string(),
            });
        }

        if let Some(code) = self
            .area_states
            .iter()
            .chain(&self.polygon_states)
            .find(|code| !is_state_code(code))
        {
            return Err(BenchmarkError::Config {
                message: format!("unknown state code '{code}'"),
            });
        }

        self.polygon().map_err(|e| BenchmarkError::Config {
            message: format!("polygon: {e}"),
        })?;
        self.reference().map_err(|e| BenchmarkError::Config {
            message: format!("reference_point: {e}"),
        })?;

        Ok(())
    }

    /// `DuckDB` settings for the run.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            threads: self.threads,
            memory_limit: self.memory_limit.clone(),
        }
    }

    /// Builds the configured polygon, preferring [`Self::polygon_geojson`]
    /// over the vertex list.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the `GeoJSON` cannot be parsed or the ring
    /// is invalid.
    pub fn polygon(&self) -> Result<BoundaryPolygon, SpatialError> {
        match &self.polygon_geojson {
            Some(geojson) => BoundaryPolygon::from_geojson(geojson),
            None => BoundaryPolygon::new(&self.polygon),
        }
    }

    /// The configured reference point.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CoordinateOutOfRange`] for invalid degrees.
    pub fn reference(&self) -> Result<Coordinate, SpatialError> {
        Coordinate::new(self.reference_point.latitude, self.reference_point.longitude)
    }

    /// States selected by [`Self::filter_region`].
    #[must_use]
    pub fn filter_states(&self) -> Vec<String> {
        self.filter_region
            .states()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_default_impl() {
        let config = BenchmarkConfig::load(None).unwrap();
        assert_eq!(config, BenchmarkConfig::default());
    }

    #[test]
    fn default_filter_is_sudeste() {
        let config = BenchmarkConfig::default();
        let mut states = config.filter_states();
        states.sort();
        assert_eq!(states, vec!["ES", "MG", "RJ", "SP"]);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = BenchmarkConfig::parse(
            r#"
            repetitions = 3
            filter_region = "sul"
            polygon_states = ["go", "ms"]
            "#,
        )
        .unwrap();
        assert_eq!(config.repetitions, 3);
        assert_eq!(config.polygon_states, vec!["GO", "MS"]);
        assert_eq!(config.filter_region, Region::Sul);
        assert_eq!(config.area_states, vec!["MS", "MT"]);
        assert!(config.polygon().unwrap().contains(-17.5, -52.0));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(BenchmarkConfig::parse("repetitions = 0").is_err());
        assert!(BenchmarkConfig::parse(r#"area_states = ["XX"]"#).is_err());
        assert!(BenchmarkConfig::parse("polygon = [[0.0, 0.0], [1.0, 1.0]]").is_err());
        assert!(
            BenchmarkConfig::parse("[reference_point]\nlatitude = 95.0\nlongitude = 0.0").is_err()
        );
        assert!(BenchmarkConfig::parse("repetitions = \"many\"").is_err());
    }

    #[test]
    fn geojson_polygon_replaces_vertex_list() {
        let config = BenchmarkConfig::parse(
            r#"
            polygon_geojson = '{"type":"Polygon","coordinates":[[[0,0],[2,0],[2,2],[0,2],[0,0]]]}'
            "#,
        )
        .unwrap();
        let polygon = config.polygon().unwrap();
        assert!(polygon.contains(1.0, 1.0));
        assert!(!polygon.contains(-17.5, -52.0));
        assert_eq!(polygon.vertices().len(), 5);

        let point = r#"polygon_geojson = '{"type":"Point","coordinates":[0,0]}'"#;
        assert!(BenchmarkConfig::parse(point).is_err());
    }

    #[test]
    fn engine_settings_follow_config() {
        let config = BenchmarkConfig::parse("threads = 2\nmemory_limit = \"512MB\"").unwrap();
        let settings = config.engine_settings();
        assert_eq!(settings.threads, 2);
        assert_eq!(settings.memory_limit, "512MB");
    }
}
