#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` table store for the rural property registry.
//!
//! The registry lives in a single `properties` table inside a `DuckDB` file
//! (`data/registry.duckdb` by default). Raw exports are imported with
//! `DuckDB`'s own parquet/CSV/JSON readers, and the full table is loaded
//! back as an ordered, immutable snapshot of
//! [`PropertyRecord`](rural_registry_property_models::PropertyRecord)s.

pub mod paths;
pub mod registry_db;

use serde::{Deserialize, Serialize};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input file extension has no matching `DuckDB` reader.
    #[error("Unsupported dataset format: {path}")]
    UnsupportedFormat {
        /// Path of the rejected file.
        path: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// `DuckDB` execution settings applied right after a connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineSettings {
    /// Worker threads (`SET threads`).
    pub threads: u32,
    /// Memory cap (`SET memory_limit`), e.g. `"2GB"`.
    pub memory_limit: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            threads: 4,
            memory_limit: "2GB".to_string(),
        }
    }
}

/// Source column names for each registry field.
///
/// Defaults are the column names of the public CAR environmental-themes
/// export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ColumnMapping {
    /// CAR registry number column.
    pub registry_id: String,
    /// State code column.
    pub state_code: String,
    /// Municipality name column.
    pub municipality: String,
    /// IBGE municipality code column.
    pub ibge_code: String,
    /// Total area column (hectares).
    pub area_total: String,
    /// Remaining native vegetation column (hectares).
    pub area_native_vegetation_remaining: String,
    /// Registration date column.
    pub registration_date: String,
    /// Registration status column.
    pub registration_status: String,
    /// Registration condition column.
    pub condition_status: String,
    /// Latitude column.
    pub latitude: String,
    /// Longitude column.
    pub longitude: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            registry_id: "registro_car".to_string(),
            state_code: "uf".to_string(),
            municipality: "municipio".to_string(),
            ibge_code: "codigo_ibge".to_string(),
            area_total: "area_do_imovel".to_string(),
            area_native_vegetation_remaining: "area_remanescente_vegetacao_nativa".to_string(),
            registration_date: "data_inscricao".to_string(),
            registration_status: "situacao_cadastro".to_string(),
            condition_status: "condicao_cadastro".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
        }
    }
}

/// Quotes a SQL identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a SQL string literal, doubling embedded quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("uf"), "\"uf\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("MS"), "'MS'");
        assert_eq!(quote_literal("D'Oeste"), "'D''Oeste'");
    }

    #[test]
    fn default_mapping_uses_car_export_names() {
        let mapping = ColumnMapping::default();
        assert_eq!(mapping.state_code, "uf");
        assert_eq!(mapping.area_total, "area_do_imovel");
    }
}
