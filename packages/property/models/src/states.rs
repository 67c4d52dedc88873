//! Brazilian federative unit (UF) utilities.
//!
//! Provides mappings between two-letter state codes, full state names, and
//! the five IBGE macro-regions for the 26 states + the Federal District.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Two-letter codes for the 26 states + DF.
pub const STATE_CODES: &[&str] = &[
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB", "PR",
    "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

/// IBGE macro-region.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Region {
    /// Norte
    Norte,
    /// Nordeste
    Nordeste,
    /// Centro-Oeste
    CentroOeste,
    /// Sudeste
    Sudeste,
    /// Sul
    Sul,
}

impl Region {
    /// Returns the state codes belonging to this region.
    #[must_use]
    pub const fn states(self) -> &'static [&'static str] {
        match self {
            Self::Norte => &["AC", "AP", "AM", "PA", "RO", "RR", "TO"],
            Self::Nordeste => &["AL", "BA", "CE", "MA", "PB", "PE", "PI", "RN", "SE"],
            Self::CentroOeste => &["DF", "GO", "MT", "MS"],
            Self::Sudeste => &["ES", "MG", "RJ", "SP"],
            Self::Sul => &["PR", "RS", "SC"],
        }
    }

    /// Returns the Portuguese display name of the region.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Norte => "Norte",
            Self::Nordeste => "Nordeste",
            Self::CentroOeste => "Centro-Oeste",
            Self::Sudeste => "Sudeste",
            Self::Sul => "Sul",
        }
    }
}

/// Maps a state code to its full name.
///
/// Returns `"Unknown"` for unrecognized codes.
#[must_use]
pub fn state_name(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "AC" => "Acre",
        "AL" => "Alagoas",
        "AP" => "Amapá",
        "AM" => "Amazonas",
        "BA" => "Bahia",
        "CE" => "Ceará",
        "DF" => "Distrito Federal",
        "ES" => "Espírito Santo",
        "GO" => "Goiás",
        "MA" => "Maranhão",
        "MT" => "Mato Grosso",
        "MS" => "Mato Grosso do Sul",
        "MG" => "Minas Gerais",
        "PA" => "Pará",
        "PB" => "Paraíba",
        "PR" => "Paraná",
        "PE" => "Pernambuco",
        "PI" => "Piauí",
        "RJ" => "Rio de Janeiro",
        "RN" => "Rio Grande do Norte",
        "RS" => "Rio Grande do Sul",
        "RO" => "Rondônia",
        "RR" => "Roraima",
        "SC" => "Santa Catarina",
        "SP" => "São Paulo",
        "SE" => "Sergipe",
        "TO" => "Tocantins",
        _ => "Unknown",
    }
}

/// Returns the macro-region a state code belongs to.
#[must_use]
pub fn state_region(code: &str) -> Option<Region> {
    let code = code.to_ascii_uppercase();
    [
        Region::Norte,
        Region::Nordeste,
        Region::CentroOeste,
        Region::Sudeste,
        Region::Sul,
    ]
    .into_iter()
    .find(|region| region.states().contains(&code.as_str()))
}

/// Returns `true` if `code` is one of the 27 federative units.
#[must_use]
pub fn is_state_code(code: &str) -> bool {
    STATE_CODES.contains(&code.to_ascii_uppercase().as_str())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use strum::IntoEnumIterator as _;

    use super::*;

    #[test]
    fn state_count() {
        assert_eq!(STATE_CODES.len(), 27);
    }

    #[test]
    fn regions_partition_states() {
        let mut seen: Vec<&str> = Region::iter().flat_map(|r| r.states().iter().copied()).collect();
        seen.sort_unstable();
        let mut all = STATE_CODES.to_vec();
        all.sort_unstable();
        assert_eq!(seen, all);
    }

    #[test]
    fn name_coverage() {
        for code in STATE_CODES {
            assert_ne!(state_name(code), "Unknown", "no name for UF: {code}");
            assert!(state_region(code).is_some(), "no region for UF: {code}");
        }
    }

    #[test]
    fn unknown_code() {
        assert_eq!(state_name("XX"), "Unknown");
        assert_eq!(state_region("XX"), None);
        assert!(!is_state_code("XX"));
    }

    #[test]
    fn sudeste_matches_southeast_filter() {
        assert_eq!(Region::Sudeste.states(), &["ES", "MG", "RJ", "SP"]);
        assert_eq!(state_region("sp"), Some(Region::Sudeste));
    }

    #[test]
    fn region_parses_case_insensitively() {
        assert_eq!(Region::from_str("sudeste").unwrap(), Region::Sudeste);
        assert_eq!(Region::from_str("Centro_Oeste").unwrap(), Region::CentroOeste);
        assert_eq!(Region::CentroOeste.to_string(), "centro_oeste");
    }
}
