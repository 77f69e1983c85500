//! Tagged configuration variants.
//!
//! The configuration file spells these as strings (`"int2float"`,
//! `"sample"`, `"parquet"`); they are decoded here exactly once so the core
//! never matches on strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::settings::ConfigError;

/// Column type coercion applied to every frame before comparison or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeConversionPolicy {
    /// Keep inferred types.
    None,
    /// Integer columns become float, except the key columns.
    #[default]
    IntToFloat,
    /// Every column, key columns included, becomes string.
    AllToString,
}

impl FromStr for TypeConversionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "int2float" => Ok(Self::IntToFloat),
            "all2string" => Ok(Self::AllToString),
            other => Err(ConfigError::UnknownConversion(other.to_string())),
        }
    }
}

impl fmt::Display for TypeConversionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::IntToFloat => write!(f, "int2float"),
            Self::AllToString => write!(f, "all2string"),
        }
    }
}

/// How the reference schema of each table kind is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ReferenceOption {
    /// Sample a fraction of all candidate files and keep the widest.
    Sample { fraction: f64 },
    /// Use every CSV of one named directory as the reference.
    Directory { name: String },
}

impl Default for ReferenceOption {
    fn default() -> Self {
        ReferenceOption::Sample { fraction: 1.0 }
    }
}

impl ReferenceOption {
    /// Decode the `reference_option` / `ref_fraction` pair.
    ///
    /// `ref_fraction` is only validated when sampling is selected.
    pub fn decode(option: &str, fraction: f64) -> Result<Self, ConfigError> {
        let option = option.trim();
        if option.is_empty() {
            return Err(ConfigError::EmptyReferenceDirectory);
        }
        if option.eq_ignore_ascii_case("sample") {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ConfigError::InvalidFraction(fraction));
            }
            return Ok(ReferenceOption::Sample { fraction });
        }
        Ok(ReferenceOption::Directory {
            name: option.to_string(),
        })
    }
}

/// Output backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// One Parquet file per table kind, schema fixed at open.
    #[default]
    Parquet,
    /// One DuckDB table per table kind, appended row-wise.
    Duckdb,
}

impl Backend {
    pub fn is_columnar(self) -> bool {
        matches!(self, Backend::Parquet)
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "duckdb" | "sql" => Ok(Self::Duckdb),
            other => Err(ConfigError::UnknownEngine(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parquet => write!(f, "parquet"),
            Self::Duckdb => write!(f, "duckdb"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_names_decode() {
        assert_eq!("none".parse::<TypeConversionPolicy>().unwrap(), TypeConversionPolicy::None);
        assert_eq!(
            "Int2Float".parse::<TypeConversionPolicy>().unwrap(),
            TypeConversionPolicy::IntToFloat
        );
        assert_eq!(
            "all2string".parse::<TypeConversionPolicy>().unwrap(),
            TypeConversionPolicy::AllToString
        );
        assert!("float2int".parse::<TypeConversionPolicy>().is_err());
    }

    #[test]
    fn conversion_display_matches_config_spelling() {
        for policy in [
            TypeConversionPolicy::None,
            TypeConversionPolicy::IntToFloat,
            TypeConversionPolicy::AllToString,
        ] {
            assert_eq!(policy.to_string().parse::<TypeConversionPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn sample_requires_fraction_in_range() {
        assert!(matches!(
            ReferenceOption::decode("sample", 0.0),
            Err(ConfigError::InvalidFraction(_))
        ));
        assert!(matches!(
            ReferenceOption::decode("sample", 1.5),
            Err(ConfigError::InvalidFraction(_))
        ));
        assert_eq!(
            ReferenceOption::decode("SAMPLE", 0.25).unwrap(),
            ReferenceOption::Sample { fraction: 0.25 }
        );
    }

    #[test]
    fn directory_option_ignores_fraction() {
        assert_eq!(
            ReferenceOption::decode("A01-site1", 7.0).unwrap(),
            ReferenceOption::Directory {
                name: "A01-site1".to_string()
            }
        );
        assert!(matches!(
            ReferenceOption::decode("  ", 1.0),
            Err(ConfigError::EmptyReferenceDirectory)
        ));
    }

    #[test]
    fn backend_names_decode() {
        assert_eq!("Parquet".parse::<Backend>().unwrap(), Backend::Parquet);
        assert_eq!("duckdb".parse::<Backend>().unwrap(), Backend::Duckdb);
        assert!("sqlite3".parse::<Backend>().is_err());
        assert!(Backend::Parquet.is_columnar());
        assert!(!Backend::Duckdb.is_columnar());
    }
}
