//! Configuration file loading.
//!
//! The file is TOML with three sections:
//!
//! ```toml
//! [filenames]
//! image = "Image.csv"
//!
//! [ingestion]
//! engine = "parquet"
//! skip_image_prefix = true
//!
//! [schema]
//! type_conversion = "int2float"
//! reference_option = "sample"
//! ref_fraction = 1.0
//! seed = 42
//! ```
//!
//! Every field is optional. [`RawConfig`] mirrors the file verbatim;
//! [`IngestConfig`] is the decoded form the ingest core consumes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::options::{Backend, ReferenceOption, TypeConversionPolicy};
use crate::DEFAULT_IMAGE_FILENAME;

/// Errors from loading or decoding configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("ref_fraction must be in (0.0, 1.0], got {0}")]
    InvalidFraction(f64),

    #[error("unknown ingestion engine: {0}")]
    UnknownEngine(String),

    #[error("unknown type conversion: {0} (expected none, int2float or all2string)")]
    UnknownConversion(String),

    #[error("image filename must not be empty")]
    EmptyImageFilename,

    #[error("reference_option must be \"sample\" or a directory name")]
    EmptyReferenceDirectory,
}

impl From<ConfigError> for pi_common::Error {
    fn from(err: ConfigError) -> Self {
        pi_common::Error::Config(err.to_string())
    }
}

// ── Raw file layout ─────────────────────────────────────────────────────

/// The configuration file as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub filenames: RawFilenames,
    pub ingestion: RawIngestion,
    pub schema: RawSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawFilenames {
    pub image: String,
}

impl Default for RawFilenames {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_FILENAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawIngestion {
    pub engine: String,
    pub skip_image_prefix: bool,
}

impl Default for RawIngestion {
    fn default() -> Self {
        Self {
            engine: Backend::default().to_string(),
            skip_image_prefix: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSchema {
    pub type_conversion: String,
    pub reference_option: String,
    pub ref_fraction: f64,
    pub seed: Option<u64>,
}

impl Default for RawSchema {
    fn default() -> Self {
        Self {
            type_conversion: TypeConversionPolicy::default().to_string(),
            reference_option: "sample".to_string(),
            ref_fraction: 1.0,
            seed: None,
        }
    }
}

// ── Decoded configuration ───────────────────────────────────────────────

/// Decoded ingest settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestConfig {
    /// File name of the designated image CSV in every directory.
    pub image_filename: String,
    pub backend: Backend,
    /// Leave the image table's columns unprefixed.
    pub skip_image_prefix: bool,
    pub type_conversion: TypeConversionPolicy,
    pub reference: ReferenceOption,
    /// Seed for reference sampling; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            image_filename: DEFAULT_IMAGE_FILENAME.to_string(),
            backend: Backend::default(),
            skip_image_prefix: true,
            type_conversion: TypeConversionPolicy::default(),
            reference: ReferenceOption::default(),
            seed: None,
        }
    }
}

impl IngestConfig {
    /// Load and decode a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from file when given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::decode(raw)
    }

    /// Decode string settings into tagged variants and validate them.
    pub fn decode(raw: RawConfig) -> Result<Self, ConfigError> {
        let image_filename = raw.filenames.image.trim().to_string();
        if image_filename.is_empty() {
            return Err(ConfigError::EmptyImageFilename);
        }

        Ok(Self {
            image_filename,
            backend: raw.ingestion.engine.parse()?,
            skip_image_prefix: raw.ingestion.skip_image_prefix,
            type_conversion: raw.schema.type_conversion.parse()?,
            reference: ReferenceOption::decode(
                &raw.schema.reference_option,
                raw.schema.ref_fraction,
            )?,
            seed: raw.schema.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_yields_defaults() {
        let config = IngestConfig::from_toml_str("").unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.reference, ReferenceOption::Sample { fraction: 1.0 });
        assert_eq!(config.type_conversion, TypeConversionPolicy::IntToFloat);
    }

    #[test]
    fn full_file_decodes() {
        let config = IngestConfig::from_toml_str(
            r#"
[filenames]
image = "image.csv"

[ingestion]
engine = "duckdb"
skip_image_prefix = false

[schema]
type_conversion = "all2string"
reference_option = "sample"
ref_fraction = 0.2
seed = 7
"#,
        )
        .unwrap();

        assert_eq!(config.image_filename, "image.csv");
        assert_eq!(config.backend, Backend::Duckdb);
        assert!(!config.skip_image_prefix);
        assert_eq!(config.type_conversion, TypeConversionPolicy::AllToString);
        assert_eq!(config.reference, ReferenceOption::Sample { fraction: 0.2 });
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn directory_reference_decodes() {
        let config = IngestConfig::from_toml_str(
            "[schema]\nreference_option = \"plate1-A01\"\nref_fraction = 0.0\n",
        )
        .unwrap();
        assert_eq!(
            config.reference,
            ReferenceOption::Directory {
                name: "plate1-A01".to_string()
            }
        );
    }

    #[test]
    fn invalid_fraction_rejected() {
        let err = IngestConfig::from_toml_str("[schema]\nref_fraction = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFraction(_)));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = IngestConfig::from_toml_str("[schema]\nref_fractions = 0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_image_filename_rejected() {
        let err = IngestConfig::from_toml_str("[filenames]\nimage = \" \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyImageFilename));
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ingestion]\nengine = \"parquet\"").unwrap();
        let config = IngestConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.backend, Backend::Parquet);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = IngestConfig::from_file(Path::new("/nonexistent/ingest.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ingest.toml"));
    }
}
