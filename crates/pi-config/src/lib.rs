//! Plate ingest configuration loading and validation.
//!
//! This crate provides:
//! - Raw TOML structs mirroring the on-disk configuration file
//! - Decoding of string settings into tagged variants, done once at load
//! - Semantic validation (sampling fraction range, known engine names)

pub mod options;
pub mod settings;

pub use options::{Backend, ReferenceOption, TypeConversionPolicy};
pub use settings::{ConfigError, IngestConfig, RawConfig};

/// Default name of the per-directory image CSV.
pub const DEFAULT_IMAGE_FILENAME: &str = "Image.csv";
