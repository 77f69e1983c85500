//! Error types for plate ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for a plate ingest run.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Directory errors (20-29)
    #[error("directory {path} is invalid: {reason}")]
    DirectoryInvalid { path: PathBuf, reason: String },

    // Reference errors (30-39)
    #[error("reference selection failed: {0}")]
    ReferenceSelection(String),

    #[error("reference sampling for {kind} exhausted: {found} valid of {requested} requested")]
    ReferenceSamplingExhausted {
        kind: String,
        found: usize,
        requested: usize,
    },

    // Schema errors (40-49)
    #[error("schema mismatch for {kind}: expected {expected}, got {actual}")]
    SchemaMismatch {
        kind: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported column type {data_type} for column {column}")]
    UnsupportedType { column: String, data_type: String },

    // Store errors (50-59)
    #[error("store error: {0}")]
    Store(String),

    #[error("writer for {kind} is closed")]
    WriterClosed { kind: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    // Data errors (70-79)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in the run report.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::DirectoryInvalid { .. } => 20,
            Error::ReferenceSelection(_) => 30,
            Error::ReferenceSamplingExhausted { .. } => 31,
            Error::SchemaMismatch { .. } => 40,
            Error::UnsupportedType { .. } => 41,
            Error::Store(_) => 50,
            Error::WriterClosed { .. } => 51,
            Error::Io(_) => 60,
            Error::IoAt { .. } => 61,
            Error::Json(_) => 62,
            Error::Csv { .. } => 63,
            Error::Arrow(_) => 70,
        }
    }

    /// Whether this error must abort the whole run rather than one directory.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ReferenceSelection(_)
                | Error::SchemaMismatch { .. }
                | Error::WriterClosed { .. }
        )
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoAt {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_is_fatal() {
        let err = Error::SchemaMismatch {
            kind: "Cells".to_string(),
            expected: "a:Int64".to_string(),
            actual: "a:Utf8".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.code(), 40);
    }

    #[test]
    fn per_directory_errors_are_recoverable() {
        let io = Error::io_at("/data/a/Image.csv", std::io::Error::other("denied"));
        assert!(!io.is_fatal());
        assert!(!Error::Store("constraint".to_string()).is_fatal());
        let invalid = Error::DirectoryInvalid {
            path: PathBuf::from("/data/a"),
            reason: "missing image".to_string(),
        };
        assert!(!invalid.is_fatal());
        assert!(invalid.to_string().contains("/data/a"));
    }
}
