//! Error types for storage operations.

use std::path::PathBuf;
use thiserror::Error;

use pi_common::ColumnSchema;

/// Errors that can occur while reading frames or writing tables.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error on a specific file
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV header or record could not be parsed
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV parsed but breaks the well-formedness contract
    #[error("invalid CSV {path}: {reason}")]
    InvalidCsv { path: PathBuf, reason: String },

    /// Arrow decode or compute error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encode error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Relational store rejected a statement
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Aligned frame disagrees with the fixed schema
    #[error("schema mismatch for {kind}: {detail}")]
    SchemaMismatch {
        kind: String,
        expected: ColumnSchema,
        actual: ColumnSchema,
        detail: String,
    },

    /// Column type outside the carried set
    #[error("unsupported column type {data_type} for column {column}")]
    UnsupportedType { column: String, data_type: String },

    /// Write or close after the writer was closed
    #[error("writer for {kind} is closed")]
    WriterClosed { kind: String },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StorageError> for pi_common::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io { path, source } => pi_common::Error::IoAt { path, source },
            StorageError::Csv { path, source } => pi_common::Error::Csv {
                path,
                message: source.to_string(),
            },
            StorageError::InvalidCsv { path, reason } => pi_common::Error::Csv {
                path,
                message: reason,
            },
            StorageError::Arrow(e) => pi_common::Error::Arrow(e),
            StorageError::Parquet(e) => pi_common::Error::Store(e.to_string()),
            StorageError::DuckDb(e) => pi_common::Error::Store(e.to_string()),
            StorageError::SchemaMismatch {
                kind,
                expected,
                actual,
                ..
            } => pi_common::Error::SchemaMismatch {
                kind,
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            StorageError::UnsupportedType { column, data_type } => {
                pi_common::Error::UnsupportedType { column, data_type }
            }
            StorageError::WriterClosed { kind } => pi_common::Error::WriterClosed { kind },
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
