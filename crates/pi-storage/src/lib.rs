//! Plate ingest storage.
//!
//! This crate provides:
//! - `RecordFrame`: an Arrow record batch read from one CSV
//! - The `TableWriter` contract shared by both output backends
//! - Schema-fixed Parquet writer with reference alignment
//! - Append-only DuckDB writer on a shared connection

pub mod align;
pub mod duckdb_store;
pub mod error;
pub mod frame;
pub mod parquet_writer;
pub mod writer;

pub use align::align_to_schema;
pub use duckdb_store::{DuckDbStore, DuckDbTableWriter};
pub use error::StorageError;
pub use frame::{probe_csv, read_header, CsvProbe, RecordFrame};
pub use parquet_writer::{ParquetTableWriter, ParquetWriterConfig};
pub use writer::{TableWriter, WriterState, WriterStats};

/// File extension of columnar outputs.
pub const PARQUET_EXTENSION: &str = "parquet";

/// Rows per Arrow batch when decoding CSV.
pub const DEFAULT_CSV_BATCH_SIZE: usize = 8192;
