//! Plate ingest core.
//!
//! Reconciles per-directory CSV exports of a microscopy plate into one
//! table per table kind, written either to schema-fixed Parquet files or to
//! a DuckDB database.

pub mod discover;
pub mod exit_codes;
pub mod identifier;
pub mod logging;
pub mod normalize;
pub mod orchestrator;
pub mod prepare;
pub mod reference;
pub mod report;
pub mod transform;
pub mod writers;

pub use discover::{discover, Discovery, SourceBatch};
pub use exit_codes::ExitCode;
pub use identifier::table_number;
pub use orchestrator::{Orchestrator, RunFailure};
pub use prepare::FramePreparer;
pub use reference::{
    build_reference_tables, select_references, ReferenceSelection, ReferenceSet, ReferenceTable,
};
pub use report::{IngestReport, SkipReason};
pub use writers::WriterSet;
