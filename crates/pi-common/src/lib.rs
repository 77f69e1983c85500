//! Plate ingest common types, identifiers, and errors.
//!
//! This crate provides foundational types shared across the ingest crates:
//! - Table kind and table number identity types
//! - Column schema model with structural equality
//! - Run identifiers for audit reports
//! - Common error types

pub mod error;
pub mod id;
pub mod schema;

pub use error::{Error, Result};
pub use id::{RunId, TableKind, TableNumber};
pub use schema::{
    ColumnField, ColumnSchema, ColumnType, IMAGE_NUMBER, KEY_COLUMNS, OBJECT_NUMBER,
    REPORT_SCHEMA_VERSION, TABLE_NUMBER,
};
