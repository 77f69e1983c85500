//! Column schema model and key column names.
//!
//! Schemas are compared structurally: two schemas are compatible iff their
//! (name, type) sequences are equal in order. Nullability is not part of the
//! comparison.

use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Per-directory identifier column, always first.
pub const TABLE_NUMBER: &str = "TableNumber";
pub const IMAGE_NUMBER: &str = "ImageNumber";
pub const OBJECT_NUMBER: &str = "ObjectNumber";

/// Columns never prefixed with the table kind.
pub const KEY_COLUMNS: [&str; 3] = [IMAGE_NUMBER, OBJECT_NUMBER, TABLE_NUMBER];

/// Schema version for run reports.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// The closed set of column types an ingested table can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    /// Only used for `TableNumber`.
    UInt32,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::UInt32 => DataType::UInt32,
        }
    }

    /// Map an Arrow type back to a column type, if it is one we carry.
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int64 => Some(ColumnType::Int64),
            DataType::Float64 => Some(ColumnType::Float64),
            DataType::Boolean => Some(ColumnType::Boolean),
            DataType::Utf8 => Some(ColumnType::Utf8),
            DataType::UInt32 => Some(ColumnType::UInt32),
            _ => None,
        }
    }

    /// Collapse a type inferred from CSV text into the carried set.
    ///
    /// Columns with no values at all infer as `Null` and become `Float64`;
    /// dates, times and anything else become `Utf8`.
    pub fn from_inferred(data_type: &DataType) -> Self {
        match data_type {
            DataType::Null => ColumnType::Float64,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Int64,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnType::Float64,
            DataType::Boolean => ColumnType::Boolean,
            _ => ColumnType::Utf8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ColumnType::Int64 | ColumnType::UInt32)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int64 => write!(f, "int64"),
            ColumnType::Float64 => write!(f, "float64"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Utf8 => write!(f, "utf8"),
            ColumnType::UInt32 => write!(f, "uint32"),
        }
    }
}

/// One (name, type) pair of a column schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnField {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnField {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered sequence of (name, type) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSchema {
    fields: Vec<ColumnField>,
}

impl ColumnSchema {
    pub fn new(fields: Vec<ColumnField>) -> Self {
        Self { fields }
    }

    /// Read the (name, type) sequence out of an Arrow schema.
    pub fn from_arrow(schema: &Schema) -> Result<Self> {
        let fields = schema
            .fields()
            .iter()
            .map(|field| {
                ColumnType::from_arrow(field.data_type())
                    .map(|column_type| ColumnField::new(field.name().clone(), column_type))
                    .ok_or_else(|| Error::UnsupportedType {
                        column: field.name().clone(),
                        data_type: field.data_type().to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// Build the Arrow schema; `TableNumber` is the only non-nullable column.
    pub fn to_arrow(&self) -> Schema {
        Schema::new(
            self.fields
                .iter()
                .map(|f| Field::new(&f.name, f.column_type.to_arrow(), f.name != TABLE_NUMBER))
                .collect::<Vec<_>>(),
        )
    }

    pub fn fields(&self) -> &[ColumnField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Compatibility is exact (name, type) equality, in order.
    pub fn is_compatible_with(&self, other: &ColumnSchema) -> bool {
        self == other
    }

    /// Describe the first point where two schemas diverge.
    pub fn first_difference(&self, other: &ColumnSchema) -> Option<String> {
        for (i, (a, b)) in self.fields.iter().zip(other.fields.iter()).enumerate() {
            if a != b {
                return Some(format!(
                    "column {i}: {}:{} vs {}:{}",
                    a.name, a.column_type, b.name, b.column_type
                ));
            }
        }
        if self.len() != other.len() {
            return Some(format!("{} columns vs {} columns", self.len(), other.len()));
        }
        None
    }
}

impl fmt::Display for ColumnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|c| format!("{}:{}", c.name, c.column_type))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
