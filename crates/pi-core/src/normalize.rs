//! Declared column type coercion.
//!
//! CSV type inference drifts between directories: a column that is integer
//! in one well reads as float in the next because of a single missing value.
//! A conversion policy collapses every frame of a table kind to one declared
//! type per column before it is compared or written.

use std::sync::Arc;

use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use pi_common::{Result, KEY_COLUMNS};
use pi_config::TypeConversionPolicy;
use pi_storage::RecordFrame;

/// Type a column of `data_type` takes under `policy`.
pub fn target_type(name: &str, data_type: &DataType, policy: TypeConversionPolicy) -> DataType {
    match policy {
        TypeConversionPolicy::None => data_type.clone(),
        TypeConversionPolicy::IntToFloat => {
            if data_type == &DataType::Int64 && !KEY_COLUMNS.contains(&name) {
                DataType::Float64
            } else {
                data_type.clone()
            }
        }
        // Key columns are converted too; see DESIGN.md for the open question.
        TypeConversionPolicy::AllToString => DataType::Utf8,
    }
}

/// Coerce every column of `frame` per `policy`.
pub fn normalize_types(frame: RecordFrame, policy: TypeConversionPolicy) -> Result<RecordFrame> {
    if policy == TypeConversionPolicy::None {
        return Ok(frame);
    }

    let schema = frame.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(schema.fields().len());
    for (field, column) in schema.fields().iter().zip(frame.batch().columns()) {
        let to = target_type(field.name(), field.data_type(), policy);
        if &to == field.data_type() {
            fields.push(field.as_ref().clone());
            columns.push(column.clone());
        } else {
            columns.push(cast(column, &to)?);
            fields.push(Field::new(field.name(), to, field.is_nullable()));
        }
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    Ok(RecordFrame::new(batch))
}
