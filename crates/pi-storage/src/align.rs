//! Alignment of record frames to a fixed column schema.
//!
//! The output of [`align_to_schema`] always has exactly the target's columns
//! in the target's order: target columns missing from the frame are padded
//! with nulls, frame columns missing from the target are dropped. The
//! resulting (name, type) sequence must then equal the target by value.

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef};
use arrow::record_batch::RecordBatch;

use pi_common::{ColumnField, ColumnSchema, ColumnType, TableKind};

use crate::error::{Result, StorageError};
use crate::frame::RecordFrame;

/// Reorder, pad and truncate `frame` to `target`.
///
/// `target` is only read. Fails with [`StorageError::SchemaMismatch`] when a
/// shared column carries a different type than the target declares.
pub fn align_to_schema(
    kind: &TableKind,
    frame: &RecordFrame,
    target: &ColumnSchema,
) -> Result<RecordFrame> {
    let rows = frame.num_rows();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(target.len());
    let mut actual: Vec<ColumnField> = Vec::with_capacity(target.len());

    for field in target.fields() {
        match frame.column(&field.name) {
            Some(column) => {
                let column_type = ColumnType::from_arrow(column.data_type()).ok_or_else(|| {
                    StorageError::UnsupportedType {
                        column: field.name.clone(),
                        data_type: column.data_type().to_string(),
                    }
                })?;
                actual.push(ColumnField::new(field.name.clone(), column_type));
                columns.push(column.clone());
            }
            None => {
                actual.push(field.clone());
                columns.push(new_null_array(&field.column_type.to_arrow(), rows));
            }
        }
    }

    let actual = ColumnSchema::new(actual);
    if !actual.is_compatible_with(target) {
        let detail = target
            .first_difference(&actual)
            .unwrap_or_else(|| "schemas differ".to_string());
        return Err(StorageError::SchemaMismatch {
            kind: kind.to_string(),
            expected: target.clone(),
            actual,
            detail,
        });
    }

    let batch = RecordBatch::try_new(Arc::new(target.to_arrow()), columns)?;
    Ok(RecordFrame::new(batch))
}
