//! Column renaming and identifier injection.
//!
//! Every column except the key columns is renamed to `{TableKind}_{name}`
//! unless the table kind is prefix-exempt. Renaming is purely mechanical: a
//! column that already starts with the table kind is prefixed again. A
//! `TableNumber` column holding the directory identifier is always placed
//! first; one already present in the CSV is replaced.

use std::sync::Arc;

use arrow::array::{ArrayRef, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use pi_common::{Result, TableKind, TableNumber, KEY_COLUMNS, TABLE_NUMBER};
use pi_storage::RecordFrame;

/// Name a column takes in the consolidated table.
pub fn output_column_name(kind: &TableKind, column: &str, prefix: bool) -> String {
    if !prefix || KEY_COLUMNS.contains(&column) {
        column.to_string()
    } else {
        format!("{}_{}", kind, column)
    }
}

/// Rename columns for `kind` and inject `TableNumber` as the first column.
pub fn transform_columns(
    frame: &RecordFrame,
    kind: &TableKind,
    prefix: bool,
    table_number: TableNumber,
) -> Result<RecordFrame> {
    let rows = frame.num_rows();
    let schema = frame.schema();

    let mut fields = Vec::with_capacity(schema.fields().len() + 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 1);

    fields.push(Field::new(TABLE_NUMBER, DataType::UInt32, false));
    columns.push(Arc::new(UInt32Array::from(vec![table_number.0; rows])));

    for (field, column) in schema.fields().iter().zip(frame.batch().columns()) {
        if field.name() == TABLE_NUMBER {
            continue;
        }
        let name = output_column_name(kind, field.name(), prefix);
        fields.push(Field::new(name, field.data_type().clone(), true));
        columns.push(column.clone());
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    Ok(RecordFrame::new(batch))
}
