//! Record frames and CSV reading.
//!
//! A [`RecordFrame`] is one CSV file decoded into a single Arrow
//! [`RecordBatch`]. Column types are inferred from the whole file and then
//! collapsed into the carried set (`Int64`, `Float64`, `Boolean`, `Utf8`),
//! so the only type decisions left to later stages are the declared
//! conversion policies.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use regex::Regex;
use tracing::debug;

use pi_common::{ColumnSchema, ColumnType};

use crate::error::{Result, StorageError};
use crate::DEFAULT_CSV_BATCH_SIZE;

/// Cell spellings read as missing values.
const NULL_PATTERN: &str = r"^(|nan|NaN|NAN|NA|N/A|null|NULL|None)$";

/// An in-memory rectangular table read from one CSV.
#[derive(Debug, Clone)]
pub struct RecordFrame {
    batch: RecordBatch,
}

impl RecordFrame {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Decode a whole CSV file.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let null_regex = null_regex()?;
        let mut file = File::open(path).map_err(|e| StorageError::io(path, e))?;

        let format = Format::default()
            .with_header(true)
            .with_null_regex(null_regex);
        let (inferred, records) = format.infer_schema(&mut file, None)?;

        let schema: SchemaRef = Arc::new(Schema::new(
            inferred
                .fields()
                .iter()
                .map(|f| {
                    let column_type = ColumnType::from_inferred(f.data_type());
                    Field::new(f.name(), column_type.to_arrow(), true)
                })
                .collect::<Vec<_>>(),
        ));

        file.seek(SeekFrom::Start(0))
            .map_err(|e| StorageError::io(path, e))?;
        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(DEFAULT_CSV_BATCH_SIZE)
            .build(file)?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        let batch = widen_empty_columns(concat_batches(&schema, &batches)?)?;

        debug!(
            path = %path.display(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            inferred_records = records,
            "decoded csv"
        );
        Ok(Self { batch })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// The (name, type) sequence of this frame.
    pub fn column_schema(&self) -> Result<ColumnSchema> {
        ColumnSchema::from_arrow(&self.batch.schema()).map_err(|e| match e {
            pi_common::Error::UnsupportedType { column, data_type } => {
                StorageError::UnsupportedType { column, data_type }
            }
            other => StorageError::Arrow(ArrowError::SchemaError(other.to_string())),
        })
    }
}

impl From<RecordBatch> for RecordFrame {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

fn null_regex() -> Result<Regex> {
    Regex::new(NULL_PATTERN)
        .map_err(|e| StorageError::Arrow(ArrowError::InvalidArgumentError(e.to_string())))
}

/// Columns holding no values at all read as `Float64`, whatever the
/// inference pass made of them, so an empty column does not drift from its
/// populated siblings in other directories.
fn widen_empty_columns(batch: RecordBatch) -> Result<RecordBatch> {
    if batch.num_rows() == 0 {
        return Ok(batch);
    }
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());
    let mut changed = false;
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if column.null_count() == column.len() && field.data_type() != &DataType::Float64 {
            fields.push(Field::new(field.name(), DataType::Float64, true));
            columns.push(new_null_array(&DataType::Float64, column.len()));
            changed = true;
        } else {
            fields.push(field.as_ref().clone());
            columns.push(column.clone());
        }
    }
    if !changed {
        return Ok(batch);
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Read only the header row of a CSV.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|source| StorageError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let headers = reader.headers().map_err(|source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    let names: Vec<String> = headers.iter().map(str::to_string).collect();
    if names.is_empty() || names.iter().all(|n| n.trim().is_empty()) {
        return Err(StorageError::InvalidCsv {
            path: path.to_path_buf(),
            reason: "empty header".to_string(),
        });
    }
    Ok(names)
}

/// Shape of a CSV as seen from its header and first data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvProbe {
    pub columns: usize,
}

/// Check that a CSV is well formed enough to ingest.
///
/// The header must be non-empty with unique, non-blank names, and the first
/// data row must exist and have as many fields as the header.
pub fn probe_csv(path: &Path) -> Result<CsvProbe> {
    let invalid = |reason: String| StorageError::InvalidCsv {
        path: path.to_path_buf(),
        reason,
    };

    let names = read_header(path)?;
    if let Some(blank) = names.iter().position(|n| n.trim().is_empty()) {
        return Err(invalid(format!("blank column name at position {blank}")));
    }
    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(invalid(format!("duplicate column name {name}")));
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| StorageError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let mut record = csv::StringRecord::new();
    let has_row = reader
        .read_record(&mut record)
        .map_err(|source| StorageError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    if !has_row {
        return Err(invalid("no data rows".to_string()));
    }
    if record.len() != names.len() {
        return Err(invalid(format!(
            "first row has {} fields, header has {}",
            record.len(),
            names.len()
        )));
    }

    Ok(CsvProbe {
        columns: names.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::AsArray;
    use arrow::datatypes::{Float64Type, Int64Type};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_types_collapse_to_carried_set() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "Cells.csv",
            "ImageNumber,ObjectNumber,Area,Label,Flag,Empty\n1,1,10.5,a,true,\n1,2,11,b,false,\n",
        );
        let frame = RecordFrame::from_csv(&path).unwrap();
        assert_eq!(frame.num_rows(), 2);
        let schema = frame.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(4).data_type(), &DataType::Boolean);
        assert_eq!(schema.field(5).data_type(), &DataType::Float64);
        assert_eq!(frame.column("Empty").unwrap().null_count(), 2);
    }

    #[test]
    fn test_nan_reads_as_null_float() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "Nuclei.csv", "ImageNumber,Intensity\n1,nan\n2,0.25\n");
        let frame = RecordFrame::from_csv(&path).unwrap();
        let col = frame.column("Intensity").unwrap();
        assert_eq!(col.data_type(), &DataType::Float64);
        assert!(col.is_null(0));
        assert_eq!(col.as_primitive::<Float64Type>().value(1), 0.25);
        let ids = frame.column("ImageNumber").unwrap().as_primitive::<Int64Type>();
        assert_eq!(ids.value(1), 2);
    }

    #[test]
    fn test_read_header_only() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "Image.csv", "A,B,C\n1,2,3\n");
        assert_eq!(read_header(&path).unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_probe_accepts_well_formed() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "Image.csv", "A,B\n1,2\n");
        assert_eq!(probe_csv(&path).unwrap(), CsvProbe { columns: 2 });
    }

    #[test]
    fn test_probe_rejects_header_only() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "Image.csv", "A,B\n");
        assert!(matches!(
            probe_csv(&path),
            Err(StorageError::InvalidCsv { .. })
        ));
    }

    #[test]
    fn test_probe_rejects_ragged_row_and_duplicates() {
        let tmp = TempDir::new().unwrap();
        let ragged = write(&tmp, "a.csv", "A,B\n1\n");
        assert!(probe_csv(&ragged).is_err());
        let dup = write(&tmp, "b.csv", "A,A\n1,2\n");
        assert!(probe_csv(&dup).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RecordFrame::from_csv(Path::new("/nonexistent/Cells.csv")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
