//! Schema-fixed Parquet table writer.
//!
//! One file per table kind at `{output_dir}/{TableKind}.parquet`. The file's
//! schema is fixed when the writer opens and every frame is aligned to it
//! before being appended as its own row group.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use pi_common::{ColumnSchema, TableKind};

use crate::align::align_to_schema;
use crate::error::{Result, StorageError};
use crate::frame::RecordFrame;
use crate::writer::{TableWriter, WriterState, WriterStats};
use crate::PARQUET_EXTENSION;

/// Configuration for Parquet table writers.
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    /// Compression codec (default: ZSTD).
    pub compression: Compression,

    /// Upper bound on rows per row group. Frames larger than this are split.
    pub max_row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::ZSTD(ZstdLevel::default()),
            max_row_group_size: 16 * 1024 * 1024,
        }
    }
}

impl ParquetWriterConfig {
    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.max_row_group_size)
            .build()
    }
}

/// Writer for one table kind with a schema fixed at open.
pub struct ParquetTableWriter {
    kind: TableKind,
    path: PathBuf,
    schema: ColumnSchema,
    writer: Option<ArrowWriter<File>>,
    stats: WriterStats,
}

impl std::fmt::Debug for ParquetTableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetTableWriter")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("columns", &self.schema.len())
            .field("open", &self.writer.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ParquetTableWriter {
    /// Output path for a table kind.
    pub fn path_for(output_dir: &Path, kind: &TableKind) -> PathBuf {
        output_dir.join(format!("{}.{}", kind, PARQUET_EXTENSION))
    }

    /// Create the file and fix its schema. `Unopened → Open`.
    pub fn open(
        kind: TableKind,
        output_dir: &Path,
        schema: ColumnSchema,
        config: &ParquetWriterConfig,
    ) -> Result<Self> {
        fs::create_dir_all(output_dir).map_err(|e| StorageError::io(output_dir, e))?;
        let path = Self::path_for(output_dir, &kind);
        let file = File::create(&path).map_err(|e| StorageError::io(&path, e))?;

        let arrow_schema: SchemaRef = Arc::new(schema.to_arrow());
        let writer = ArrowWriter::try_new(file, arrow_schema, Some(config.properties()))?;

        info!(
            kind = %kind,
            path = %path.display(),
            columns = schema.len(),
            "opened parquet writer"
        );
        Ok(Self {
            kind,
            path,
            schema,
            writer: Some(writer),
            stats: WriterStats::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The schema fixed at open.
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    fn closed(&self) -> StorageError {
        StorageError::WriterClosed {
            kind: self.kind.to_string(),
        }
    }
}

impl TableWriter for ParquetTableWriter {
    fn kind(&self) -> &TableKind {
        &self.kind
    }

    fn state(&self) -> WriterState {
        if self.writer.is_some() {
            WriterState::Open
        } else {
            WriterState::Closed
        }
    }

    fn write(&mut self, frame: &RecordFrame) -> Result<usize> {
        if self.writer.is_none() {
            return Err(self.closed());
        }
        let aligned = align_to_schema(&self.kind, frame, &self.schema)?;
        let rows = aligned.num_rows();
        if rows == 0 {
            return Ok(0);
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed());
        };
        writer.write(aligned.batch())?;
        // One row group per frame.
        writer.flush()?;
        self.stats.record(rows);

        debug!(kind = %self.kind, rows, "appended row group");
        Ok(rows)
    }

    fn close(&mut self) -> Result<WriterStats> {
        let writer = self.writer.take().ok_or_else(|| self.closed())?;
        writer.close()?;
        info!(
            kind = %self.kind,
            rows = self.stats.rows,
            row_groups = self.stats.units,
            "closed parquet writer"
        );
        Ok(self.stats)
    }

    fn stats(&self) -> WriterStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, UInt32Array};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use pi_common::{ColumnField, ColumnType, TABLE_NUMBER};
    use tempfile::TempDir;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            ColumnField::new(TABLE_NUMBER, ColumnType::UInt32),
            ColumnField::new("ObjectNumber", ColumnType::Int64),
            ColumnField::new("Cells_Area", ColumnType::Float64),
        ])
    }

    fn frame(table_number: u32, rows: usize, with_area: bool) -> RecordFrame {
        let mut fields = vec![
            Field::new(TABLE_NUMBER, arrow::datatypes::DataType::UInt32, false),
            Field::new("ObjectNumber", arrow::datatypes::DataType::Int64, true),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(vec![table_number; rows])),
            Arc::new(Int64Array::from((1..=rows as i64).collect::<Vec<_>>())),
        ];
        if with_area {
            fields.push(Field::new("Cells_Area", arrow::datatypes::DataType::Float64, true));
            columns.push(Arc::new(Float64Array::from(vec![1.5; rows])));
        }
        RecordFrame::new(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap())
    }

    #[test]
    fn one_row_group_per_frame() {
        let tmp = TempDir::new().unwrap();
        let kind = TableKind::new("Cells");
        let mut writer =
            ParquetTableWriter::open(kind, tmp.path(), schema(), &Default::default()).unwrap();
        assert_eq!(writer.state(), WriterState::Open);

        writer.write(&frame(1, 3, true)).unwrap();
        writer.write(&frame(2, 4, false)).unwrap();
        let stats = writer.close().unwrap();
        assert_eq!(stats, WriterStats { rows: 7, units: 2 });
        assert_eq!(writer.state(), WriterState::Closed);

        let file = File::open(tmp.path().join("Cells.parquet")).unwrap();
        let reader = SerializedFileReader::new(file).unwrap();
        let meta = reader.metadata();
        assert_eq!(meta.num_row_groups(), 2);
        assert_eq!(meta.row_group(0).num_rows(), 3);
        assert_eq!(meta.row_group(1).num_rows(), 4);
    }

    #[test]
    fn padded_columns_read_back_null() {
        let tmp = TempDir::new().unwrap();
        let mut writer = ParquetTableWriter::open(
            TableKind::new("Cells"),
            tmp.path(),
            schema(),
            &Default::default(),
        )
        .unwrap();
        writer.write(&frame(5, 2, false)).unwrap();
        writer.close().unwrap();

        let file = File::open(writer.path()).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches[0].num_columns(), 3);
        assert_eq!(batches[0].column(2).null_count(), 2);
    }

    #[test]
    fn write_after_close_fails() {
        let tmp = TempDir::new().unwrap();
        let mut writer = ParquetTableWriter::open(
            TableKind::new("Nuclei"),
            tmp.path(),
            schema(),
            &Default::default(),
        )
        .unwrap();
        writer.close().unwrap();
        assert!(matches!(
            writer.write(&frame(1, 1, true)),
            Err(StorageError::WriterClosed { .. })
        ));
        assert!(matches!(
            writer.close(),
            Err(StorageError::WriterClosed { .. })
        ));
    }

    #[test]
    fn mismatched_frame_is_rejected_without_append() {
        let tmp = TempDir::new().unwrap();
        let mut writer = ParquetTableWriter::open(
            TableKind::new("Cells"),
            tmp.path(),
            schema(),
            &Default::default(),
        )
        .unwrap();
        let bad = RecordFrame::new(
            RecordBatch::try_new(
                Arc::new(Schema::new(vec![
                    Field::new(TABLE_NUMBER, arrow::datatypes::DataType::UInt32, false),
                    Field::new("Cells_Area", arrow::datatypes::DataType::Int64, true),
                ])),
                vec![
                    Arc::new(UInt32Array::from(vec![1])) as ArrayRef,
                    Arc::new(Int64Array::from(vec![1])) as ArrayRef,
                ],
            )
            .unwrap(),
        );
        assert!(matches!(
            writer.write(&bad),
            Err(StorageError::SchemaMismatch { .. })
        ));
        assert_eq!(writer.stats().units, 0);
        writer.close().unwrap();
    }
}
