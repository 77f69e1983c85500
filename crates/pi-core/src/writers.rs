//! The per-run writer map.
//!
//! Columnar runs open one Parquet writer per reference table before any
//! directory is read. Relational runs open the shared DuckDB store up front
//! and hand out a table writer the first time a table kind is seen.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use pi_common::TableKind;
use pi_storage::error::Result;
use pi_storage::{
    DuckDbStore, ParquetTableWriter, ParquetWriterConfig, RecordFrame, StorageError, TableWriter,
    WriterState, WriterStats,
};

use crate::reference::ReferenceSet;

/// Outcome of closing every writer.
#[derive(Debug, Default)]
pub struct ClosedWriters {
    pub stats: BTreeMap<TableKind, WriterStats>,
    pub errors: Vec<(TableKind, StorageError)>,
}

/// Owns every writer of a run, keyed by table kind.
pub struct WriterSet {
    writers: BTreeMap<TableKind, Box<dyn TableWriter>>,
    store: Option<DuckDbStore>,
}

impl std::fmt::Debug for WriterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSet")
            .field("kinds", &self.writers.keys().collect::<Vec<_>>())
            .field("store", &self.store)
            .finish()
    }
}

impl WriterSet {
    /// Open a schema-fixed writer for every reference table.
    ///
    /// Writers opened before a failure are closed again so no file is left
    /// without a footer.
    pub fn open_columnar(
        references: &ReferenceSet,
        output_dir: &Path,
        config: &ParquetWriterConfig,
    ) -> Result<Self> {
        let mut set = Self {
            writers: BTreeMap::new(),
            store: None,
        };
        for (kind, reference) in references {
            match ParquetTableWriter::open(
                kind.clone(),
                output_dir,
                reference.schema().clone(),
                config,
            ) {
                Ok(writer) => {
                    set.writers.insert(kind.clone(), Box::new(writer));
                }
                Err(err) => {
                    set.close_all();
                    return Err(err);
                }
            }
        }
        Ok(set)
    }

    /// Open (or create) the relational store. Tables are created on first write.
    pub fn open_relational(location: &Path) -> Result<Self> {
        Ok(Self::from_store(DuckDbStore::open(location)?))
    }

    pub fn from_store(store: DuckDbStore) -> Self {
        Self {
            writers: BTreeMap::new(),
            store: Some(store),
        }
    }

    pub fn is_relational(&self) -> bool {
        self.store.is_some()
    }

    /// Whether a frame of this kind has somewhere to go.
    pub fn accepts(&self, kind: &TableKind) -> bool {
        self.store.is_some() || self.writers.contains_key(kind)
    }

    /// Append one frame to the writer of `kind`.
    ///
    /// Returns `Ok(None)` when no writer exists for the kind, which only
    /// happens on columnar runs for kinds without a reference table.
    pub fn write(&mut self, kind: &TableKind, frame: &RecordFrame) -> Result<Option<usize>> {
        if !self.writers.contains_key(kind) {
            let Some(store) = self.store.as_ref() else {
                return Ok(None);
            };
            self.writers
                .insert(kind.clone(), Box::new(store.table_writer(kind.clone())));
        }
        match self.writers.get_mut(kind) {
            Some(writer) => writer.write(frame).map(Some),
            None => Ok(None),
        }
    }

    pub fn state(&self, kind: &TableKind) -> WriterState {
        self.writers
            .get(kind)
            .map_or(WriterState::Unopened, |w| w.state())
    }

    /// Close every open writer, then the shared store.
    ///
    /// Every writer is attempted even when an earlier one fails; failures
    /// are collected rather than returned early.
    pub fn close_all(mut self) -> ClosedWriters {
        let mut closed = ClosedWriters::default();
        for (kind, mut writer) in std::mem::take(&mut self.writers) {
            if writer.state() != WriterState::Closed {
                if let Err(err) = writer.close() {
                    warn!(kind = %kind, error = %err, "failed to close writer");
                    closed.errors.push((kind.clone(), err));
                }
            }
            closed.stats.insert(kind, writer.stats());
        }
        if let Some(store) = self.store.take() {
            let location = store.location().to_path_buf();
            if let Err(err) = store.close() {
                warn!(location = %location.display(), error = %err, "failed to close store");
                closed.errors.push((TableKind::new("store"), err));
            }
        }
        info!(tables = closed.stats.len(), "closed writers");
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ReferenceSource, ReferenceTable};
    use arrow::array::{ArrayRef, Float64Array, UInt32Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use pi_common::TABLE_NUMBER;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn frame(table_number: u32, rows: usize) -> RecordFrame {
        let schema = Schema::new(vec![
            Field::new(TABLE_NUMBER, DataType::UInt32, false),
            Field::new("Cells_Area", DataType::Float64, true),
        ]);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(vec![table_number; rows])),
            Arc::new(Float64Array::from(vec![2.0; rows])),
        ];
        RecordFrame::new(RecordBatch::try_new(Arc::new(schema), columns).unwrap())
    }

    fn references() -> ReferenceSet {
        let source = ReferenceSource {
            kind: TableKind::new("Cells"),
            directory: PathBuf::from("A01"),
            image_path: PathBuf::from("A01/Image.csv"),
            path: PathBuf::from("A01/Cells.csv"),
            columns: Some(1),
        };
        let table = ReferenceTable::new(source, frame(7, 1)).unwrap();
        let mut set = ReferenceSet::new();
        set.insert(TableKind::new("Cells"), Arc::new(table));
        set
    }

    #[test]
    fn columnar_writers_open_eagerly() {
        let tmp = TempDir::new().unwrap();
        let mut set =
            WriterSet::open_columnar(&references(), tmp.path(), &Default::default()).unwrap();
        assert!(!set.is_relational());
        assert_eq!(set.state(&TableKind::new("Cells")), WriterState::Open);
        assert!(tmp.path().join("Cells.parquet").exists());

        assert_eq!(set.write(&TableKind::new("Cells"), &frame(1, 4)).unwrap(), Some(4));
        assert_eq!(set.write(&TableKind::new("Nuclei"), &frame(1, 4)).unwrap(), None);

        let closed = set.close_all();
        assert!(closed.errors.is_empty());
        assert_eq!(closed.stats[&TableKind::new("Cells")].rows, 4);
    }

    #[test]
    fn relational_writers_open_on_first_write() {
        let mut set = WriterSet::from_store(DuckDbStore::open_in_memory().unwrap());
        let cells = TableKind::new("Cells");
        assert_eq!(set.state(&cells), WriterState::Unopened);
        assert!(set.accepts(&cells));

        set.write(&cells, &frame(1, 2)).unwrap();
        set.write(&cells, &frame(2, 3)).unwrap();
        assert_eq!(set.state(&cells), WriterState::Open);

        let closed = set.close_all();
        assert!(closed.errors.is_empty());
        assert_eq!(closed.stats[&cells], WriterStats { rows: 5, units: 2 });
    }
}
