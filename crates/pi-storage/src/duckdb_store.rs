//! Append-only DuckDB backend.
//!
//! All table kinds share one connection. A table is created on the first
//! frame written to it, with column types taken from that frame; later
//! frames are inserted by column name and any disagreement is left for the
//! database to reject.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt32Type};
use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use tracing::{debug, info, warn};

use pi_common::{ColumnSchema, ColumnType, TableKind, TABLE_NUMBER};

use crate::error::{Result, StorageError};
use crate::frame::RecordFrame;
use crate::writer::{TableWriter, WriterState, WriterStats};

/// Rows bound into one multi-row INSERT statement.
const INSERT_CHUNK_ROWS: usize = 128;

/// Location string that opens an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// A DuckDB database shared by every table writer of a run.
pub struct DuckDbStore {
    conn: Rc<Connection>,
    location: PathBuf,
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("location", &self.location)
            .finish()
    }
}

impl DuckDbStore {
    /// Open (or create) a database file; `:memory:` opens an in-memory one.
    pub fn open(location: &Path) -> Result<Self> {
        let conn = if location.as_os_str() == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
            Connection::open(location)?
        };
        info!(location = %location.display(), "opened duckdb store");
        Ok(Self {
            conn: Rc::new(conn),
            location: location.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(IN_MEMORY))
    }

    /// A writer for one table kind. The table itself is created lazily.
    pub fn table_writer(&self, kind: TableKind) -> DuckDbTableWriter {
        DuckDbTableWriter {
            kind,
            conn: Rc::clone(&self.conn),
            state: WriterState::Unopened,
            stats: WriterStats::default(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Close the connection. Writers handed out must be dropped first.
    pub fn close(self) -> Result<()> {
        match Rc::try_unwrap(self.conn) {
            Ok(conn) => conn.close().map_err(|(_, e)| StorageError::DuckDb(e)),
            Err(_) => {
                warn!(
                    location = %self.location.display(),
                    "duckdb connection still shared at close; it closes when the last writer drops"
                );
                Ok(())
            }
        }
    }
}

/// Writer appending frames to the table named after its table kind.
pub struct DuckDbTableWriter {
    kind: TableKind,
    conn: Rc<Connection>,
    state: WriterState,
    stats: WriterStats,
}

impl std::fmt::Debug for DuckDbTableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbTableWriter")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

impl DuckDbTableWriter {
    fn create_table(&self, schema: &ColumnSchema) -> Result<()> {
        let columns: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| {
                let not_null = if f.name == TABLE_NUMBER { " NOT NULL" } else { "" };
                format!("{} {}{}", quote_ident(&f.name), sql_type(f.column_type), not_null)
            })
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(self.kind.as_str()),
            columns.join(", ")
        );
        self.conn.execute_batch(&sql)?;
        debug!(kind = %self.kind, columns = schema.len(), "created table");
        Ok(())
    }

    /// Insert by column name, [`INSERT_CHUNK_ROWS`] rows per statement.
    ///
    /// Columns of the table absent from the frame are left null.
    fn insert_rows(&self, frame: &RecordFrame) -> Result<usize> {
        let names = frame.column_names();
        let columns = names
            .iter()
            .map(|n| quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ");
        let tuple = format!("({})", vec!["?"; names.len()].join(", "));
        let insert = |rows: usize| {
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                quote_ident(self.kind.as_str()),
                columns,
                vec![tuple.as_str(); rows].join(", ")
            )
        };

        let batch = frame.batch();
        let total = batch.num_rows();
        let mut full_chunk = None;
        let mut start = 0;
        while start < total {
            let rows = INSERT_CHUNK_ROWS.min(total - start);
            let mut values = Vec::with_capacity(rows * names.len());
            for row in start..start + rows {
                for (column, name) in batch.columns().iter().zip(names.iter()) {
                    values.push(cell_value(column, row, name)?);
                }
            }
            if rows == INSERT_CHUNK_ROWS {
                if full_chunk.is_none() {
                    full_chunk = Some(self.conn.prepare(&insert(rows))?);
                }
                if let Some(stmt) = full_chunk.as_mut() {
                    stmt.execute(params_from_iter(values))?;
                }
            } else {
                self.conn
                    .prepare(&insert(rows))?
                    .execute(params_from_iter(values))?;
            }
            start += rows;
        }
        Ok(total)
    }
}

impl TableWriter for DuckDbTableWriter {
    fn kind(&self) -> &TableKind {
        &self.kind
    }

    fn state(&self) -> WriterState {
        self.state
    }

    fn write(&mut self, frame: &RecordFrame) -> Result<usize> {
        match self.state {
            WriterState::Closed => {
                return Err(StorageError::WriterClosed {
                    kind: self.kind.to_string(),
                })
            }
            WriterState::Unopened => {
                self.create_table(&frame.column_schema()?)?;
                self.state = WriterState::Open;
            }
            WriterState::Open => {}
        }

        self.conn.execute_batch("BEGIN TRANSACTION")?;
        match self.insert_rows(frame) {
            Ok(rows) => {
                self.conn.execute_batch("COMMIT")?;
                self.stats.record(rows);
                debug!(kind = %self.kind, rows, "inserted frame");
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!(kind = %self.kind, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn close(&mut self) -> Result<WriterStats> {
        if self.state == WriterState::Closed {
            return Err(StorageError::WriterClosed {
                kind: self.kind.to_string(),
            });
        }
        self.state = WriterState::Closed;
        info!(
            kind = %self.kind,
            rows = self.stats.rows,
            inserts = self.stats.units,
            "closed duckdb table writer"
        );
        Ok(self.stats)
    }

    fn stats(&self) -> WriterStats {
        self.stats
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Int64 => "BIGINT",
        ColumnType::Float64 => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Utf8 => "VARCHAR",
        ColumnType::UInt32 => "UINTEGER",
    }
}

fn cell_value(column: &ArrayRef, row: usize, name: &str) -> Result<Value> {
    if column.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match column.data_type() {
        DataType::Int64 => Value::BigInt(column.as_primitive::<Int64Type>().value(row)),
        DataType::Float64 => Value::Double(column.as_primitive::<Float64Type>().value(row)),
        DataType::UInt32 => Value::UInt(column.as_primitive::<UInt32Type>().value(row)),
        DataType::Boolean => Value::Boolean(column.as_boolean().value(row)),
        DataType::Utf8 => Value::Text(column.as_string::<i32>().value(row).to_string()),
        other => {
            return Err(StorageError::UnsupportedType {
                column: name.to_string(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(value)
}
