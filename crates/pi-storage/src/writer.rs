//! The write contract shared by both output backends.

use serde::Serialize;

use pi_common::TableKind;

use crate::error::Result;
use crate::frame::RecordFrame;

/// Lifecycle of one table's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterState {
    Unopened,
    Open,
    Closed,
}

/// Counters a writer reports when it closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Rows appended.
    pub rows: u64,
    /// Storage units appended (row groups or insert transactions).
    pub units: u64,
}

impl WriterStats {
    pub(crate) fn record(&mut self, rows: usize) {
        self.rows = self.rows.saturating_add(rows as u64);
        self.units = self.units.saturating_add(1);
    }
}

/// An output resource for exactly one table kind.
///
/// A writer accepts frames until [`TableWriter::close`] is called; after
/// that every call fails with `WriterClosed`.
pub trait TableWriter {
    fn kind(&self) -> &TableKind;

    fn state(&self) -> WriterState;

    /// Append one frame as one storage unit. Returns the rows appended.
    fn write(&mut self, frame: &RecordFrame) -> Result<usize>;

    /// Flush and finalize. Must be called exactly once.
    fn close(&mut self) -> Result<WriterStats>;

    fn stats(&self) -> WriterStats;
}
