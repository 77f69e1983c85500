//! Run report.
//!
//! Everything the orchestrator decided to skip is recorded here with a
//! reason, so a run over thousands of directories can be audited afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use pi_common::{Error, Result, RunId, TableKind, TableNumber, REPORT_SCHEMA_VERSION};
use pi_config::Backend;
use pi_storage::WriterStats;

use crate::exit_codes::ExitCode;
use crate::reference::{ReferenceSet, SamplingShortfall};

/// Why a directory or file was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Image CSV missing or malformed, or the CSV set is ambiguous.
    DirectoryInvalid,
    /// A file could not be read or parsed.
    IoFailure,
    /// Compartment CSV failed validation.
    InvalidCsv,
    /// The relational store rejected the frame.
    StoreError,
    /// No reference table exists for the file's table kind.
    NoReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedDirectory {
    pub path: PathBuf,
    pub table_number: TableNumber,
    pub files: usize,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDirectory {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: String,
    /// Some compartments were already written before the failure.
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub kind: Option<TableKind>,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportWarning {
    ReferenceSamplingExhausted {
        kind: TableKind,
        requested: usize,
        found: usize,
        candidates: usize,
        code: u32,
        message: String,
    },
    TableExcluded {
        kind: TableKind,
    },
}

impl From<&SamplingShortfall> for ReportWarning {
    fn from(s: &SamplingShortfall) -> Self {
        let error = s.to_error();
        ReportWarning::ReferenceSamplingExhausted {
            kind: s.kind.clone(),
            requested: s.requested,
            found: s.found,
            candidates: s.candidates,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Per table kind totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub rows: u64,
    /// Row groups (Parquet) or insert transactions (DuckDB).
    pub units: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalError {
    pub code: u32,
    pub message: String,
}

impl From<&Error> for FatalError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Summary of one ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub schema_version: String,
    pub run_id: RunId,
    pub backend: Backend,
    pub source: PathBuf,
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub directories_ingested: Vec<IngestedDirectory>,
    pub skipped_directories: Vec<SkippedDirectory>,
    pub skipped_files: Vec<SkippedFile>,
    pub warnings: Vec<ReportWarning>,
    pub tables: BTreeMap<TableKind, TableSummary>,
    pub fatal_error: Option<FatalError>,
}

impl IngestReport {
    pub fn new(backend: Backend, source: &Path, output: &Path) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: RunId::new(),
            backend,
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            started_at: Utc::now(),
            finished_at: None,
            directories_ingested: Vec::new(),
            skipped_directories: Vec::new(),
            skipped_files: Vec::new(),
            warnings: Vec::new(),
            tables: BTreeMap::new(),
            fatal_error: None,
        }
    }

    pub fn skip_directory(
        &mut self,
        path: &Path,
        reason: SkipReason,
        detail: impl Into<String>,
        partial: bool,
    ) {
        self.skipped_directories.push(SkippedDirectory {
            path: path.to_path_buf(),
            reason,
            detail: detail.into(),
            partial,
        });
    }

    pub fn skip_file(
        &mut self,
        path: &Path,
        kind: Option<&TableKind>,
        reason: SkipReason,
        detail: impl Into<String>,
    ) {
        self.skipped_files.push(SkippedFile {
            path: path.to_path_buf(),
            kind: kind.cloned(),
            reason,
            detail: detail.into(),
        });
    }

    /// Record which file each table's schema came from.
    pub fn record_references(&mut self, references: &ReferenceSet) {
        for (kind, reference) in references {
            let entry = self.tables.entry(kind.clone()).or_default();
            entry.reference = Some(reference.source().path.clone());
            entry.columns = Some(reference.schema().len());
        }
    }

    pub fn record_stats(&mut self, stats: &BTreeMap<TableKind, WriterStats>) {
        for (kind, s) in stats {
            let entry = self.tables.entry(kind.clone()).or_default();
            entry.rows = s.rows;
            entry.units = s.units;
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &Error) {
        self.fatal_error = Some(FatalError::from(error));
        self.finish();
    }

    pub fn has_skips(&self) -> bool {
        !self.skipped_directories.is_empty() || !self.skipped_files.is_empty()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|t| t.rows).sum()
    }

    /// Exit code of a run that produced this report without a fatal error.
    pub fn exit_code(&self) -> ExitCode {
        if self.has_skips() {
            ExitCode::CompletedWithSkips
        } else {
            ExitCode::Clean
        }
    }

    /// One-line human summary.
    pub fn summary_line(&self) -> String {
        format!(
            "{}: ingested {} directories ({} rows in {} tables), skipped {} directories and {} files",
            self.run_id,
            self.directories_ingested.len(),
            self.total_rows(),
            self.tables.len(),
            self.skipped_directories.len(),
            self.skipped_files.len()
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        fs::write(path, self.to_json()?).map_err(|e| Error::io_at(path, e))
    }
}
