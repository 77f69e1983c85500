//! Run sequencing.
//!
//! One run: discover directories, fix reference schemas (columnar only),
//! open writers, ingest every accepted directory in path order, then close
//! every writer exactly once. Processing is sequential; each directory is
//! finished before the next begins.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, info_span, warn};

use pi_common::{Error, Result, TableKind};
use pi_config::{Backend, IngestConfig};
use pi_storage::{ParquetWriterConfig, StorageError};

use crate::discover::{discover, Discovery, SourceBatch};
use crate::exit_codes::ExitCode;
use crate::identifier::table_number;
use crate::prepare::FramePreparer;
use crate::reference::{build_reference_tables, select_references, ReferenceSet};
use crate::report::{IngestReport, IngestedDirectory, ReportWarning, SkipReason};
use crate::writers::WriterSet;

/// A run that stopped on a fatal error. The report covers the work done
/// before the failure.
#[derive(Debug)]
pub struct RunFailure {
    pub error: Error,
    pub report: IngestReport,
}

impl RunFailure {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::for_error(&self.error)
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Drives one ingest run from a source root into an output location.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: IngestConfig,
    output: PathBuf,
}

impl Orchestrator {
    /// `output` is a directory for Parquet and a database file for DuckDB.
    pub fn new(config: IngestConfig, output: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output: output.into(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run with the configured seed, or an OS-seeded generator when unset.
    pub fn run(&self, source: &Path) -> std::result::Result<IngestReport, RunFailure> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.run_with_rng(source, &mut rng)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        source: &Path,
        rng: &mut R,
    ) -> std::result::Result<IngestReport, RunFailure> {
        let mut report = IngestReport::new(self.config.backend, source, &self.output);
        let span = info_span!("ingest", run_id = %report.run_id, backend = %self.config.backend);
        let _guard = span.enter();
        info!(source = %source.display(), output = %self.output.display(), "starting run");

        let prepared = self.setup(source, rng, &mut report);
        let (discovery, preparer, mut writers) = match prepared {
            Ok(parts) => parts,
            Err(error) => {
                warn!(error = %error, "run aborted before ingestion");
                report.fail(&error);
                return Err(RunFailure { error, report });
            }
        };

        let outcome = self.ingest_batches(&discovery.batches, &preparer, &mut writers, &mut report);

        let closed = writers.close_all();
        report.record_stats(&closed.stats);
        let close_error = closed
            .errors
            .into_iter()
            .next()
            .map(|(_, err)| Error::from(err));

        match outcome.err().or(close_error) {
            None => {
                report.finish();
                info!(summary = %report.summary_line(), "run finished");
                Ok(report)
            }
            Some(error) => {
                warn!(error = %error, "run aborted");
                report.fail(&error);
                Err(RunFailure { error, report })
            }
        }
    }

    fn setup<R: Rng + ?Sized>(
        &self,
        source: &Path,
        rng: &mut R,
        report: &mut IngestReport,
    ) -> Result<(Discovery, FramePreparer, WriterSet)> {
        let image_kind = TableKind::from_file_name(Path::new(&self.config.image_filename))
            .ok_or_else(|| {
                Error::Config(format!(
                    "image filename {:?} has no file stem",
                    self.config.image_filename
                ))
            })?;
        let preparer = FramePreparer::from_config(&self.config, &image_kind);

        let discovery = discover(source, &self.config.image_filename)?;
        for rejected in &discovery.rejected {
            report.skip_directory(
                &rejected.path,
                SkipReason::DirectoryInvalid,
                rejected.reason.clone(),
                false,
            );
        }
        for dropped in &discovery.dropped_files {
            let kind = TableKind::from_file_name(&dropped.path);
            report.skip_file(
                &dropped.path,
                kind.as_ref(),
                SkipReason::InvalidCsv,
                dropped.reason.clone(),
            );
        }
        info!(
            accepted = discovery.batches.len(),
            rejected = discovery.rejected.len(),
            "discovered directories"
        );

        let writers = match self.config.backend {
            Backend::Parquet => {
                let references = self.references(&discovery.batches, &preparer, rng, report)?;
                WriterSet::open_columnar(
                    &references,
                    &self.output,
                    &ParquetWriterConfig::default(),
                )?
            }
            Backend::Duckdb => WriterSet::open_relational(&self.output)?,
        };
        Ok((discovery, preparer, writers))
    }

    fn references<R: Rng + ?Sized>(
        &self,
        batches: &[SourceBatch],
        preparer: &FramePreparer,
        rng: &mut R,
        report: &mut IngestReport,
    ) -> Result<ReferenceSet> {
        let selection = select_references(batches, &self.config.reference, rng)?;
        report
            .warnings
            .extend(selection.shortfalls.iter().map(ReportWarning::from));

        let references = build_reference_tables(&selection, preparer)?;
        let seen: BTreeSet<&TableKind> = batches
            .iter()
            .flat_map(|b| b.files().map(|(kind, _)| kind))
            .collect();
        for kind in seen {
            if !references.contains_key(kind) {
                warn!(kind = %kind, "no reference table; files of this kind are skipped");
                report
                    .warnings
                    .push(ReportWarning::TableExcluded { kind: kind.clone() });
            }
        }
        report.record_references(&references);
        Ok(references)
    }

    /// Ingest directories in order. Only fatal errors are returned; every
    /// other failure is recorded in the report.
    pub fn ingest_batches(
        &self,
        batches: &[SourceBatch],
        preparer: &FramePreparer,
        writers: &mut WriterSet,
        report: &mut IngestReport,
    ) -> Result<()> {
        for batch in batches {
            self.ingest_batch(batch, preparer, writers, report)?;
        }
        Ok(())
    }

    fn ingest_batch(
        &self,
        batch: &SourceBatch,
        preparer: &FramePreparer,
        writers: &mut WriterSet,
        report: &mut IngestReport,
    ) -> Result<()> {
        let span = info_span!("directory", path = %batch.directory.display());
        let _guard = span.enter();

        let id = match table_number(&batch.image_path) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "cannot compute table number; skipping directory");
                report.skip_directory(
                    &batch.directory,
                    SkipReason::IoFailure,
                    err.to_string(),
                    false,
                );
                return Ok(());
            }
        };

        let mut files = 0usize;
        let mut rows = 0u64;
        for (kind, path) in batch.files() {
            if !writers.accepts(kind) {
                debug!(kind = %kind, file = %path.display(), "no reference table");
                report.skip_file(
                    path,
                    Some(kind),
                    SkipReason::NoReference,
                    format!("no reference table for {kind}"),
                );
                continue;
            }

            let frame = match preparer.load(path, kind, id) {
                Ok(frame) => frame,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "cannot load CSV; skipping rest of directory");
                    report.skip_directory(
                        &batch.directory,
                        SkipReason::IoFailure,
                        format!("{}: {err}", path.display()),
                        files > 0,
                    );
                    return Ok(());
                }
            };

            match writers.write(kind, &frame) {
                Ok(Some(written)) => {
                    files += 1;
                    rows += written as u64;
                }
                Ok(None) => report.skip_file(
                    path,
                    Some(kind),
                    SkipReason::NoReference,
                    format!("no reference table for {kind}"),
                ),
                Err(err) if is_recoverable_store_error(writers, &err) => {
                    warn!(file = %path.display(), error = %err, "store rejected frame; skipping file");
                    report.skip_file(path, Some(kind), SkipReason::StoreError, err.to_string());
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(table_number = %id, files, rows, "ingested directory");
        report.directories_ingested.push(IngestedDirectory {
            path: batch.directory.clone(),
            table_number: id,
            files,
            rows,
        });
        Ok(())
    }
}

/// Relational rejects cost one file; columnar write failures end the run.
fn is_recoverable_store_error(writers: &WriterSet, err: &StorageError) -> bool {
    writers.is_relational() && !matches!(err, StorageError::WriterClosed { .. })
}
