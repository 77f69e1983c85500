//! Reference schema selection.
//!
//! Before any columnar write, each table kind gets one canonical schema. It
//! comes either from a designated directory or from the widest header among
//! a random sample of candidate files. Sampling bounds the I/O on studies
//! with tens of thousands of directories at the cost of only probably
//! finding the widest schema.
//!
//! The selected file is then loaded, renamed and coerced like any other
//! frame; the result is the [`ReferenceTable`] that fixes the output schema.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use pi_common::{ColumnSchema, Error, Result, TableKind};
use pi_config::ReferenceOption;
use pi_storage::{read_header, RecordFrame, StorageError};

use crate::discover::SourceBatch;
use crate::identifier::table_number;
use crate::prepare::FramePreparer;

/// A candidate file for one table kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSource {
    pub kind: TableKind,
    pub directory: PathBuf,
    /// Image CSV of the same directory; supplies the exemplar's identifier.
    pub image_path: PathBuf,
    pub path: PathBuf,
    /// Header width, when known.
    pub columns: Option<usize>,
}

/// Sampling found fewer valid candidates than requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplingShortfall {
    pub kind: TableKind,
    pub requested: usize,
    pub found: usize,
    pub candidates: usize,
}

impl SamplingShortfall {
    pub fn to_error(&self) -> Error {
        Error::ReferenceSamplingExhausted {
            kind: self.kind.to_string(),
            found: self.found,
            requested: self.requested,
        }
    }
}

/// Outcome of reference selection for every table kind.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSelection {
    pub sources: BTreeMap<TableKind, ReferenceSource>,
    pub shortfalls: Vec<SamplingShortfall>,
}

/// The canonical schema of one table kind plus the frame it came from.
///
/// Immutable once built; writers only ever read it.
#[derive(Debug)]
pub struct ReferenceTable {
    source: ReferenceSource,
    schema: ColumnSchema,
    exemplar: RecordFrame,
}

impl ReferenceTable {
    pub fn new(source: ReferenceSource, exemplar: RecordFrame) -> Result<Self> {
        let schema = exemplar.column_schema()?;
        Ok(Self {
            source,
            schema,
            exemplar,
        })
    }

    pub fn kind(&self) -> &TableKind {
        &self.source.kind
    }

    pub fn source(&self) -> &ReferenceSource {
        &self.source
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn exemplar(&self) -> &RecordFrame {
        &self.exemplar
    }
}

/// Per table kind reference tables, built once per run.
pub type ReferenceSet = BTreeMap<TableKind, Arc<ReferenceTable>>;

/// Choose one reference file per table kind.
pub fn select_references<R: Rng + ?Sized>(
    batches: &[SourceBatch],
    option: &ReferenceOption,
    rng: &mut R,
) -> Result<ReferenceSelection> {
    match option {
        ReferenceOption::Directory { name } => select_from_directory(batches, name),
        ReferenceOption::Sample { fraction } => Ok(select_by_sampling(batches, *fraction, rng)),
    }
}

fn select_from_directory(batches: &[SourceBatch], name: &str) -> Result<ReferenceSelection> {
    let wanted = Path::new(name);
    let batch = batches
        .iter()
        .find(|b| b.name() == Some(name) || b.directory == wanted)
        .ok_or_else(|| {
            Error::ReferenceSelection(format!(
                "reference directory {name} is not among the accepted directories"
            ))
        })?;

    let sources = batch
        .files()
        .map(|(kind, path)| {
            (
                kind.clone(),
                ReferenceSource {
                    kind: kind.clone(),
                    directory: batch.directory.clone(),
                    image_path: batch.image_path.clone(),
                    path: path.to_path_buf(),
                    columns: None,
                },
            )
        })
        .collect();
    info!(directory = %batch.directory.display(), "using fixed reference directory");
    Ok(ReferenceSelection {
        sources,
        shortfalls: Vec::new(),
    })
}

fn select_by_sampling<R: Rng + ?Sized>(
    batches: &[SourceBatch],
    fraction: f64,
    rng: &mut R,
) -> ReferenceSelection {
    let mut candidates: BTreeMap<TableKind, Vec<ReferenceSource>> = BTreeMap::new();
    for batch in batches {
        for (kind, path) in batch.files() {
            candidates
                .entry(kind.clone())
                .or_default()
                .push(ReferenceSource {
                    kind: kind.clone(),
                    directory: batch.directory.clone(),
                    image_path: batch.image_path.clone(),
                    path: path.to_path_buf(),
                    columns: None,
                });
        }
    }

    let mut selection = ReferenceSelection::default();
    for (kind, list) in candidates {
        let (chosen, shortfall) = sample_kind(&kind, list, fraction, rng, |p| {
            read_header(p).map(|h| h.len())
        });
        if let Some(shortfall) = shortfall {
            warn!(
                kind = %shortfall.kind,
                candidates = shortfall.candidates,
                error = %shortfall.to_error(),
                "continuing with a smaller reference sample"
            );
            selection.shortfalls.push(shortfall);
        }
        match chosen {
            Some(source) => {
                info!(
                    kind = %kind,
                    path = %source.path.display(),
                    columns = source.columns,
                    "selected reference"
                );
                selection.sources.insert(kind, source);
            }
            None => warn!(kind = %kind, "no valid reference candidate; table excluded"),
        }
    }
    selection
}

/// Number of candidates to sample out of `total`.
pub fn sample_size(total: usize, fraction: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let wanted = (fraction * total as f64).ceil() as usize;
    wanted.clamp(1, total)
}

/// Sample one table kind's candidates and keep the widest header.
///
/// Candidates are shuffled unless the sample covers all of them. Each
/// candidate whose header cannot be read is replaced by the next one in the
/// shuffled order. Ties keep the earliest candidate.
fn sample_kind<R, F>(
    kind: &TableKind,
    mut candidates: Vec<ReferenceSource>,
    fraction: f64,
    rng: &mut R,
    mut header_width: F,
) -> (Option<ReferenceSource>, Option<SamplingShortfall>)
where
    R: Rng + ?Sized,
    F: FnMut(&Path) -> std::result::Result<usize, StorageError>,
{
    let total = candidates.len();
    let target = sample_size(total, fraction);
    if target < total {
        candidates.shuffle(rng);
    }

    let mut found = 0usize;
    let mut best: Option<ReferenceSource> = None;
    for mut candidate in candidates {
        if found == target {
            break;
        }
        match header_width(&candidate.path) {
            Ok(width) => {
                found += 1;
                let wider = best
                    .as_ref()
                    .and_then(|b| b.columns)
                    .map_or(true, |current| width > current);
                if wider {
                    candidate.columns = Some(width);
                    best = Some(candidate);
                }
            }
            Err(e) => {
                debug!(kind = %kind, path = %candidate.path.display(), error = %e, "unreadable reference candidate");
            }
        }
    }

    let shortfall = (found < target).then(|| SamplingShortfall {
        kind: kind.clone(),
        requested: target,
        found,
        candidates: total,
    });
    (best, shortfall)
}

/// Load each selected file through the regular frame pipeline.
pub fn build_reference_tables(
    selection: &ReferenceSelection,
    preparer: &FramePreparer,
) -> Result<ReferenceSet> {
    let mut references = ReferenceSet::new();
    for (kind, source) in &selection.sources {
        let load = || -> Result<ReferenceTable> {
            let id = table_number(&source.image_path)?;
            let frame = preparer.load(&source.path, kind, id)?;
            ReferenceTable::new(source.clone(), frame)
        };
        let table = load().map_err(|e| {
            Error::ReferenceSelection(format!(
                "cannot load reference for {kind} from {}: {e}",
                source.path.display()
            ))
        })?;
        debug!(
            kind = %kind,
            schema = %table.schema(),
            exemplar_rows = table.exemplar().num_rows(),
            "built reference table"
        );
        references.insert(kind.clone(), Arc::new(table));
    }
    Ok(references)
}
