//! Directory discovery and CSV-set validation.
//!
//! A source root holds one directory per imaging field or well. Each
//! accepted directory contributes one image CSV and any number of compartment
//! CSVs; directories are returned in lexicographic path order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use pi_common::{Error, Result, TableKind};
use pi_storage::probe_csv;

/// One directory's contribution to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBatch {
    pub directory: PathBuf,
    pub image_kind: TableKind,
    pub image_path: PathBuf,
    pub compartments: BTreeMap<TableKind, PathBuf>,
}

impl SourceBatch {
    /// Image CSV first, then compartments in table-kind order.
    pub fn files(&self) -> impl Iterator<Item = (&TableKind, &Path)> {
        std::iter::once((&self.image_kind, self.image_path.as_path())).chain(
            self.compartments
                .iter()
                .map(|(kind, path)| (kind, path.as_path())),
        )
    }

    pub fn path_for(&self, kind: &TableKind) -> Option<&Path> {
        if kind == &self.image_kind {
            Some(&self.image_path)
        } else {
            self.compartments.get(kind).map(PathBuf::as_path)
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.directory.file_name().and_then(|n| n.to_str())
    }
}

/// A directory that will not be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDirectory {
    pub path: PathBuf,
    pub reason: String,
}

/// A compartment CSV left out of an otherwise valid directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning a source root.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub batches: Vec<SourceBatch>,
    pub rejected: Vec<RejectedDirectory>,
    pub dropped_files: Vec<DroppedFile>,
}

/// Scan `root` for ingestible directories.
///
/// Candidates are the immediate subdirectories of `root`, plus `root` itself
/// when it directly holds CSV files.
pub fn discover(root: &Path, image_filename: &str) -> Result<Discovery> {
    let image_kind = TableKind::from_file_name(Path::new(image_filename)).ok_or_else(|| {
        Error::Config(format!("image filename {image_filename:?} has no file stem"))
    })?;

    let mut candidates = Vec::new();
    if !csv_files(root)?.is_empty() {
        candidates.push(root.to_path_buf());
    }
    for entry in fs::read_dir(root).map_err(|e| Error::io_at(root, e))? {
        let entry = entry.map_err(|e| Error::io_at(root, e))?;
        let path = entry.path();
        if path.is_dir() {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut discovery = Discovery::default();
    for directory in candidates {
        match validate_directory(&directory, image_filename, &image_kind, &mut discovery) {
            Ok(batch) => {
                debug!(
                    directory = %directory.display(),
                    compartments = batch.compartments.len(),
                    "accepted directory"
                );
                discovery.batches.push(batch);
            }
            Err(Error::DirectoryInvalid { path, reason }) => {
                warn!(directory = %path.display(), %reason, "skipping directory");
                discovery.rejected.push(RejectedDirectory { path, reason });
            }
            Err(other) => {
                let reason = other.to_string();
                warn!(directory = %directory.display(), %reason, "skipping directory");
                discovery.rejected.push(RejectedDirectory {
                    path: directory,
                    reason,
                });
            }
        }
    }
    Ok(discovery)
}

/// Validate one directory's CSV set.
///
/// Invalid compartment files are recorded in `discovery.dropped_files` and
/// left out of the batch.
pub fn validate_directory(
    directory: &Path,
    image_filename: &str,
    image_kind: &TableKind,
    discovery: &mut Discovery,
) -> Result<SourceBatch> {
    let invalid = |reason: String| Error::DirectoryInvalid {
        path: directory.to_path_buf(),
        reason,
    };

    let files = csv_files(directory)?;
    if files.is_empty() {
        return Err(invalid("no CSV files".to_string()));
    }

    let image_path = files
        .iter()
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(image_filename))
        })
        .cloned()
        .ok_or_else(|| invalid(format!("missing image CSV {image_filename}")))?;
    probe_csv(&image_path).map_err(|e| invalid(format!("invalid image CSV: {e}")))?;

    let mut compartments = BTreeMap::new();
    for path in files.into_iter().filter(|p| *p != image_path) {
        let Some(kind) = TableKind::from_file_name(&path) else {
            continue;
        };
        if &kind == image_kind || compartments.contains_key(&kind) {
            return Err(invalid(format!(
                "more than one CSV maps to table {kind}: {}",
                path.display()
            )));
        }
        match probe_csv(&path) {
            Ok(_) => {
                compartments.insert(kind, path);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "dropping invalid compartment CSV");
                discovery.dropped_files.push(DroppedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(SourceBatch {
        directory: directory.to_path_buf(),
        image_kind: image_kind.clone(),
        image_path,
        compartments,
    })
}

fn csv_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(|e| Error::io_at(directory, e))? {
        let entry = entry.map_err(|e| Error::io_at(directory, e))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn accepts_directories_in_order() {
        let tmp = TempDir::new().unwrap();
        for well in ["B02", "A01"] {
            let dir = tmp.path().join(well);
            write(&dir, "Image.csv", "ImageNumber,Count\n1,2\n");
            write(&dir, "cells.csv", "ImageNumber,ObjectNumber,Area\n1,1,3.0\n");
        }

        let found = discover(tmp.path(), "Image.csv").unwrap();
        assert_eq!(found.batches.len(), 2);
        assert!(found.batches[0].directory.ends_with("A01"));
        assert!(found.batches[1].directory.ends_with("B02"));
        let kinds: Vec<&str> = found.batches[0]
            .files()
            .map(|(kind, _)| kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["Image", "Cells"]);
    }

    #[test]
    fn missing_image_rejects_directory() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("A01"), "Cells.csv", "A\n1\n");

        let found = discover(tmp.path(), "Image.csv").unwrap();
        assert!(found.batches.is_empty());
        assert_eq!(found.rejected.len(), 1);
        assert!(found.rejected[0].reason.contains("missing image"));
    }

    #[test]
    fn empty_image_rejects_directory() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("A01"), "Image.csv", "ImageNumber\n");

        let found = discover(tmp.path(), "Image.csv").unwrap();
        assert_eq!(found.rejected.len(), 1);
        assert!(found.rejected[0].reason.contains("invalid image"));
    }

    #[test]
    fn invalid_compartment_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("A01");
        write(&dir, "Image.csv", "ImageNumber\n1\n");
        write(&dir, "Cells.csv", "ImageNumber,ObjectNumber\n");
        write(&dir, "Nuclei.csv", "ImageNumber,ObjectNumber\n1,1\n");

        let found = discover(tmp.path(), "image.csv").unwrap();
        assert_eq!(found.batches.len(), 1);
        let batch = &found.batches[0];
        assert!(batch.compartments.contains_key(&TableKind::new("Nuclei")));
        assert!(!batch.compartments.contains_key(&TableKind::new("Cells")));
        assert_eq!(found.dropped_files.len(), 1);
    }

    #[test]
    fn root_with_csvs_is_a_directory() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "Image.csv", "ImageNumber\n1\n");

        let found = discover(tmp.path(), "Image.csv").unwrap();
        assert_eq!(found.batches.len(), 1);
        assert_eq!(found.batches[0].directory, tmp.path());
    }

    #[test]
    fn non_csv_subdirectory_is_recorded() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("logs"), "run.txt", "hello");
        let found = discover(tmp.path(), "Image.csv").unwrap();
        assert_eq!(found.rejected.len(), 1);
        assert_eq!(found.rejected[0].reason, "no CSV files");
    }

    #[test]
    fn missing_root_is_io_error() {
        assert!(matches!(
            discover(Path::new("/nonexistent/plate"), "Image.csv"),
            Err(Error::IoAt { .. })
        ));
    }
}
