//! Table and run identity types.
//!
//! A row in the consolidated dataset is traced back to its source directory
//! through the `TableNumber` column, and to its CSV category through the
//! table it lands in (`TableKind`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Per-directory identifier stored in the `TableNumber` column.
///
/// Derived from the bytes of the directory's image CSV, so re-ingesting
/// identical content yields the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableNumber(pub u32);

impl fmt::Display for TableNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TableNumber {
    fn from(value: u32) -> Self {
        TableNumber(value)
    }
}

/// Canonical name for a CSV category ("Image", "Cells", "Nuclei").
///
/// Format: file stem with the first character upper-cased and the rest
/// lower-cased, so `cells.csv` and `CELLS.csv` land in the same table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableKind(String);

impl TableKind {
    /// Normalize an arbitrary name into a table kind.
    pub fn new(name: &str) -> Self {
        let mut chars = name.chars();
        let normalized = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        };
        TableKind(normalized)
    }

    /// Derive the table kind from a CSV file name or path.
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self::new(stem))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableKind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Run ID for tracking ingest runs in reports.
///
/// Format: `run-<date>-<time>-<random>`
/// Example: `run-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect();
        RunId(format!("run-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
