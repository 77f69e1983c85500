//! Load → rename → coerce, shared by reference building and ingestion.

use std::path::Path;

use pi_common::{Result, TableKind, TableNumber};
use pi_config::{IngestConfig, TypeConversionPolicy};
use pi_storage::RecordFrame;

use crate::normalize::normalize_types;
use crate::transform::transform_columns;

/// Applies the column transformer and type normalizer for one run.
#[derive(Debug, Clone)]
pub struct FramePreparer {
    policy: TypeConversionPolicy,
    prefix_exempt: Option<TableKind>,
}

impl FramePreparer {
    pub fn new(policy: TypeConversionPolicy, prefix_exempt: Option<TableKind>) -> Self {
        Self {
            policy,
            prefix_exempt,
        }
    }

    /// Exempt the image table from prefixing when `skip_image_prefix` is set.
    pub fn from_config(config: &IngestConfig, image_kind: &TableKind) -> Self {
        let exempt = config.skip_image_prefix.then(|| image_kind.clone());
        Self::new(config.type_conversion, exempt)
    }

    pub fn is_prefix_exempt(&self, kind: &TableKind) -> bool {
        self.prefix_exempt.as_ref() == Some(kind)
    }

    pub fn prepare(
        &self,
        frame: &RecordFrame,
        kind: &TableKind,
        table_number: TableNumber,
    ) -> Result<RecordFrame> {
        let renamed = transform_columns(frame, kind, !self.is_prefix_exempt(kind), table_number)?;
        normalize_types(renamed, self.policy)
    }

    /// Read `path` and prepare it.
    pub fn load(
        &self,
        path: &Path,
        kind: &TableKind,
        table_number: TableNumber,
    ) -> Result<RecordFrame> {
        let frame = RecordFrame::from_csv(path)?;
        self.prepare(&frame, kind, table_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn image_is_exempt_only_when_configured() {
        let image = TableKind::new("Image");
        let mut config = IngestConfig::default();
        assert!(FramePreparer::from_config(&config, &image).is_prefix_exempt(&image));
        config.skip_image_prefix = false;
        assert!(!FramePreparer::from_config(&config, &image).is_prefix_exempt(&image));
    }

    #[test]
    fn load_renames_then_coerces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Cells.csv");
        fs::write(&path, "ImageNumber,ObjectNumber,Count\n1,1,4\n1,2,5\n").unwrap();

        let preparer = FramePreparer::new(TypeConversionPolicy::IntToFloat, None);
        let frame = preparer
            .load(&path, &TableKind::new("Cells"), TableNumber(12))
            .unwrap();
        let schema = frame.schema();
        assert_eq!(
            frame.column_names(),
            vec!["TableNumber", "ImageNumber", "ObjectNumber", "Cells_Count"]
        );
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);
    }
}
