//! Tabular input and workbook output.
//!
//! Files are loaded into named polars [`DataFrame`]s; the finished mappings
//! are written out as two Excel workbooks.

mod export;
mod reader;

pub use export::{
    ArtifactOutcome, ExportReport, export_all, export_cleaned, export_mappings,
    sanitize_sheet_name, standardize_frame,
};
pub use reader::{clean_csv_content, load_csv_with_fallbacks, load_file};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named table loaded from a file or a workbook sheet.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Unique name within the session: the file name, or
    /// `"<file> - <sheet>"` for a sheet of a multi-sheet workbook.
    pub name: String,
    pub source: PathBuf,
    pub sheet: Option<String>,
    pub frame: DataFrame,
}

impl Dataset {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            sheet: None,
            frame,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            name: self.name.clone(),
            rows: self.frame.height(),
            columns: self.frame.width(),
            memory_kb: self.frame.estimated_size() as f64 / 1024.0,
        }
    }
}

/// Upload summary of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub memory_kb: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_summary() {
        let frame = df![
            "Brand" => ["COKE", "PEPSI", "FANTA"],
            "Units" => [1.0, 2.0, 3.0],
        ]
        .unwrap();
        let dataset = Dataset::new("sales.csv", "data/sales.csv", frame);

        let summary = dataset.summary();
        assert_eq!(summary.name, "sales.csv");
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 2);
        assert!(summary.memory_kb > 0.0);
    }

    #[test]
    fn test_dataset_with_sheet() {
        let dataset = Dataset::new("book.xlsx - Q1", "book.xlsx", DataFrame::empty()).with_sheet("Q1");
        assert_eq!(dataset.sheet.as_deref(), Some("Q1"));
    }
}
