//! Column profiling: which columns hold text, and what values they hold.

use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

use crate::cleaner::canonicalize_cell;
use crate::config::StandardizerConfig;
use crate::error::{Result, StandardizerError};
use crate::io::Dataset;
use crate::reporting::GroupSummary;
use crate::types::{ColumnGroup, ColumnRef, ColumnSample};
use crate::utils::{is_predominantly_text, is_text_dtype};

/// Number of values shown per column in a group summary.
const SUMMARY_SAMPLE_SIZE: usize = 5;

/// Column-level inspection of loaded datasets.
pub struct ColumnProfiler;

impl ColumnProfiler {
    /// Collect clustering samples for every text column.
    ///
    /// A column is eligible when it is string-typed and strictly more than
    /// half of its first `eligibility_sample_size` non-null values are not
    /// numbers. Columns without any non-null value are skipped.
    pub fn eligible_columns(datasets: &[Dataset], config: &StandardizerConfig) -> Vec<ColumnSample> {
        let mut eligible = Vec::new();

        for dataset in datasets {
            for column in dataset.frame.get_columns() {
                let name = column.name().to_string();
                if !is_text_dtype(column.dtype()) {
                    debug!("{}: '{}' is {} and not eligible", dataset.name, name, column.dtype());
                    continue;
                }
                let Ok(strings) = column.as_materialized_series().str() else {
                    continue;
                };

                let non_null: Vec<&str> = strings.into_iter().flatten().collect();
                if non_null.is_empty() {
                    debug!("{}: '{}' has no values", dataset.name, name);
                    continue;
                }

                let head = &non_null[..non_null.len().min(config.eligibility_sample_size)];
                if !is_predominantly_text(head) {
                    debug!("{}: '{}' looks numeric and is not eligible", dataset.name, name);
                    continue;
                }

                let samples: Vec<String> = non_null
                    .iter()
                    .filter_map(|raw| canonicalize_cell(raw))
                    .take(config.cluster_sample_size)
                    .collect();

                eligible.push(ColumnSample {
                    column: ColumnRef::new(dataset.name.clone(), name),
                    samples,
                    total_values: non_null.len(),
                });
            }
        }

        debug!("{} eligible columns", eligible.len());
        eligible
    }

    /// The canonicalized, deduplicated values of one column in first-seen
    /// order. Blank values are dropped.
    pub fn value_set(datasets: &[Dataset], column: &ColumnRef) -> Result<Vec<String>> {
        let series = column_text(datasets, column)?;
        let mut seen = HashSet::new();
        let values = series
            .str()?
            .into_iter()
            .flatten()
            .filter_map(canonicalize_cell)
            .filter(|v| seen.insert(v.clone()))
            .collect();
        Ok(values)
    }

    /// Summary row for one group: its columns, how many distinct values the
    /// group holds, and a few values per column.
    pub fn group_summary(datasets: &[Dataset], group: &ColumnGroup) -> Result<GroupSummary> {
        let mut all_values = HashSet::new();
        let mut sample_lines = Vec::with_capacity(group.len());

        for column in &group.columns {
            let values = Self::value_set(datasets, column)?;
            let mut line = values
                .iter()
                .take(SUMMARY_SAMPLE_SIZE)
                .map(|v| format!("\"{v}\""))
                .collect::<Vec<_>>()
                .join(", ");
            if values.is_empty() {
                line = "(no string values)".to_string();
            } else if values.len() > SUMMARY_SAMPLE_SIZE {
                line.push_str(&format!(" ... and {} more", values.len() - SUMMARY_SAMPLE_SIZE));
            }
            sample_lines.push(format!("{}: {}", column, line));
            all_values.extend(values);
        }

        Ok(GroupSummary {
            name: group.id.to_string(),
            columns: group.columns.iter().map(ToString::to_string).collect(),
            total_unique_values: all_values.len(),
            samples: sample_lines,
        })
    }

    /// Check that a column exists in the loaded datasets.
    pub fn ensure_column(datasets: &[Dataset], column: &ColumnRef) -> Result<()> {
        column_text(datasets, column).map(|_| ())
    }
}

/// The column as a string series; other dtypes are rendered as text.
fn column_text(datasets: &[Dataset], column: &ColumnRef) -> Result<Series> {
    let dataset = datasets
        .iter()
        .find(|d| d.name == column.dataset)
        .ok_or_else(|| StandardizerError::DatasetNotFound(column.dataset.clone()))?;
    let source = dataset
        .frame
        .column(&column.column)
        .map_err(|_| StandardizerError::ColumnNotFound {
            dataset: column.dataset.clone(),
            column: column.column.clone(),
        })?;
    Ok(source.as_materialized_series().cast(&DataType::String)?)
}
