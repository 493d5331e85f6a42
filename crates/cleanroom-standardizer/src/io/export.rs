//! Writing the mappings workbook and the cleaned data workbook.

use polars::prelude::*;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::Dataset;
use crate::cleaner::canonicalize;
use crate::config::StandardizerConfig;
use crate::error::{Result, StandardizerError};
use crate::types::{ColumnGroupIdentity, Mapping, MappingSlot, Warning, WarningKind};
use crate::utils::is_numeric_dtype;

const ORIGINAL_HEADER: &str = "Original Value";
const STANDARDIZED_HEADER: &str = "Standardized Value";
const STANDARDIZED_SUFFIX: &str = "_standardized";

/// Characters replaced with `_` in sheet names. Excel forbids `[]:*?/\`;
/// spaces, dashes and quotes are replaced as well.
const SHEET_NAME_REPLACED: [char; 10] = [' ', ':', '-', '[', ']', '*', '?', '/', '\\', '\''];

/// Outcome of writing one workbook.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOutcome {
    pub path: PathBuf,
    pub sheets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArtifactOutcome {
    fn written(path: PathBuf, sheets: usize) -> Self {
        Self {
            path,
            sheets,
            error: None,
        }
    }

    fn failed(path: PathBuf, err: &StandardizerError) -> Self {
        Self {
            path,
            sheets: 0,
            error: Some(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of exporting both workbooks.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub mappings: ArtifactOutcome,
    pub cleaned: ArtifactOutcome,
    pub warnings: Vec<Warning>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.mappings.is_ok() && self.cleaned.is_ok()
    }
}

/// Write both workbooks into the configured output directory.
///
/// The workbooks are written independently: a failure in one is recorded
/// in the report and the other is still attempted.
pub fn export_all(
    config: &StandardizerConfig,
    datasets: &[Dataset],
    mappings: &BTreeMap<ColumnGroupIdentity, MappingSlot>,
) -> ExportReport {
    let mappings_path = config.mappings_path();
    let cleaned_path = config.cleaned_path();
    let mut warnings = Vec::new();

    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        let err = StandardizerError::from(e);
        error!(
            "Could not create output directory {}: {}",
            config.output_dir.display(),
            err
        );
        return ExportReport {
            mappings: ArtifactOutcome::failed(mappings_path, &err),
            cleaned: ArtifactOutcome::failed(cleaned_path, &err),
            warnings,
        };
    }

    let mappings_outcome =
        match export_mappings(&mappings_path, mappings, config.sheet_name_max_len) {
            Ok((sheets, w)) => {
                warnings.extend(w);
                ArtifactOutcome::written(mappings_path, sheets)
            }
            Err(e) => {
                error!("Mappings export failed: {}", e);
                warnings.push(export_warning(&mappings_path, &e));
                ArtifactOutcome::failed(mappings_path, &e)
            }
        };

    let cleaned_outcome =
        match export_cleaned(&cleaned_path, datasets, mappings, config.sheet_name_max_len) {
            Ok((sheets, w)) => {
                warnings.extend(w);
                ArtifactOutcome::written(cleaned_path, sheets)
            }
            Err(e) => {
                error!("Cleaned data export failed: {}", e);
                warnings.push(export_warning(&cleaned_path, &e));
                ArtifactOutcome::failed(cleaned_path, &e)
            }
        };

    ExportReport {
        mappings: mappings_outcome,
        cleaned: cleaned_outcome,
        warnings,
    }
}

fn export_warning(path: &Path, err: &StandardizerError) -> Warning {
    Warning::new(WarningKind::ExportFailed, err.to_string()).with_subject(path.display().to_string())
}

/// Write one sheet of `Original Value` / `Standardized Value` pairs per
/// ready mapping. Returns the number of sheets written.
pub fn export_mappings(
    path: &Path,
    mappings: &BTreeMap<ColumnGroupIdentity, MappingSlot>,
    sheet_name_max_len: usize,
) -> Result<(usize, Vec<Warning>)> {
    let mut workbook = Workbook::new();
    let mut namer = SheetNamer::new(sheet_name_max_len);
    let mut warnings = Vec::new();
    let mut sheets = 0;

    for (identity, slot) in mappings {
        let Some(mapping) = slot.mapping() else {
            warn!("Skipping failed mapping {} in export", identity);
            warnings.push(
                Warning::new(WarningKind::ExportFailed, "Mapping failed; no sheet written")
                    .with_subject(identity.to_string()),
            );
            continue;
        };

        let sheet_name = namer.unique(&format!("{} - {}", identity.group, identity.column.column));
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;
        write_mapping_sheet(worksheet, mapping)?;
        sheets += 1;
    }

    if sheets == 0 {
        return Err(StandardizerError::ExportFailed {
            artifact: path.display().to_string(),
            reason: "no completed mappings to write".to_string(),
        });
    }

    workbook.save(path)?;
    info!("Wrote {} mapping sheets to {}", sheets, path.display());
    Ok((sheets, warnings))
}

fn write_mapping_sheet(worksheet: &mut Worksheet, mapping: &Mapping) -> Result<()> {
    worksheet.write_string(0, 0, ORIGINAL_HEADER)?;
    worksheet.write_string(0, 1, STANDARDIZED_HEADER)?;
    for (idx, entry) in mapping.entries().iter().enumerate() {
        let row = excel_row(idx + 1)?;
        worksheet.write_string(row, 0, entry.original.as_str())?;
        worksheet.write_string(row, 1, entry.canonical.as_str())?;
    }
    Ok(())
}

/// Write every dataset with a `<column>_standardized` column appended for
/// each of its mapped columns. Returns the number of sheets written.
pub fn export_cleaned(
    path: &Path,
    datasets: &[Dataset],
    mappings: &BTreeMap<ColumnGroupIdentity, MappingSlot>,
    sheet_name_max_len: usize,
) -> Result<(usize, Vec<Warning>)> {
    if datasets.is_empty() {
        return Err(StandardizerError::NoDatasetsLoaded);
    }

    let mut workbook = Workbook::new();
    let mut namer = SheetNamer::new(sheet_name_max_len);
    let mut warnings = Vec::new();

    for dataset in datasets {
        let column_mappings: Vec<(&str, &Mapping)> = mappings
            .iter()
            .filter(|(identity, _)| identity.column.dataset == dataset.name)
            .filter_map(|(identity, slot)| {
                slot.mapping().map(|m| (identity.column.column.as_str(), m))
            })
            .collect();

        let (frame, w) = standardize_frame(&dataset.frame, &column_mappings)?;
        warnings.extend(w.into_iter().map(|w| w.with_subject(dataset.name.clone())));

        let sheet_name = namer.unique(strip_known_extension(&dataset.name));
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;
        write_frame(worksheet, &frame)?;
    }

    workbook.save(path)?;
    info!("Wrote {} data sheets to {}", datasets.len(), path.display());
    Ok((datasets.len(), warnings))
}

/// Append a `<column>_standardized` column for each `(column, mapping)`.
///
/// Each cell is canonicalized before lookup so it matches the value set the
/// mapping was built from; cells without an entry keep their original value.
pub fn standardize_frame(
    frame: &DataFrame,
    column_mappings: &[(&str, &Mapping)],
) -> Result<(DataFrame, Vec<Warning>)> {
    let mut out = frame.clone();
    let mut warnings = Vec::new();

    for (column, mapping) in column_mappings {
        let new_name = format!("{column}{STANDARDIZED_SUFFIX}");
        if out.column(&new_name).is_ok() {
            warn!("Column '{}' already exists; not overwritten", new_name);
            warnings.push(Warning::new(
                WarningKind::ExportFailed,
                format!("Column '{new_name}' already exists and was not overwritten"),
            ));
            continue;
        }
        let Ok(source) = frame.column(column) else {
            warnings.push(Warning::new(
                WarningKind::ExportFailed,
                format!("Column '{column}' not found; no standardized column added"),
            ));
            continue;
        };

        let text = source.as_materialized_series().cast(&DataType::String)?;
        let lookup = mapping.as_lookup();
        let values: Vec<Option<String>> = text
            .str()?
            .into_iter()
            .map(|cell| {
                cell.map(|raw| {
                    let key = canonicalize(raw);
                    lookup
                        .get(key.as_str())
                        .map(|canonical| canonical.to_string())
                        .unwrap_or_else(|| raw.to_string())
                })
            })
            .collect();

        out.with_column(Column::new(new_name.into(), values))?;
    }

    Ok((out, warnings))
}

fn write_frame(worksheet: &mut Worksheet, frame: &DataFrame) -> Result<()> {
    for (col_idx, column) in frame.get_columns().iter().enumerate() {
        let col = excel_col(col_idx)?;
        worksheet.write_string(0, col, column.name().as_str())?;

        let series = column.as_materialized_series();
        if is_numeric_dtype(series.dtype()) {
            let numbers = series.cast(&DataType::Float64)?;
            for (row_idx, value) in numbers.f64()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_number(excel_row(row_idx + 1)?, col, v)?;
                }
            }
        } else {
            let text = series.cast(&DataType::String)?;
            for (row_idx, value) in text.str()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_string(excel_row(row_idx + 1)?, col, v)?;
                }
            }
        }
    }
    Ok(())
}

fn excel_row(idx: usize) -> Result<u32> {
    u32::try_from(idx).map_err(|_| StandardizerError::Internal(format!("row {idx} out of range")))
}

fn excel_col(idx: usize) -> Result<u16> {
    u16::try_from(idx)
        .map_err(|_| StandardizerError::Internal(format!("column {idx} out of range")))
}

fn strip_known_extension(name: &str) -> &str {
    [".csv", ".xlsx", ".xls"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Replace characters Excel rejects and bound the length.
pub fn sanitize_sheet_name(name: &str, max_len: usize) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if SHEET_NAME_REPLACED.contains(&c) { '_' } else { c })
        .take(max_len)
        .collect();
    if sanitized.is_empty() {
        "Sheet".to_string()
    } else {
        sanitized
    }
}

/// Hands out sanitized sheet names, unique within one workbook.
struct SheetNamer {
    max_len: usize,
    used: HashSet<String>,
}

impl SheetNamer {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            used: HashSet::new(),
        }
    }

    fn unique(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw, self.max_len);
        // Excel compares sheet names case-insensitively.
        if self.used.insert(base.to_lowercase()) {
            return base;
        }
        let mut n = 2;
        loop {
            let suffix = format!("_{n}");
            let keep = self.max_len.saturating_sub(suffix.chars().count());
            let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}
