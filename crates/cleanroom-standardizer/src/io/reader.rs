//! Loading CSV files and Excel workbooks into datasets.

use calamine::{Data, Range, Reader, open_workbook_auto};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::Dataset;
use crate::error::{Result, ResultExt, StandardizerError};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Load one input file.
///
/// CSV files yield one dataset named after the file. Workbooks yield one
/// dataset per selected sheet; `sheets` empty selects every sheet. When the
/// workbook has more than one sheet each dataset is named
/// `"<file> - <sheet>"`.
pub fn load_file(path: &Path, sheets: &[String]) -> Result<Vec<Dataset>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if extension == "csv" {
        let frame = load_csv_with_fallbacks(path)
            .context(format!("Failed to load '{}'", path.display()))?;
        info!(
            "Loaded {}: {} rows x {} columns",
            file_name,
            frame.height(),
            frame.width()
        );
        return Ok(vec![Dataset::new(file_name, path, frame)]);
    }

    if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        return load_workbook(path, &file_name, sheets);
    }

    Err(StandardizerError::UnsupportedFileType(if extension.is_empty() {
        file_name
    } else {
        format!(".{extension}")
    }))
}

/// Load a CSV file, retrying with looser settings when parsing fails.
pub fn load_csv_with_fallbacks(path: &Path) -> Result<DataFrame> {
    // Standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard CSV loading failed: {}", e),
    }

    // Without quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(None))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("CSV loading without quotes failed: {}", e),
    }

    // Pre-cleaned content
    let content = std::fs::read_to_string(path)?;
    let cursor = Cursor::new(clean_csv_content(&content));
    let frame = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(cursor)
        .finish()?;
    Ok(frame)
}

/// Collapse doubled quotes and drop blank lines.
pub fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_workbook(path: &Path, file_name: &str, sheets: &[String]) -> Result<Vec<Dataset>> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names();
    let multi_sheet = available.len() > 1;

    let selected: Vec<String> = if sheets.is_empty() {
        available.clone()
    } else {
        for requested in sheets {
            if !available.contains(requested) {
                warn!("Sheet '{}' not found in {}", requested, file_name);
            }
        }
        available
            .iter()
            .filter(|name| sheets.contains(name))
            .cloned()
            .collect()
    };

    if selected.is_empty() {
        return Err(StandardizerError::DatasetNotFound(format!(
            "{} (sheets: {})",
            file_name,
            sheets.join(", ")
        )));
    }

    let mut datasets = Vec::with_capacity(selected.len());
    for sheet in selected {
        let range = workbook.worksheet_range(&sheet)?;
        if range.is_empty() {
            warn!("Skipping empty sheet '{}' in {}", sheet, file_name);
            continue;
        }
        let frame = range_to_frame(&range)
            .context(format!("Failed to convert sheet '{sheet}' of '{file_name}'"))?;
        let name = if multi_sheet {
            format!("{file_name} - {sheet}")
        } else {
            file_name.to_string()
        };
        info!(
            "Loaded {}: {} rows x {} columns",
            name,
            frame.height(),
            frame.width()
        );
        datasets.push(Dataset::new(name, path, frame).with_sheet(sheet));
    }

    Ok(datasets)
}

/// Convert a worksheet range to a frame, taking the first row as header.
///
/// Columns whose non-empty cells are all numbers become `Float64`; anything
/// else becomes `String` with numbers rendered as text.
fn range_to_frame(range: &Range<Data>) -> Result<DataFrame> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let body: Vec<&[Data]> = rows.collect();
    let names = header_names(header);

    let mut columns = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let cells: Vec<&Data> = body.iter().filter_map(|row| row.get(idx)).collect();
        let all_numeric = cells
            .iter()
            .any(|c| !matches!(c, Data::Empty))
            && cells
                .iter()
                .all(|c| matches!(c, Data::Empty | Data::Int(_) | Data::Float(_)));

        let column = if all_numeric {
            let values: Vec<Option<f64>> = cells.iter().map(|c| cell_number(c)).collect();
            Column::new(name.into(), values)
        } else {
            let values: Vec<Option<String>> = cells.iter().map(|c| cell_text(c)).collect();
            Column::new(name.into(), values)
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

/// Header labels with blanks named and repeats suffixed.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell_text(cell)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("Unnamed: {idx}"));
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{base}.{n}");
                n += 1;
            }
            name
        })
        .collect()
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
