//! Reading admission exports into tables.
//!
//! Spreadsheets (xlsx, xlsm, xls, ods) are read with calamine, CSV files
//! with the csv crate. The first row is always the header.

use crate::config::Config;
use crate::models::{Cell, Table, TableError};
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::path::Path;
use tracing::debug;

/// Options for reading an export.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Worksheet to read (first sheet when `None`).
    pub sheet: Option<String>,
    /// Field delimiter for CSV files.
    pub csv_delimiter: char,
    /// Format used for header cells that hold dates.
    pub date_format: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            csv_delimiter: ',',
            date_format: crate::models::DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl From<&Config> for LoadOptions {
    fn from(config: &Config) -> Self {
        Self {
            sheet: config.input.sheet.clone(),
            csv_delimiter: config.input.csv_delimiter,
            date_format: config.output.date_format.clone(),
        }
    }
}

/// File formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Spreadsheet,
    Csv,
}

impl InputKind {
    /// Detect the input kind from the file extension.
    pub fn detect(path: &Path) -> Result<Self, TableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputKind::Spreadsheet),
            "csv" => Ok(InputKind::Csv),
            other => Err(TableError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            })),
        }
    }
}

/// Load an export file into a table.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let table = match InputKind::detect(path)? {
        InputKind::Spreadsheet => load_spreadsheet(path, options)?,
        InputKind::Csv => load_csv(path, options)?,
    };

    debug!(
        "Loaded {} ({} columns, {} rows)",
        path.display(),
        table.columns.len(),
        table.row_count()
    );
    Ok(table)
}

fn load_spreadsheet(path: &Path, options: &LoadOptions) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_name = match options.sheet {
        Some(ref name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| TableError::NoSheet(path.to_path_buf()))?,
    };
    debug!("Reading sheet '{}' from {}", sheet_name, path.display());

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet '{}' in {}", sheet_name, path.display()))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| TableError::EmptyInput(path.to_path_buf()))?
        .iter()
        .map(|cell| header_text(cell, &options.date_format))
        .collect();

    let body: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Ok(Table::from_raw(header, body))
}

fn load_csv(path: &Path, options: &LoadOptions) -> Result<Table> {
    let delimiter = u8::try_from(options.csv_delimiter).with_context(|| {
        format!(
            "CSV delimiter must be a single-byte character, got '{}'",
            options.csv_delimiter
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let header: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(TableError::EmptyInput(path.to_path_buf()).into());
    }

    let mut body = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Malformed CSV record {} in {}", i + 2, path.display()))?;
        body.push(record.iter().map(Cell::from).collect());
    }

    Ok(Table::from_raw(header, body))
}

/// Convert a calamine cell into a table cell.
fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::String(s) => Cell::from(s.as_str()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(date) => Cell::Date(date),
            None => Cell::Text(cell.to_string()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn header_text(cell: &Data, date_format: &str) -> String {
    match convert_cell(cell) {
        Cell::Date(date) => date.format(date_format).to_string(),
        other => other.render(date_format),
    }
}
