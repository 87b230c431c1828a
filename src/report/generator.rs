//! Output generation.
//!
//! Tables are exported as CSV, JSON or Markdown, and can be drawn on
//! the terminal with comfy-table.

use crate::cli::OutputFormat;
use crate::models::{Cell, Table};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{CellAlignment, ContentArrangement};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::io::Write;
use std::path::Path;

/// Metadata printed at the top of Markdown reports.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Report heading.
    pub title: String,
    /// Input files the report was built from.
    pub sources: Vec<String>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Data rows read across all sources.
    pub rows_read: usize,
}

/// Render a table in the requested export format.
pub fn render(table: &Table, format: OutputFormat, date_format: &str) -> Result<String> {
    match format {
        OutputFormat::Csv => generate_csv(table, date_format),
        OutputFormat::Json => generate_json(table, date_format),
        OutputFormat::Markdown => Ok(generate_markdown_table(table, date_format)),
    }
}

/// Generate CSV with a header row.
pub fn generate_csv(table: &Table, date_format: &str) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.render(date_format)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Generate a JSON array with one object per row, keys in column order.
pub fn generate_json(table: &Table, date_format: &str) -> Result<String> {
    let rows = JsonRows { table, date_format };
    serde_json::to_string_pretty(&rows).map_err(Into::into)
}

struct JsonRows<'a> {
    table: &'a Table,
    date_format: &'a str,
}

struct JsonRow<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
    date_format: &'a str,
}

impl Serialize for JsonRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.table.rows.len()))?;
        for cells in &self.table.rows {
            seq.serialize_element(&JsonRow {
                columns: &self.table.columns,
                cells,
                date_format: self.date_format,
            })?;
        }
        seq.end()
    }
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, cell) in self.columns.iter().zip(self.cells) {
            match cell {
                Cell::Empty => map.serialize_entry(name, &())?,
                Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                    map.serialize_entry(name, &(*n as i64))?
                }
                Cell::Number(n) => map.serialize_entry(name, n)?,
                Cell::Text(s) => map.serialize_entry(name, s)?,
                Cell::Date(_) => map.serialize_entry(name, &cell.render(self.date_format))?,
            }
        }
        map.end()
    }
}

/// Generate a Markdown pipe table.
pub fn generate_markdown_table(table: &Table, date_format: &str) -> String {
    let mut output = String::new();

    output.push_str(&markdown_row(table.columns.iter().cloned()));
    output.push('|');
    for _ in &table.columns {
        output.push_str(":---|");
    }
    output.push('\n');

    for row in &table.rows {
        output.push_str(&markdown_row(row.iter().map(|c| c.render(date_format))));
    }

    output
}

fn markdown_row(cells: impl Iterator<Item = String>) -> String {
    let mut line = String::from("|");
    for cell in cells {
        line.push(' ');
        line.push_str(&cell.replace('|', "\\|"));
        line.push_str(" |");
    }
    line.push('\n');
    line
}

/// Generate a complete Markdown report around a result table.
///
/// `highlights` are (label, value) pairs listed before the table, such as
/// the busiest cinemas or the largest drops.
pub fn generate_markdown_report(
    metadata: &ReportMetadata,
    table: &Table,
    highlights: &[(String, String)],
    date_format: &str,
) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", metadata.title));
    output.push_str(&generate_metadata_section(metadata));

    if !highlights.is_empty() {
        output.push_str("## Highlights\n\n");
        for (label, value) in highlights {
            output.push_str(&format!("- **{}:** {}\n", label, value));
        }
        output.push('\n');
    }

    output.push_str("## Data\n\n");
    output.push_str(&generate_markdown_table(table, date_format));
    output.push('\n');

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    for source in &metadata.sources {
        section.push_str(&format!("- **Source:** `{}`\n", source));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows Read:** {}\n", metadata.rows_read));
    section.push('\n');

    section
}

/// Draw a table for the terminal.
pub fn render_terminal(table: &Table, date_format: &str) -> String {
    let mut out = comfy_table::Table::new();
    out.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(&table.columns);

    for row in &table.rows {
        out.add_row(row.iter().map(|cell| {
            let text = cell.render(date_format);
            match cell {
                Cell::Number(_) => comfy_table::Cell::new(text).set_alignment(CellAlignment::Right),
                _ => comfy_table::Cell::new(text),
            }
        }));
    }

    out.to_string()
}

/// Write output to a file, or to stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                handle.write_all(b"\n")?;
            }
        }
    }

    Ok(())
}
