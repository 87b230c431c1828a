//! Data models for cinema admission tables.
//!
//! This module contains the in-memory table every command works on,
//! plus the labels used to recognise per-day admission columns.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Date format used when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Errors raised while shaping a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("no header row in {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("no worksheet found in {}", .0.display())]
    NoSheet(PathBuf),

    #[error("no usable start date in column '{0}'")]
    NoStartDate(String),

    #[error("the two periods have no comparable day columns")]
    SeriesMismatch,
}

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Numeric value of the cell, parsing text when it looks like a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Date value of the cell, parsing common export formats from text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date_text(s.trim()),
            _ => None,
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the cell as text, writing dates with `date_format`.
    pub fn render(&self, date_format: &str) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Date(d) => d.format(date_format).to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(DEFAULT_DATE_FORMAT))
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// Format a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    for fmt in [DEFAULT_DATE_FORMAT, "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Day of the cinema week, in the order exports list them (Wednesday first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CinemaDay {
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
    Mon,
    Tue,
}

impl CinemaDay {
    /// All days in cinema-week order.
    pub const ALL: [CinemaDay; 7] = [
        CinemaDay::Wed,
        CinemaDay::Thu,
        CinemaDay::Fri,
        CinemaDay::Sat,
        CinemaDay::Sun,
        CinemaDay::Mon,
        CinemaDay::Tue,
    ];

    /// Days since the Wednesday that opens the week.
    pub fn offset(self) -> i64 {
        self as i64
    }

    /// Short English name, as used in export headers.
    pub fn name(self) -> &'static str {
        match self {
            CinemaDay::Wed => "Wed",
            CinemaDay::Thu => "Thu",
            CinemaDay::Fri => "Fri",
            CinemaDay::Sat => "Sat",
            CinemaDay::Sun => "Sun",
            CinemaDay::Mon => "Mon",
            CinemaDay::Tue => "Tue",
        }
    }

    /// Parse a short or full day name, ignoring case.
    pub fn from_name(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|day| {
            let short = day.name().to_lowercase();
            lower == short || lower == day.full_name()
        })
    }

    fn full_name(self) -> &'static str {
        match self {
            CinemaDay::Wed => "wednesday",
            CinemaDay::Thu => "thursday",
            CinemaDay::Fri => "friday",
            CinemaDay::Sat => "saturday",
            CinemaDay::Sun => "sunday",
            CinemaDay::Mon => "monday",
            CinemaDay::Tue => "tuesday",
        }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, CinemaDay::Fri | CinemaDay::Sat | CinemaDay::Sun)
    }
}

impl From<Weekday> for CinemaDay {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => CinemaDay::Mon,
            Weekday::Tue => CinemaDay::Tue,
            Weekday::Wed => CinemaDay::Wed,
            Weekday::Thu => CinemaDay::Thu,
            Weekday::Fri => CinemaDay::Fri,
            Weekday::Sat => CinemaDay::Sat,
            Weekday::Sun => CinemaDay::Sun,
        }
    }
}

impl fmt::Display for CinemaDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Label of a per-day admission column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesLabel {
    /// Day-labelled column (`Adm Wed` or `Wed`).
    Day(CinemaDay),
    /// Date-labelled column (`05/06/2024`).
    Date(NaiveDate),
}

impl SeriesLabel {
    /// Recognise a series column from its header, or `None` for identifying columns.
    pub fn parse(name: &str, prefix: &str, date_format: &str) -> Option<Self> {
        let trimmed = name.trim();
        if !prefix.is_empty() {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                if let Some(day) = CinemaDay::from_name(rest) {
                    return Some(SeriesLabel::Day(day));
                }
            }
        }
        if let Some(day) = CinemaDay::from_name(trimmed) {
            return Some(SeriesLabel::Day(day));
        }
        NaiveDate::parse_from_str(trimmed, date_format)
            .ok()
            .map(SeriesLabel::Date)
    }

    /// Day of the cinema week this label falls on.
    pub fn day(&self) -> CinemaDay {
        match self {
            SeriesLabel::Day(day) => *day,
            SeriesLabel::Date(date) => CinemaDay::from(date.weekday()),
        }
    }

    pub fn is_weekend(&self) -> bool {
        self.day().is_weekend()
    }
}

/// A series column located in a table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesColumn {
    /// Index of the column in the table.
    pub index: usize,
    /// Parsed label.
    pub label: SeriesLabel,
    /// Header as it appears in the table.
    pub name: String,
}

/// In-memory table: a header row plus rows of equal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names, unique within the table.
    pub columns: Vec<String>,
    /// Data rows, each `columns.len()` cells wide.
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: dedupe_headers(columns),
            rows: Vec::new(),
        }
    }

    /// Builds a table from raw sheet rows, skipping rows with no content.
    pub fn from_raw(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(header);
        for row in rows {
            if row.iter().all(Cell::is_blank) {
                continue;
            }
            table.push_row(row);
        }
        table
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`Table::column_index`], but a missing column is an error.
    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Values of one column.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Sum of the numeric values in one column.
    pub fn column_sum(&self, index: usize) -> f64 {
        self.column(index).filter_map(Cell::as_number).sum()
    }

    /// Series columns ordered chronologically (days in week order, dates ascending).
    pub fn series_columns(&self, prefix: &str, date_format: &str) -> Vec<SeriesColumn> {
        let mut series: Vec<SeriesColumn> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                SeriesLabel::parse(name, prefix, date_format).map(|label| SeriesColumn {
                    index,
                    label,
                    name: name.clone(),
                })
            })
            .collect();
        series.sort_by_key(|s| (s.label, s.index));
        series
    }
}

/// Make header names unique the way spreadsheet readers do.
///
/// Blank names become `Unnamed: <i>`; repeats get ` (2)`, ` (3)` appended,
/// skipping any suffix already taken by another header.
fn dedupe_headers(columns: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(columns.len());

    for (i, name) in columns.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name.trim().to_string()
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while used.contains(&candidate) {
            n += 1;
            candidate = format!("{} ({})", base, n);
        }
        used.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_as_number() {
        assert_eq!(Cell::Number(3.0).as_number(), Some(3.0));
        assert_eq!(Cell::Text(" 42 ".to_string()).as_number(), Some(42.0));
        assert_eq!(Cell::Text("n/a".to_string()).as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_as_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 5);
        assert_eq!(Cell::Text("05/06/2024".to_string()).as_date(), expected);
        assert_eq!(Cell::Text("2024-06-05".to_string()).as_date(), expected);
        assert_eq!(
            Cell::Text("2024-06-05 00:00:00".to_string()).as_date(),
            expected
        );
        assert_eq!(Cell::Number(5.0).as_date(), None);
    }

    #[test]
    fn test_render_numbers() {
        assert_eq!(Cell::Number(120.0).render(DEFAULT_DATE_FORMAT), "120");
        assert_eq!(Cell::Number(-3.5).render(DEFAULT_DATE_FORMAT), "-3.5");
    }

    #[test]
    fn test_cinema_day_order_and_weekend() {
        assert!(CinemaDay::Wed < CinemaDay::Tue);
        assert_eq!(CinemaDay::Sat.offset(), 3);
        assert!(CinemaDay::Fri.is_weekend());
        assert!(CinemaDay::Sun.is_weekend());
        assert!(!CinemaDay::Mon.is_weekend());
        assert_eq!(CinemaDay::from_name("THURSDAY"), Some(CinemaDay::Thu));
        assert_eq!(CinemaDay::from_name("Adm"), None);
    }

    #[test]
    fn test_series_label_parse() {
        let fmt = DEFAULT_DATE_FORMAT;
        assert_eq!(
            SeriesLabel::parse("Adm Wed", "Adm ", fmt),
            Some(SeriesLabel::Day(CinemaDay::Wed))
        );
        assert_eq!(
            SeriesLabel::parse("Sun", "Adm ", fmt),
            Some(SeriesLabel::Day(CinemaDay::Sun))
        );
        assert_eq!(
            SeriesLabel::parse("07/06/2024", "Adm ", fmt),
            NaiveDate::from_ymd_opt(2024, 6, 7).map(SeriesLabel::Date)
        );
        assert_eq!(SeriesLabel::parse("Cinema", "Adm ", fmt), None);
    }

    #[test]
    fn test_date_label_weekend() {
        // 7 June 2024 was a Friday
        let label = SeriesLabel::Date(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());
        assert_eq!(label.day(), CinemaDay::Fri);
        assert!(label.is_weekend());
    }

    #[test]
    fn test_dedupe_headers() {
        let table = Table::new(vec![
            "Cinema".to_string(),
            "Adm Wed".to_string(),
            "Adm Wed".to_string(),
            "".to_string(),
        ]);
        assert_eq!(
            table.columns,
            vec!["Cinema", "Adm Wed", "Adm Wed (2)", "Unnamed: 3"]
        );
    }

    #[test]
    fn test_dedupe_headers_skips_taken_suffix() {
        let table = Table::new(vec![
            "Adm Wed".to_string(),
            "Adm Wed (2)".to_string(),
            "Adm Wed".to_string(),
        ]);
        assert_eq!(table.columns, vec!["Adm Wed", "Adm Wed (2)", "Adm Wed (3)"]);
        assert_eq!(table.column_index("Adm Wed (3)"), Some(2));
    }

    #[test]
    fn test_from_raw_pads_and_skips_blank_rows() {
        let table = Table::from_raw(
            vec!["Cinema".to_string(), "Adm Wed".to_string()],
            vec![
                vec![Cell::from("Odeon")],
                vec![Cell::Empty, Cell::Text("  ".to_string())],
                vec![Cell::from("Rex"), Cell::Number(4.0), Cell::Number(9.0)],
            ],
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0], vec![Cell::from("Odeon"), Cell::Empty]);
        assert_eq!(table.rows[1].len(), 2);
    }

    #[test]
    fn test_series_columns_sorted() {
        let table = Table::new(vec![
            "Cinema".to_string(),
            "Adm Sat".to_string(),
            "Adm Wed".to_string(),
            "Title".to_string(),
        ]);
        let series = table.series_columns("Adm ", DEFAULT_DATE_FORMAT);
        let names: Vec<_> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Adm Wed", "Adm Sat"]);
    }
}
