//! Relabelling of raw day columns (`Adm Wed`, `Adm Thu`, ...).

use super::SeriesSpec;
use crate::models::{CinemaDay, Table, TableError};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Most frequent date in `column`. Ties go to the earliest date.
pub fn most_frequent_date(table: &Table, column: &str) -> Result<NaiveDate, TableError> {
    let index = table
        .column_index(column)
        .ok_or_else(|| TableError::NoStartDate(column.to_string()))?;

    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in table.column(index).filter_map(|c| c.as_date()) {
        *counts.entry(date).or_default() += 1;
    }

    // BTreeMap iterates ascending, so the first maximum is the earliest date
    let mut best: Option<(NaiveDate, usize)> = None;
    for (date, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((date, count));
        }
    }

    best.map(|(date, _)| date)
        .ok_or_else(|| TableError::NoStartDate(column.to_string()))
}

/// Parse a raw day column name (`<prefix><Day>`).
fn raw_day(name: &str, prefix: &str) -> Option<CinemaDay> {
    name.trim()
        .strip_prefix(prefix)
        .and_then(CinemaDay::from_name)
}

/// Rename raw day columns to the calendar dates they cover.
///
/// The start date is the most common value of `start_column`; each day
/// column becomes `start + offset(day)` in the cinema week. Returns the
/// start date used.
pub fn rename_to_dates(
    table: &mut Table,
    start_column: &str,
    spec: &SeriesSpec,
) -> Result<NaiveDate, TableError> {
    let start = most_frequent_date(table, start_column)?;
    debug!("Start date from '{}': {}", start_column, start);

    rename_days(table, &spec.prefix, |day| {
        (start + Duration::days(day.offset()))
            .format(&spec.date_format)
            .to_string()
    });

    Ok(start)
}

/// Rename raw day columns to bare weekday names (`Adm Wed` -> `Wed`).
pub fn rename_to_weekdays(table: &mut Table, prefix: &str) -> usize {
    rename_days(table, prefix, |day| day.name().to_string())
}

fn rename_days<F>(table: &mut Table, prefix: &str, label: F) -> usize
where
    F: Fn(CinemaDay) -> String,
{
    if prefix.is_empty() {
        return 0;
    }

    let mut renamed = 0;
    for i in 0..table.columns.len() {
        let Some(day) = raw_day(&table.columns[i], prefix) else {
            continue;
        };

        let new_name = label(day);
        if table.columns.iter().any(|c| *c == new_name) {
            warn!(
                "Not renaming '{}': a column named '{}' already exists",
                table.columns[i], new_name
            );
            continue;
        }

        debug!("Renaming '{}' -> '{}'", table.columns[i], new_name);
        table.columns[i] = new_name;
        renamed += 1;
    }

    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn table_with_starts(starts: &[&str], days: &[&str]) -> Table {
        let mut columns = vec!["Cinema".to_string(), "Start Date".to_string()];
        columns.extend(days.iter().map(|d| d.to_string()));

        let mut table = Table::new(columns);
        for start in starts {
            table.push_row(vec![Cell::from("Odeon"), Cell::from(*start)]);
        }
        table
    }

    #[test]
    fn test_most_frequent_date() {
        let table = table_with_starts(&["05/06/2024", "12/06/2024", "12/06/2024"], &[]);
        assert_eq!(
            most_frequent_date(&table, "Start Date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
        );
    }

    #[test]
    fn test_most_frequent_date_tie_is_earliest() {
        let table = table_with_starts(&["12/06/2024", "05/06/2024", "garbage"], &[]);
        assert_eq!(
            most_frequent_date(&table, "Start Date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 5).unwrap()
        );
    }

    #[test]
    fn test_most_frequent_date_missing() {
        let table = table_with_starts(&["n/a"], &[]);
        assert!(matches!(
            most_frequent_date(&table, "Start Date"),
            Err(TableError::NoStartDate(_))
        ));
        assert!(matches!(
            most_frequent_date(&table, "Week"),
            Err(TableError::NoStartDate(_))
        ));
    }

    #[test]
    fn test_rename_to_dates_uses_week_offset() {
        // Thursday is missing: Friday still lands two days after Wednesday
        let mut table = table_with_starts(&["05/06/2024"], &["Adm Wed", "Adm Fri", "Adm Tue"]);
        let start = rename_to_dates(&mut table, "Start Date", &SeriesSpec::default()).unwrap();

        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
        assert_eq!(
            table.columns,
            vec![
                "Cinema",
                "Start Date",
                "05/06/2024",
                "07/06/2024",
                "11/06/2024"
            ]
        );
    }

    #[test]
    fn test_rename_to_dates_custom_format() {
        let mut table = table_with_starts(&["2024-06-05"], &["Adm Sun"]);
        let spec = SeriesSpec {
            date_format: "%Y-%m-%d".to_string(),
            ..SeriesSpec::default()
        };
        rename_to_dates(&mut table, "Start Date", &spec).unwrap();
        assert_eq!(table.columns[2], "2024-06-09");
    }

    #[test]
    fn test_rename_to_weekdays() {
        let mut table = table_with_starts(&[], &["Adm Wed", "Adm Thu", "Notes"]);
        let renamed = rename_to_weekdays(&mut table, "Adm ");

        assert_eq!(renamed, 2);
        assert_eq!(table.columns, vec!["Cinema", "Start Date", "Wed", "Thu", "Notes"]);
    }

    #[test]
    fn test_rename_skips_collisions() {
        let mut table = table_with_starts(&[], &["Wed", "Adm Wed"]);
        let renamed = rename_to_weekdays(&mut table, "Adm ");

        assert_eq!(renamed, 0);
        assert_eq!(table.columns[3], "Adm Wed");
    }
}
