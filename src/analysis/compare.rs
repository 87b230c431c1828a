//! Period-over-period comparison of two admission exports.

use super::aggregator::{aggregate_by_cinema, AggregateOptions};
use crate::models::{Cell, CinemaDay, SeriesColumn, Table, TableError};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Settings for a comparison.
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    pub aggregate: AggregateOptions,
    /// Keep only Friday, Saturday and Sunday.
    pub weekend_only: bool,
}

/// Result of comparing period A (earlier) with period B (later).
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Per-cinema differences, with a final total row.
    pub table: Table,
    /// Aligned (A, B) series labels.
    pub pairs: Vec<(String, String)>,
    total_label: String,
}

pub const TOTAL_A: &str = "Total A";
pub const TOTAL_B: &str = "Total B";
pub const DIFF: &str = "Diff";
pub const DIFF_PCT: &str = "Diff %";

impl Comparison {
    /// Cinemas whose change is a drop of at least `pct` percent.
    pub fn drops_at_least(&self, pct: f64) -> Vec<(String, f64)> {
        let Some(col) = self.table.column_index(DIFF_PCT) else {
            return Vec::new();
        };

        self.cinema_rows()
            .filter_map(|row| {
                let change = row[col].as_number()?;
                (change <= -pct).then(|| (row[0].to_string(), change))
            })
            .collect()
    }

    /// Drop cinemas whose absolute difference is below `min`. The total row stays.
    pub fn retain_min_diff(&mut self, min: f64) {
        let Some(col) = self.table.column_index(DIFF) else {
            return;
        };
        let total_label = self.total_label.clone();

        self.table.rows.retain(|row| {
            row[0].to_string() == total_label
                || row[col].as_number().map_or(false, |d| d.abs() >= min)
        });
    }

    /// Rows for individual cinemas (everything but the total row).
    pub fn cinema_rows(&self) -> impl Iterator<Item = &Vec<Cell>> {
        self.table
            .rows
            .iter()
            .filter(move |row| row[0].to_string() != self.total_label)
    }
}

/// Compare two periods cinema by cinema.
///
/// Both tables are aggregated by cinema first. Day columns are paired by
/// day of the cinema week, so weeks starting on different dates line up and
/// a day missing from one period does not shift the others.
pub fn compare(a: &Table, b: &Table, options: &CompareOptions) -> Result<Comparison, TableError> {
    let agg = &options.aggregate;
    let agg_a = aggregate_by_cinema(a, agg)?;
    let agg_b = aggregate_by_cinema(b, agg)?;

    let days_a = series_by_day(select_series(&agg_a, options), "A");
    let days_b = series_by_day(select_series(&agg_b, options), "B");

    for (day, column) in &days_a {
        if !days_b.contains_key(day) {
            warn!("{} ({}) is only in period A; left out", day, column.name);
        }
    }
    for (day, column) in &days_b {
        if !days_a.contains_key(day) {
            warn!("{} ({}) is only in period B; left out", day, column.name);
        }
    }

    let pairs: Vec<(&SeriesColumn, &SeriesColumn)> = days_a
        .iter()
        .filter_map(|(day, sa)| days_b.get(day).map(|sb| (sa, sb)))
        .collect();
    if pairs.is_empty() {
        return Err(TableError::SeriesMismatch);
    }

    let values_a = values_by_cinema(&agg_a, pairs.iter().map(|(sa, _)| sa.index), agg);
    let values_b = values_by_cinema(&agg_b, pairs.iter().map(|(_, sb)| sb.index), agg);

    let cinemas: BTreeSet<&String> = values_a.keys().chain(values_b.keys()).collect();
    let zeros = vec![0.0; pairs.len()];

    let mut columns = vec![agg.cinema_column.clone()];
    columns.extend(pairs.iter().map(|(sa, sb)| pair_label(&sa.name, &sb.name)));
    columns.extend([TOTAL_A, TOTAL_B, DIFF, DIFF_PCT].map(String::from));

    let mut table = Table::new(columns);
    let mut sum_a = vec![0.0; pairs.len()];
    let mut sum_b = vec![0.0; pairs.len()];

    for cinema in cinemas {
        let va = values_a.get(cinema).unwrap_or(&zeros);
        let vb = values_b.get(cinema).unwrap_or(&zeros);
        for i in 0..pairs.len() {
            sum_a[i] += va[i];
            sum_b[i] += vb[i];
        }
        table.push_row(diff_row(Cell::from(cinema.as_str()), va, vb));
    }
    table.push_row(diff_row(Cell::from(agg.total_label.as_str()), &sum_a, &sum_b));

    debug!(
        "Compared {} cinemas over {} aligned days",
        table.row_count() - 1,
        pairs.len()
    );

    Ok(Comparison {
        table,
        pairs: pairs
            .iter()
            .map(|(sa, sb)| (sa.name.clone(), sb.name.clone()))
            .collect(),
        total_label: agg.total_label.clone(),
    })
}

/// Index series columns by day of the week, keeping the first column per day.
fn series_by_day(series: Vec<SeriesColumn>, period: &str) -> BTreeMap<CinemaDay, SeriesColumn> {
    let mut days = BTreeMap::new();
    for column in series {
        match days.entry(column.label.day()) {
            Entry::Vacant(slot) => {
                slot.insert(column);
            }
            Entry::Occupied(slot) => warn!(
                "Period {} has more than one {} column; ignoring {}",
                period,
                slot.key(),
                column.name
            ),
        }
    }
    days
}

fn select_series(aggregated: &Table, options: &CompareOptions) -> Vec<SeriesColumn> {
    options
        .aggregate
        .series
        .columns(aggregated)
        .into_iter()
        .filter(|s| !options.weekend_only || s.label.is_weekend())
        .collect()
}

/// Per-cinema values of the given columns, skipping the total row.
fn values_by_cinema(
    aggregated: &Table,
    indices: impl Iterator<Item = usize> + Clone,
    options: &AggregateOptions,
) -> BTreeMap<String, Vec<f64>> {
    aggregated
        .rows
        .iter()
        .map(|row| (row[0].to_string(), row))
        .filter(|(name, _)| *name != options.total_label)
        .map(|(name, row)| {
            let values = indices
                .clone()
                .map(|i| row[i].as_number().unwrap_or(0.0))
                .collect();
            (name, values)
        })
        .collect()
}

fn pair_label(a: &str, b: &str) -> String {
    if a == b {
        a.to_string()
    } else {
        format!("{} vs {}", b, a)
    }
}

fn diff_row(key: Cell, a: &[f64], b: &[f64]) -> Vec<Cell> {
    let total_a: f64 = a.iter().sum();
    let total_b: f64 = b.iter().sum();
    let diff = total_b - total_a;

    let mut row = vec![key];
    row.extend(a.iter().zip(b).map(|(x, y)| Cell::Number(y - x)));
    row.push(Cell::Number(total_a));
    row.push(Cell::Number(total_b));
    row.push(Cell::Number(diff));
    row.push(percent_change(total_a, diff));
    row
}

/// Change as a percentage of `base`, rounded to one decimal; blank when `base` is zero.
fn percent_change(base: f64, diff: f64) -> Cell {
    if base == 0.0 {
        Cell::Empty
    } else {
        Cell::Number((diff / base * 1000.0).round() / 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Week of 5 June 2024 (Wed..Sun) or 12 June 2024, with (cinema, [wed, thu, fri, sat, sun]).
    fn period(start_day: u32, rows: &[(&str, [f64; 5])]) -> Table {
        let mut columns = vec!["Cinema".to_string()];
        columns.extend((0..5).map(|i| format!("{:02}/06/2024", start_day + i)));

        let mut table = Table::new(columns);
        for (cinema, values) in rows {
            let mut row = vec![Cell::from(*cinema)];
            row.extend(values.iter().copied().map(Cell::Number));
            table.push_row(row);
        }
        table
    }

    fn value(cmp: &Comparison, row: usize, column: &str) -> Cell {
        let col = cmp.table.column_index(column).unwrap();
        cmp.table.rows[row][col].clone()
    }

    #[test]
    fn test_compare_aligns_weeks_by_day() {
        let a = period(5, &[("Odeon", [10.0, 10.0, 20.0, 30.0, 30.0])]);
        let b = period(12, &[("Odeon", [12.0, 8.0, 25.0, 30.0, 45.0])]);

        let cmp = compare(&a, &b, &CompareOptions::default()).unwrap();

        assert_eq!(cmp.pairs.len(), 5);
        assert_eq!(cmp.table.columns[1], "12/06/2024 vs 05/06/2024");
        assert_eq!(value(&cmp, 0, "12/06/2024 vs 05/06/2024"), Cell::Number(2.0));
        assert_eq!(value(&cmp, 0, "13/06/2024 vs 06/06/2024"), Cell::Number(-2.0));
        assert_eq!(value(&cmp, 0, TOTAL_A), Cell::Number(100.0));
        assert_eq!(value(&cmp, 0, TOTAL_B), Cell::Number(120.0));
        assert_eq!(value(&cmp, 0, DIFF), Cell::Number(20.0));
        assert_eq!(value(&cmp, 0, DIFF_PCT), Cell::Number(20.0));
    }

    #[test]
    fn test_compare_union_of_cinemas() {
        let a = period(5, &[("Odeon", [1.0; 5]), ("Rex", [2.0; 5])]);
        let b = period(12, &[("Odeon", [1.0; 5]), ("Lux", [3.0; 5])]);

        let cmp = compare(&a, &b, &CompareOptions::default()).unwrap();
        let names: Vec<String> = cmp.table.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(names, vec!["Lux", "Odeon", "Rex", "Total"]);

        // Lux is new: no base, so no percentage
        assert_eq!(value(&cmp, 0, DIFF), Cell::Number(15.0));
        assert_eq!(value(&cmp, 0, DIFF_PCT), Cell::Empty);
        // Rex closed
        assert_eq!(value(&cmp, 2, DIFF_PCT), Cell::Number(-100.0));
        // Total row: A = 5 + 10, B = 5 + 15
        assert_eq!(value(&cmp, 3, TOTAL_A), Cell::Number(15.0));
        assert_eq!(value(&cmp, 3, TOTAL_B), Cell::Number(20.0));
        assert_eq!(value(&cmp, 3, DIFF_PCT), Cell::Number(33.3));
    }

    #[test]
    fn test_compare_weekend_only() {
        // 7-9 June 2024 are Fri-Sun
        let a = period(5, &[("Odeon", [100.0, 100.0, 20.0, 30.0, 30.0])]);
        let b = period(12, &[("Odeon", [0.0, 0.0, 25.0, 30.0, 45.0])]);

        let options = CompareOptions {
            weekend_only: true,
            ..CompareOptions::default()
        };
        let cmp = compare(&a, &b, &options).unwrap();

        assert_eq!(cmp.pairs.len(), 3);
        assert_eq!(cmp.pairs[0], ("07/06/2024".to_string(), "14/06/2024".to_string()));
        assert_eq!(value(&cmp, 0, TOTAL_A), Cell::Number(80.0));
        assert_eq!(value(&cmp, 0, TOTAL_B), Cell::Number(100.0));
    }

    #[test]
    fn test_compare_weekday_labels_share_names() {
        let mut a = Table::new(vec!["Cinema".to_string(), "Sat".to_string()]);
        a.push_row(vec![Cell::from("Odeon"), Cell::Number(10.0)]);
        let mut b = a.clone();
        b.rows[0][1] = Cell::Number(4.0);

        let cmp = compare(&a, &b, &CompareOptions::default()).unwrap();
        assert_eq!(cmp.table.columns[1], "Sat");
        assert_eq!(value(&cmp, 0, "Sat"), Cell::Number(-6.0));
    }

    #[test]
    fn test_compare_without_series() {
        let mut a = Table::new(vec!["Cinema".to_string(), "Mon".to_string()]);
        a.push_row(vec![Cell::from("Odeon"), Cell::Number(1.0)]);

        let options = CompareOptions {
            weekend_only: true,
            ..CompareOptions::default()
        };
        assert!(matches!(
            compare(&a, &a, &options),
            Err(TableError::SeriesMismatch)
        ));
    }

    #[test]
    fn test_drops_and_min_diff() {
        let a = period(5, &[("Odeon", [10.0; 5]), ("Rex", [10.0; 5]), ("Lux", [10.0; 5])]);
        let b = period(12, &[("Odeon", [5.0; 5]), ("Rex", [10.0; 5]), ("Lux", [9.0; 5])]);

        let mut cmp = compare(&a, &b, &CompareOptions::default()).unwrap();
        assert_eq!(cmp.drops_at_least(40.0), vec![("Odeon".to_string(), -50.0)]);

        cmp.retain_min_diff(10.0);
        let names: Vec<String> = cmp.table.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(names, vec!["Odeon", "Total"]);
    }

    fn day_table(columns: &[&str], values: &[f64]) -> Table {
        let mut header = vec!["Cinema".to_string()];
        header.extend(columns.iter().map(|c| c.to_string()));
        let mut table = Table::new(header);
        let mut row = vec![Cell::from("Odeon")];
        row.extend(values.iter().copied().map(Cell::Number));
        table.push_row(row);
        table
    }

    #[test]
    fn test_compare_missing_day_keeps_weekdays_paired() {
        let a = day_table(&["Wed", "Fri"], &[10.0, 50.0]);
        let b = day_table(&["Wed", "Thu", "Fri"], &[10.0, 5.0, 50.0]);

        let cmp = compare(&a, &b, &CompareOptions::default()).unwrap();

        assert_eq!(
            cmp.pairs,
            vec![
                ("Wed".to_string(), "Wed".to_string()),
                ("Fri".to_string(), "Fri".to_string())
            ]
        );
        assert_eq!(&cmp.table.columns[..3], &["Cinema", "Wed", "Fri"]);
        assert_eq!(value(&cmp, 0, "Fri"), Cell::Number(0.0));
        assert_eq!(value(&cmp, 0, TOTAL_A), Cell::Number(60.0));
        assert_eq!(value(&cmp, 0, TOTAL_B), Cell::Number(60.0));
        assert_eq!(value(&cmp, 0, DIFF_PCT), Cell::Number(0.0));
        assert!(cmp.drops_at_least(1.0).is_empty());
    }

    #[test]
    fn test_compare_weekend_only_day_labels() {
        let a = day_table(&["Wed", "Fri", "Sat", "Sun"], &[100.0, 10.0, 20.0, 30.0]);
        let b = day_table(&["Wed", "Fri", "Sat", "Sun"], &[0.0, 15.0, 20.0, 25.0]);

        let options = CompareOptions {
            weekend_only: true,
            ..CompareOptions::default()
        };
        let cmp = compare(&a, &b, &options).unwrap();

        let days: Vec<&str> = cmp.pairs.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(days, vec!["Fri", "Sat", "Sun"]);
        assert_eq!(value(&cmp, 0, TOTAL_A), Cell::Number(60.0));
        assert_eq!(value(&cmp, 0, TOTAL_B), Cell::Number(60.0));
    }

    #[test]
    fn test_compare_dates_with_weekday_labels() {
        // A relabelled with dates, B fell back to weekday names
        let a = period(5, &[("Odeon", [10.0, 10.0, 20.0, 30.0, 30.0])]);
        let b = day_table(&["Wed", "Thu", "Fri", "Sat", "Sun"], &[12.0, 10.0, 20.0, 30.0, 20.0]);

        let cmp = compare(&a, &b, &CompareOptions::default()).unwrap();

        assert_eq!(cmp.pairs.len(), 5);
        assert_eq!(cmp.table.columns[1], "Wed vs 05/06/2024");
        assert_eq!(value(&cmp, 0, "Wed vs 05/06/2024"), Cell::Number(2.0));
        assert_eq!(value(&cmp, 0, "Sun vs 09/06/2024"), Cell::Number(-10.0));
        assert_eq!(value(&cmp, 0, DIFF), Cell::Number(-8.0));
    }

    #[test]
    fn test_compare_duplicate_day_uses_first_column() {
        let a = day_table(&["Sat", "Adm Sat"], &[10.0, 99.0]);
        let b = day_table(&["Sat"], &[12.0]);

        let cmp = compare(&a, &b, &CompareOptions::default()).unwrap();
        assert_eq!(cmp.pairs, vec![("Sat".to_string(), "Sat".to_string())]);
        assert_eq!(value(&cmp, 0, "Sat"), Cell::Number(2.0));
    }
}
