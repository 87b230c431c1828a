//! Admission totals by cinema.
//!
//! This module sums the per-day series of an export per cinema and
//! appends a synthetic total row.

use crate::config::Config;
use crate::models::{Cell, Table, TableError};
use crate::transform::SeriesSpec;
use std::collections::BTreeMap;
use tracing::debug;

/// Settings for grouping by cinema.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Column identifying the cinema.
    pub cinema_column: String,
    /// Label of the synthetic total row and column.
    pub total_label: String,
    pub series: SeriesSpec,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            cinema_column: "Cinema".to_string(),
            total_label: "Total".to_string(),
            series: SeriesSpec::default(),
        }
    }
}

impl From<&Config> for AggregateOptions {
    fn from(config: &Config) -> Self {
        Self {
            cinema_column: config.columns.cinema.clone(),
            total_label: config.output.total_label.clone(),
            series: SeriesSpec::from(config),
        }
    }
}

/// Sum the series columns per cinema.
///
/// The result has one row per cinema (sorted by name), a total column
/// holding each row's sum, and a final total row. Existing total rows in
/// the input are ignored so an aggregated table can be aggregated again.
pub fn aggregate_by_cinema(table: &Table, options: &AggregateOptions) -> Result<Table, TableError> {
    let cinema = table.require_column(&options.cinema_column)?;
    let series = options.series.columns(table);

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in &table.rows {
        let name = row[cinema].render(&options.series.date_format).trim().to_string();
        if name == options.total_label {
            continue;
        }

        let sums = groups
            .entry(name)
            .or_insert_with(|| vec![0.0; series.len()]);
        for (sum, column) in sums.iter_mut().zip(&series) {
            *sum += row[column.index].as_number().unwrap_or(0.0);
        }
    }

    let mut columns = vec![options.cinema_column.clone()];
    columns.extend(series.iter().map(|s| s.name.clone()));
    columns.push(options.total_label.clone());

    let mut totals = vec![0.0; series.len()];
    let mut aggregated = Table::new(columns);

    for (name, sums) in groups {
        for (total, value) in totals.iter_mut().zip(&sums) {
            *total += value;
        }
        aggregated.push_row(summed_row(Cell::from(name.as_str()), &sums));
    }
    aggregated.push_row(summed_row(
        Cell::from(options.total_label.as_str()),
        &totals,
    ));

    debug!(
        "Aggregated {} rows into {} cinemas",
        table.row_count(),
        aggregated.row_count() - 1
    );
    Ok(aggregated)
}

/// Key cell, one cell per value, then the row sum.
fn summed_row(key: Cell, values: &[f64]) -> Vec<Cell> {
    let mut row = Vec::with_capacity(values.len() + 2);
    row.push(key);
    row.extend(values.iter().copied().map(Cell::Number));
    row.push(Cell::Number(values.iter().sum()));
    row
}

/// The `n` cinemas with the most admissions in an aggregated table.
pub fn top_cinemas(aggregated: &Table, options: &AggregateOptions, n: usize) -> Vec<(String, f64)> {
    let (Some(cinema), Some(total)) = (
        aggregated.column_index(&options.cinema_column),
        aggregated.column_index(&options.total_label),
    ) else {
        return Vec::new();
    };

    let mut ranked: Vec<(String, f64)> = aggregated
        .rows
        .iter()
        .map(|row| {
            (
                row[cinema].to_string(),
                row[total].as_number().unwrap_or(0.0),
            )
        })
        .filter(|(name, _)| *name != options.total_label)
        .collect();

    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(n);
    ranked
}

/// Percentage of the grand total falling on each series column.
pub fn day_shares(aggregated: &Table, options: &AggregateOptions) -> Vec<(String, f64)> {
    let Some(last) = aggregated.rows.last() else {
        return Vec::new();
    };
    let grand = aggregated
        .column_index(&options.total_label)
        .and_then(|i| last[i].as_number())
        .unwrap_or(0.0);
    if grand == 0.0 {
        return Vec::new();
    }

    options
        .series
        .columns(aggregated)
        .into_iter()
        .map(|s| {
            let value = last[s.index].as_number().unwrap_or(0.0);
            (s.name, value / grand * 100.0)
        })
        .collect()
}
