//! Pivoting admissions by key columns (cinema and title by default).

use super::SeriesSpec;
use crate::models::{Cell, Table, TableError};
use std::collections::BTreeMap;
use tracing::debug;

/// Sum every series column per distinct combination of `keys`.
///
/// Columns that are neither keys nor series are dropped, so rows that
/// differ only by version or language merge into one. Rows come out
/// sorted by key, series columns in chronological order.
pub fn pivot(table: &Table, keys: &[String], spec: &SeriesSpec) -> Result<Table, TableError> {
    let key_indices = keys
        .iter()
        .map(|k| table.require_column(k))
        .collect::<Result<Vec<_>, _>>()?;

    let series: Vec<_> = spec
        .columns(table)
        .into_iter()
        .filter(|s| !key_indices.contains(&s.index))
        .collect();

    let mut groups: BTreeMap<Vec<String>, Vec<f64>> = BTreeMap::new();
    for row in &table.rows {
        let key: Vec<String> = key_indices
            .iter()
            .map(|&i| row[i].render(&spec.date_format).trim().to_string())
            .collect();

        let sums = groups
            .entry(key)
            .or_insert_with(|| vec![0.0; series.len()]);
        for (sum, column) in sums.iter_mut().zip(&series) {
            *sum += row[column.index].as_number().unwrap_or(0.0);
        }
    }

    let mut columns: Vec<String> = keys.to_vec();
    columns.extend(series.iter().map(|s| s.name.clone()));

    let mut pivoted = Table::new(columns);
    for (key, sums) in groups {
        let mut row: Vec<Cell> = key.iter().map(|k| Cell::from(k.as_str())).collect();
        row.extend(sums.into_iter().map(Cell::Number));
        pivoted.push_row(row);
    }

    debug!(
        "Pivoted {} rows into {} groups by {:?}",
        table.row_count(),
        pivoted.row_count(),
        keys
    );
    Ok(pivoted)
}
