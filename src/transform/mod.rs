//! Table reshaping: dropping helper columns, relabelling day columns
//! and pivoting by cinema and title.

pub mod pivot;
pub mod rename;

pub use pivot::*;
pub use rename::*;

use crate::cli::LabelMode;
use crate::config::Config;
use crate::models::{SeriesColumn, Table, TableError};
use tracing::{debug, warn};

/// How series (per-day) columns are recognised.
#[derive(Debug, Clone)]
pub struct SeriesSpec {
    /// Prefix of raw day columns, e.g. `"Adm "`.
    pub prefix: String,
    /// chrono format of date-labelled columns.
    pub date_format: String,
}

impl Default for SeriesSpec {
    fn default() -> Self {
        Self {
            prefix: "Adm ".to_string(),
            date_format: crate::models::DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl SeriesSpec {
    /// Series columns of `table`, ordered chronologically.
    pub fn columns(&self, table: &Table) -> Vec<SeriesColumn> {
        table.series_columns(&self.prefix, &self.date_format)
    }
}

impl From<&Config> for SeriesSpec {
    fn from(config: &Config) -> Self {
        Self {
            prefix: config.columns.day_prefix.clone(),
            date_format: config.output.date_format.clone(),
        }
    }
}

/// Settings for the load-time pipeline.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub labels: LabelMode,
    pub start_column: String,
    pub drop: Vec<String>,
    pub series: SeriesSpec,
}

impl From<&Config> for PrepareOptions {
    fn from(config: &Config) -> Self {
        Self {
            labels: config.output.labels,
            start_column: config.columns.start_date.clone(),
            drop: config.columns.drop.clone(),
            series: SeriesSpec::from(config),
        }
    }
}

/// Remove every named column that exists; unknown names are ignored.
///
/// Returns the number of columns removed.
pub fn drop_columns(table: &mut Table, names: &[String]) -> usize {
    let keep: Vec<bool> = table
        .columns
        .iter()
        .map(|c| !names.iter().any(|n| n == c))
        .collect();

    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return 0;
    }

    for (name, _) in table.columns.iter().zip(&keep).filter(|(_, k)| !**k) {
        debug!("Dropping column '{}'", name);
    }

    table.columns = retain_by_mask(std::mem::take(&mut table.columns), &keep);
    for row in table.rows.iter_mut() {
        *row = retain_by_mask(std::mem::take(row), &keep);
    }

    removed
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}

/// Relabel day columns and drop helper columns.
///
/// Date labels need a start date; when none can be found the table is
/// labelled with weekday names instead.
pub fn prepare(mut table: Table, options: &PrepareOptions) -> Table {
    match options.labels {
        LabelMode::Dates => {
            match rename_to_dates(&mut table, &options.start_column, &options.series) {
                Ok(start) => debug!("Labelled day columns from {}", start),
                Err(TableError::NoStartDate(col)) => {
                    warn!(
                        "No start date in column '{}', labelling days by weekday instead",
                        col
                    );
                    rename_to_weekdays(&mut table, &options.series.prefix);
                }
                Err(e) => {
                    warn!("Could not label day columns with dates: {}", e);
                    rename_to_weekdays(&mut table, &options.series.prefix);
                }
            }
        }
        LabelMode::Weekdays => {
            rename_to_weekdays(&mut table, &options.series.prefix);
        }
    }

    drop_columns(&mut table, &options.drop);
    table
}
