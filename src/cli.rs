//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cinedata - reshape and compare cinema admission exports
///
/// Reads spreadsheet exports (xlsx, xls, ods, csv) of per-day admissions,
/// relabels the day columns with dates, totals by cinema and compares
/// two periods.
///
/// Examples:
///   cinedata convert week23.xlsx -o week23.csv
///   cinedata convert week23.xlsx --pivot --format markdown
///   cinedata summary week23.xlsx --show
///   cinedata compare week22.xlsx week23.xlsx --weekend-only
///   cinedata batch ./exports --out-dir ./converted
///   cinedata init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cinedata.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// chrono format for date-labelled columns (default: %d/%m/%Y)
    #[arg(long, value_name = "FMT", global = true, env = "CINEDATA_DATE_FORMAT")]
    pub date_format: Option<String>,

    /// Prefix of the per-day admission columns (default: "Adm ")
    #[arg(long, value_name = "PREFIX", global = true)]
    pub day_prefix: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Relabel day columns and drop helper columns, optionally pivoting by cinema and title
    Convert(ConvertArgs),

    /// Total admissions by cinema, with a Total row
    Summary(SummaryArgs),

    /// Compare two periods cinema by cinema
    Compare(CompareArgs),

    /// Convert every export found in a directory
    Batch(BatchArgs),

    /// Generate a default .cinedata.toml configuration file
    InitConfig,
}

/// Options shared by every command that shapes a table.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ShapeOptions {
    /// Output format (csv, json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Label day columns with dates or with weekday names
    #[arg(long, value_name = "MODE")]
    pub labels: Option<LabelMode>,

    /// Worksheet to read (default: first sheet)
    #[arg(long, value_name = "NAME")]
    pub sheet: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Export file to convert
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub shape: ShapeOptions,

    /// Sum admissions per cinema and title
    #[arg(long)]
    pub pivot: bool,

    /// Keep versions (the LV column) apart when pivoting
    #[arg(long, requires = "pivot")]
    pub by_version: bool,

    /// Also print the result as a table on the terminal
    #[arg(long)]
    pub show: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Export file to summarise
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub shape: ShapeOptions,

    /// Also print the result as a table on the terminal
    #[arg(long)]
    pub show: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CompareArgs {
    /// Export of the earlier period
    #[arg(value_name = "A")]
    pub first: PathBuf,

    /// Export of the later period
    #[arg(value_name = "B")]
    pub second: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub shape: ShapeOptions,

    /// Only compare Friday, Saturday and Sunday
    #[arg(long)]
    pub weekend_only: bool,

    /// Hide cinemas whose absolute difference is below this value
    #[arg(long, value_name = "N")]
    pub min_diff: Option<f64>,

    /// Exit with code 2 if any cinema dropped by at least this percentage
    ///
    /// Useful for scheduled checks.
    #[arg(long, value_name = "PCT")]
    pub fail_on_drop: Option<f64>,

    /// Also print the result as a table on the terminal
    #[arg(long)]
    pub show: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct BatchArgs {
    /// Directory containing exports
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Directory converted files are written to
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub shape: ShapeOptions,

    /// Sum admissions per cinema and title
    #[arg(long)]
    pub pivot: bool,
}

/// Output format for results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// JSON array of row objects
    Json,
    /// Markdown pipe table
    Markdown,
}

impl OutputFormat {
    /// File extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

/// How day columns are labelled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    /// Calendar dates counted from the start date (default)
    #[default]
    Dates,
    /// Weekday names (Wed, Thu, ...)
    Weekdays,
}

impl Command {
    /// Shaping options of the command, if it has any.
    pub fn shaping(&self) -> Option<&ShapeOptions> {
        match self {
            Command::Convert(a) => Some(&a.shape),
            Command::Summary(a) => Some(&a.shape),
            Command::Compare(a) => Some(&a.shape),
            Command::Batch(a) => Some(&a.shape),
            Command::InitConfig => None,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Convert(a) => check_file(&a.input),
            Command::Summary(a) => check_file(&a.input),
            Command::Compare(a) => {
                check_file(&a.first)?;
                check_file(&a.second)?;
                if let Some(min) = a.min_diff {
                    if min < 0.0 {
                        return Err("--min-diff must not be negative".to_string());
                    }
                }
                if let Some(pct) = a.fail_on_drop {
                    if !(0.0..=100.0).contains(&pct) {
                        return Err("--fail-on-drop must be between 0 and 100".to_string());
                    }
                }
                Ok(())
            }
            Command::Batch(a) => {
                if !a.dir.is_dir() {
                    return Err(format!("Not a directory: {}", a.dir.display()));
                }
                if a.out_dir.exists() && !a.out_dir.is_dir() {
                    return Err(format!(
                        "Output path is not a directory: {}",
                        a.out_dir.display()
                    ));
                }
                if resolve(&a.out_dir).starts_with(resolve(&a.dir)) {
                    return Err(format!(
                        "Output directory {} must not be inside the input directory {}",
                        a.out_dir.display(),
                        a.dir.display()
                    ));
                }
                Ok(())
            }
            Command::InitConfig => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn check_file(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("Input file does not exist: {}", path.display()));
    }
    if !path.is_file() {
        return Err(format!("Input path is not a file: {}", path.display()));
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: the deepest existing
/// ancestor is canonicalized and the remaining components appended.
fn resolve(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            }
            _ => return path.to_path_buf(),
        }
    }
}
