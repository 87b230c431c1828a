//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cinedata.toml` files.

use crate::cli::{LabelMode, OutputFormat};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".cinedata.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Column naming in the exports.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Input reading settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Batch scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// Names of the identifying columns in an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_cinema")]
    pub cinema: String,

    #[serde(default = "default_title")]
    pub title: String,

    /// Version/language column (merged away by pivoting).
    #[serde(default = "default_version")]
    pub version: String,

    /// Column holding the first day of the reporting week.
    #[serde(default = "default_start_date")]
    pub start_date: String,

    /// Prefix of the per-day admission columns (`Adm Wed`, `Adm Thu`, ...).
    #[serde(default = "default_day_prefix")]
    pub day_prefix: String,

    /// Columns removed after renaming.
    #[serde(default = "default_drop")]
    pub drop: Vec<String>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            cinema: default_cinema(),
            title: default_title(),
            version: default_version(),
            start_date: default_start_date(),
            day_prefix: default_day_prefix(),
            drop: default_drop(),
        }
    }
}

fn default_cinema() -> String {
    "Cinema".to_string()
}

fn default_title() -> String {
    "Title".to_string()
}

fn default_version() -> String {
    "LV".to_string()
}

fn default_start_date() -> String {
    "Start Date".to_string()
}

fn default_day_prefix() -> String {
    "Adm ".to_string()
}

fn default_drop() -> Vec<String> {
    vec!["Start Date".to_string(), "End Date".to_string()]
}

/// Input reading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Worksheet to read; the first sheet when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,

    /// Field delimiter for CSV exports.
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            csv_delimiter: default_csv_delimiter(),
        }
    }
}

fn default_csv_delimiter() -> char {
    ','
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// chrono format for date-labelled columns.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub labels: LabelMode,

    /// Label of the synthetic total row and column.
    #[serde(default = "default_total_label")]
    pub total_label: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            format: OutputFormat::default(),
            labels: LabelMode::default(),
            total_label: default_total_label(),
        }
    }
}

fn default_date_format() -> String {
    crate::models::DEFAULT_DATE_FORMAT.to_string()
}

fn default_total_label() -> String {
    "Total".to_string()
}

/// Batch scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File extensions treated as exports.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File name prefixes to skip (office lock files, hidden files).
    #[serde(default = "default_exclude_prefixes")]
    pub exclude_prefixes: Vec<String>,

    /// Maximum files converted in one batch.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_prefixes: default_exclude_prefixes(),
            max_files: default_max_files(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["xlsx", "xls", "xlsm", "ods", "csv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exclude_prefixes() -> Vec<String> {
    vec!["~$".to_string(), ".".to_string()]
}

fn default_max_files() -> usize {
    500
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only where they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        let opts = args.command.shaping();

        if let Some(format) = opts.and_then(|o| o.format) {
            self.output.format = format;
        }
        if let Some(labels) = opts.and_then(|o| o.labels) {
            self.output.labels = labels;
        }
        if let Some(sheet) = opts.and_then(|o| o.sheet.clone()) {
            self.input.sheet = Some(sheet);
        }
        if let Some(ref date_format) = args.date_format {
            self.output.date_format = date_format.clone();
        }
        if let Some(ref prefix) = args.day_prefix {
            self.columns.day_prefix = prefix.clone();
        }
    }

    /// Check settings that only fail later in the pipeline.
    ///
    /// Date-labelled columns are read back with the same format they were
    /// written with, so the format must carry a full date (day, month, year).
    pub fn validate(&self) -> Result<()> {
        check_date_format(&self.output.date_format)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn check_date_format(format: &str) -> Result<()> {
    let sample = NaiveDate::from_ymd_opt(2024, 6, 5).context("invalid sample date")?;

    let mut rendered = String::new();
    write!(rendered, "{}", sample.format(format))
        .map_err(|_| anyhow::anyhow!("Invalid date format: {:?}", format))?;

    match NaiveDate::parse_from_str(&rendered, format) {
        Ok(parsed) if parsed == sample => Ok(()),
        _ => anyhow::bail!(
            "Date format {:?} cannot be read back (it needs day, month and year)",
            format
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.columns.cinema, "Cinema");
        assert_eq!(config.columns.day_prefix, "Adm ");
        assert_eq!(config.columns.drop, vec!["Start Date", "End Date"]);
        assert_eq!(config.output.date_format, "%d/%m/%Y");
        assert!(config.scanner.extensions.contains(&"xlsx".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[columns]
cinema = "Sala"
day_prefix = "Ingressi "
drop = ["Start Date"]

[input]
sheet = "Export"
csv_delimiter = ";"

[output]
format = "markdown"
labels = "weekdays"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.columns.cinema, "Sala");
        assert_eq!(config.columns.title, "Title");
        assert_eq!(config.columns.day_prefix, "Ingressi ");
        assert_eq!(config.columns.drop, vec!["Start Date"]);
        assert_eq!(config.input.sheet.as_deref(), Some("Export"));
        assert_eq!(config.input.csv_delimiter, ';');
        assert_eq!(config.output.format, OutputFormat::Markdown);
        assert_eq!(config.output.labels, LabelMode::Weekdays);
        assert_eq!(config.output.total_label, "Total");
    }

    #[test]
    fn test_merge_with_args() {
        use clap::Parser;

        let args = crate::cli::Args::try_parse_from([
            "cinedata",
            "convert",
            "in.csv",
            "--format",
            "json",
            "--day-prefix",
            "Ingressi ",
        ])
        .unwrap();

        let mut config = Config::default();
        config.output.labels = LabelMode::Weekdays;
        config.merge_with_args(&args);

        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.columns.day_prefix, "Ingressi ");
        // Not given on the command line: file value survives
        assert_eq!(config.output.labels, LabelMode::Weekdays);
        assert_eq!(config.output.date_format, "%d/%m/%Y");
    }

    #[test]
    fn test_validate_date_format() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.output.date_format = "%Y-%m-%d".to_string();
        assert!(config.validate().is_ok());

        config.output.date_format = "%d/%m".to_string();
        assert!(config.validate().is_err());

        config.output.date_format = "%Q".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[columns]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[scanner]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.columns.start_date, "Start Date");
    }
}
