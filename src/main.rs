//! Cinedata - cinema admission export processor
//!
//! A CLI tool that reads spreadsheet exports of per-day cinema
//! admissions, relabels and reshapes them, totals them by cinema and
//! compares two periods.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable file, missing column, bad config, etc.)
//!   2 - A cinema dropped by at least the --fail-on-drop percentage

mod analysis;
mod cli;
mod config;
mod loader;
mod models;
mod report;
mod scanner;
mod transform;

use anyhow::{Context, Result};
use chrono::Utc;
use analysis::Comparison;
use cli::{BatchArgs, Args, Command, CompareArgs, ConvertArgs, OutputFormat, SummaryArgs};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use loader::LoadOptions;
use models::{format_number, Table};
use report::ReportMetadata;
use scanner::ScannedFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use transform::{PrepareOptions, SeriesSpec};

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);

    debug!("Cinedata v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .cinedata.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("Created {} with default settings.", config::CONFIG_FILE);
    println!("Edit it to match the column names of your exports.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so exports written to stdout stay clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected command. Returns the exit code.
fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    match args.command {
        Command::Convert(ref a) => run_convert(a, &config),
        Command::Summary(ref a) => run_summary(a, &config),
        Command::Compare(ref a) => run_compare(a, &config),
        Command::Batch(ref a) => run_batch(a, &config),
        Command::InitConfig => Ok(0),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Load an export and run the relabel/drop pipeline on it.
fn load_prepared(path: &Path, config: &Config) -> Result<Table> {
    let table = loader::load_table(path, &LoadOptions::from(config))
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(transform::prepare(table, &PrepareOptions::from(config)))
}

fn pivot_keys(config: &Config, by_version: bool) -> Vec<String> {
    let mut keys = vec![config.columns.cinema.clone(), config.columns.title.clone()];
    if by_version {
        keys.push(config.columns.version.clone());
    }
    keys
}

/// Write a rendered result and optionally draw it on the terminal.
fn emit(
    content: &str,
    output: Option<&Path>,
    table: &Table,
    show: bool,
    config: &Config,
) -> Result<()> {
    report::write_output(content, output)?;

    if let Some(path) = output {
        println!("Saved {} rows to {}", table.row_count(), path.display());
    }
    if show {
        println!("{}", report::render_terminal(table, &config.output.date_format));
    }
    Ok(())
}

fn run_convert(args: &ConvertArgs, config: &Config) -> Result<i32> {
    let mut table = load_prepared(&args.input, config)?;

    if args.pivot {
        let keys = pivot_keys(config, args.by_version);
        table = transform::pivot(&table, &keys, &SeriesSpec::from(config))
            .context("Failed to pivot by cinema and title")?;
    }

    let content = report::render(&table, config.output.format, &config.output.date_format)?;
    emit(&content, args.output.as_deref(), &table, args.show, config)?;
    Ok(0)
}

fn run_summary(args: &SummaryArgs, config: &Config) -> Result<i32> {
    let table = load_prepared(&args.input, config)?;
    let options = analysis::AggregateOptions::from(config);
    let aggregated = analysis::aggregate_by_cinema(&table, &options)
        .context("Failed to total admissions by cinema")?;

    let content = match config.output.format {
        OutputFormat::Markdown => {
            let mut highlights: Vec<(String, String)> =
                analysis::top_cinemas(&aggregated, &options, 3)
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, total))| {
                        (
                            format!("#{} cinema", i + 1),
                            format!("{} ({})", name, format_number(total)),
                        )
                    })
                    .collect();
            highlights.extend(
                analysis::day_shares(&aggregated, &options)
                    .into_iter()
                    .map(|(day, share)| (format!("Share {}", day), format!("{:.1}%", share))),
            );

            let metadata = ReportMetadata {
                title: "Admissions by Cinema".to_string(),
                sources: vec![args.input.display().to_string()],
                generated_at: Utc::now(),
                rows_read: table.row_count(),
            };
            report::generate_markdown_report(
                &metadata,
                &aggregated,
                &highlights,
                &config.output.date_format,
            )
        }
        format => report::render(&aggregated, format, &config.output.date_format)?,
    };

    emit(&content, args.output.as_deref(), &aggregated, args.show, config)?;
    Ok(0)
}

fn run_compare(args: &CompareArgs, config: &Config) -> Result<i32> {
    let first = load_prepared(&args.first, config)?;
    let second = load_prepared(&args.second, config)?;

    let options = analysis::CompareOptions {
        aggregate: analysis::AggregateOptions::from(config),
        weekend_only: args.weekend_only,
    };
    let mut comparison = analysis::compare(&first, &second, &options).with_context(|| {
        format!(
            "Failed to compare {} with {}",
            args.first.display(),
            args.second.display()
        )
    })?;
    info!(
        "Compared {} aligned days{}",
        comparison.pairs.len(),
        if args.weekend_only { " (weekend only)" } else { "" }
    );

    let gate = filter_comparison(&mut comparison, args);

    let content = match config.output.format {
        OutputFormat::Markdown => {
            let highlights: Vec<(String, String)> = comparison
                .pairs
                .iter()
                .map(|(a, b)| (format!("{} compared with", b), a.clone()))
                .collect();
            let metadata = ReportMetadata {
                title: if args.weekend_only {
                    "Weekend Comparison".to_string()
                } else {
                    "Period Comparison".to_string()
                },
                sources: vec![
                    args.first.display().to_string(),
                    args.second.display().to_string(),
                ],
                generated_at: Utc::now(),
                rows_read: first.row_count() + second.row_count(),
            };
            report::generate_markdown_report(
                &metadata,
                &comparison.table,
                &highlights,
                &config.output.date_format,
            )
        }
        format => report::render(&comparison.table, format, &config.output.date_format)?,
    };

    emit(
        &content,
        args.output.as_deref(),
        &comparison.table,
        args.show,
        config,
    )?;

    Ok(gate.map_or(0, |gate| {
        gate.report();
        gate.exit_code()
    }))
}

/// Outcome of the `--fail-on-drop` check.
#[derive(Debug, PartialEq)]
struct DropGate {
    threshold: f64,
    drops: Vec<(String, f64)>,
}

impl DropGate {
    fn exit_code(&self) -> i32 {
        if self.drops.is_empty() {
            0
        } else {
            2
        }
    }

    fn report(&self) {
        if self.drops.is_empty() {
            return;
        }
        for (cinema, change) in &self.drops {
            eprintln!("{}: {:.1}%", cinema, change);
        }
        eprintln!(
            "{} cinema(s) dropped by {}% or more. Failing (exit code 2).",
            self.drops.len(),
            format_number(self.threshold)
        );
    }
}

/// Apply `--min-diff` and evaluate `--fail-on-drop`.
///
/// Drops are measured over every cinema, including those `--min-diff` hides.
fn filter_comparison(comparison: &mut Comparison, args: &CompareArgs) -> Option<DropGate> {
    let gate = args.fail_on_drop.map(|threshold| DropGate {
        threshold,
        drops: comparison.drops_at_least(threshold),
    });

    if let Some(min) = args.min_diff {
        comparison.retain_min_diff(min);
    }
    gate
}

/// Output path of every export. Exports whose output path is already taken
/// by an earlier export (same stem, or names differing only in case) are
/// returned separately.
fn batch_targets<'a>(
    files: &'a [ScannedFile],
    out_dir: &Path,
    format: OutputFormat,
) -> (Vec<(&'a ScannedFile, PathBuf)>, Vec<&'a ScannedFile>) {
    let mut taken = HashSet::new();
    let mut targets = Vec::with_capacity(files.len());
    let mut clashes = Vec::new();

    for file in files {
        let target = out_dir
            .join(&file.relative)
            .with_extension(format.extension());
        if taken.insert(target.to_string_lossy().to_lowercase()) {
            targets.push((file, target));
        } else {
            clashes.push(file);
        }
    }

    (targets, clashes)
}

fn run_batch(args: &BatchArgs, config: &Config) -> Result<i32> {
    let scan_config = scanner::ScanConfig::from(&config.scanner);
    let files = scanner::ExportScanner::new(args.dir.clone(), scan_config).scan()?;

    if files.is_empty() {
        println!("No exports found in {}", args.dir.display());
        return Ok(0);
    }
    info!("Found {} exports in {}", files.len(), args.dir.display());

    let format = config.output.format;
    let (targets, clashes) = batch_targets(&files, &args.out_dir, format);
    let mut failed = clashes.len();

    for file in &clashes {
        warn!(
            "Skipping {}: another export already converts to the same output file",
            file.path.display()
        );
    }

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for (file, target) in &targets {
        pb.set_message(file.relative.display().to_string());
        debug!("Converting {} ({} bytes)", file.path.display(), file.size);

        let result = load_prepared(&file.path, config).and_then(|table| {
            let table = if args.pivot {
                transform::pivot(&table, &pivot_keys(config, false), &SeriesSpec::from(config))?
            } else {
                table
            };
            let content = report::render(&table, format, &config.output.date_format)?;
            report::write_output(&content, Some(target.as_path()))
        });

        match result {
            Ok(()) => debug!("Converted {} -> {}", file.path.display(), target.display()),
            Err(e) => {
                failed += 1;
                pb.suspend(|| warn!("Skipping {}: {:#}", file.path.display(), e));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("done");
    println!(
        "Converted {} of {} exports into {}",
        files.len() - failed,
        files.len(),
        args.out_dir.display()
    );

    Ok(if failed > 0 { 1 } else { 0 })
}
