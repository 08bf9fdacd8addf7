//! rusty-greeks CLI - enrich and clean option-chain snapshot trees
//!
//! ## Example Usage
//!
//! ```bash
//! # Fill in implied volatility and Greeks for every file
//! rusty-greeks enrich dataset
//!
//! # Repair gaps and drop unsalvageable directories, without deleting anything
//! rusty-greeks clean dataset --dry-run
//!
//! # Both, back to back, with a JSON report
//! rusty-greeks process dataset --json
//!
//! # At-the-money Greek totals per file
//! rusty-greeks summary dataset
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rusty_greeks::config::Config;
use rusty_greeks::pipeline::{Orchestrator, RetentionReport, RunReport};
use rusty_greeks::report::{summarize_tree, AtmSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;

/// rusty-greeks: option-chain analytics and cleaning
#[derive(Parser)]
#[command(name = "rusty-greeks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Implied volatility, Greeks and gap repair for option-chain snapshots", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (overrides the configuration file)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute implied volatility and Greeks for every file
    Enrich {
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Repair missing values and remove unsalvageable directories
    Clean {
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Report directories that would be removed without removing them
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Enrich, then clean
    Process {
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Sum the Greeks around the money for every file
    Summary {
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rusty-greeks").join("config.toml"))
}

/// Explicit path must load; the default location is optional
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => match default_config_path() {
            Some(default) if default.exists() => Config::load(&default)
                .with_context(|| format!("failed to load config {}", default.display())),
            _ => Ok(Config::default()),
        },
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }

    if cli.verbose {
        println!(
            "{} v{}",
            "rusty-greeks".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "Workers: {}",
            config.pipeline.workers.to_string().dimmed()
        );
    }

    match cli.command {
        Commands::Enrich { root, json } => {
            let root = root.unwrap_or_else(|| config.pipeline.root.clone());
            let report = Orchestrator::new(config)?.enrich(&root)?;
            emit(&report, json, print_run)
        }
        Commands::Clean { root, dry_run, json } => {
            let root = root.unwrap_or_else(|| config.pipeline.root.clone());
            config.retention.dry_run |= dry_run;
            let report = Orchestrator::new(config)?.clean(&root)?;
            emit(&report, json, print_run)
        }
        Commands::Process { root, dry_run, json } => {
            let root = root.unwrap_or_else(|| config.pipeline.root.clone());
            config.retention.dry_run |= dry_run;
            let report = Orchestrator::new(config)?.process(&root)?;
            emit(&report, json, |report| {
                print_run(&report.enrich);
                println!();
                print_run(&report.clean);
            })
        }
        Commands::Summary { root, json } => {
            let root = root.unwrap_or_else(|| config.pipeline.root.clone());
            let summaries = summarize_tree(&root)?;
            emit(&summaries, json, |summaries| print_summaries(summaries))
        }
    }
}

fn emit<T: Serialize>(value: &T, json: bool, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

/// What happened to a directory in the removal set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    WouldRemove,
    Removed,
    Kept,
}

impl Removal {
    fn label(self) -> &'static str {
        match self {
            Removal::WouldRemove => "Would remove",
            Removal::Removed => "Removed",
            Removal::Kept => "Kept run root",
        }
    }
}

/// Directories to list under a run summary. Failures are listed separately.
fn removal_lines(retention: &RetentionReport) -> Vec<(Removal, &Path)> {
    let mut lines = Vec::new();
    if retention.dry_run {
        lines.extend(
            retention
                .removal_set
                .keys()
                .filter(|directory| !retention.skipped.contains(directory))
                .map(|directory| (Removal::WouldRemove, directory.as_path())),
        );
    }
    lines.extend(retention.removed.iter().map(|d| (Removal::Removed, d.as_path())));
    lines.extend(retention.skipped.iter().map(|d| (Removal::Kept, d.as_path())));
    lines
}

fn print_run(report: &RunReport) {
    let title = format!("{:?} Summary", report.kind);
    println!("{}", title.green().bold());
    println!("{}", "=".repeat(title.len()).green());
    println!("  {} {}", "Root:".bold(), report.root.display());
    println!("  {} {}", "Files:".bold(), report.files_enqueued);
    println!("  {} {}", "Workers:".bold(), report.workers);
    println!("  {} {}", "Written:".bold(), report.stats.files_written);

    if report.load_failures > 0 {
        println!(
            "  {} {}",
            "Load failures:".bold(),
            report.load_failures.to_string().yellow()
        );
    }
    if report.stats.write_failures > 0 {
        println!(
            "  {} {}",
            "Write failures:".bold(),
            report.stats.write_failures.to_string().red()
        );
    }
    if report.stats.files_rejected > 0 {
        println!(
            "  {} {}",
            "Rejected:".bold(),
            report.stats.files_rejected.to_string().yellow()
        );
    }
    if report.stats.rows_without_underlying > 0 {
        println!(
            "  {} {}",
            "Rows without underlying:".bold(),
            report.stats.rows_without_underlying
        );
    }
    if report.stats.rows_repaired > 0 {
        println!("  {} {}", "Rows repaired:".bold(), report.stats.rows_repaired);
    }

    if let Some(retention) = &report.retention {
        println!(
            "  {} {}",
            "Deletion signals:".bold(),
            retention.signals_received
        );
        for (outcome, directory) in removal_lines(retention) {
            match outcome {
                Removal::Kept => println!("  {} {}", outcome.label().yellow(), directory.display()),
                _ => println!("  {} {}", outcome.label().red(), directory.display()),
            }
        }
        for failure in &retention.failures {
            println!(
                "  {} {}: {}",
                "Failed to remove".red().bold(),
                failure.directory.display(),
                failure.error
            );
        }
    }

    println!(
        "  {} {} ms",
        "Elapsed:".bold(),
        report.elapsed_ms.to_string().dimmed()
    );
}

fn print_summaries(summaries: &[AtmSummary]) {
    println!("{}", "ATM Greek Totals".green().bold());
    println!("{}", "================".green());
    for summary in summaries {
        let t = &summary.totals;
        println!(
            "{} {} @ {:.2}  gamma {:.6}/{:.6}  delta {:.4}/{:.4}  theta {:.2}/{:.2}  vega {:.2}/{:.2}",
            summary.path.display().to_string().cyan(),
            summary.anchor_strike,
            summary.underlying,
            t.gamma_call,
            t.gamma_put,
            t.delta_call,
            t.delta_put,
            t.theta_call,
            t.theta_put,
            t.vega_call,
            t.vega_put
        );
    }
    if summaries.is_empty() {
        println!("{}", "No files with an at-the-money strike".yellow());
    }
}
