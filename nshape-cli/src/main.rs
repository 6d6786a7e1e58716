//! nshape CLI — scan, replay and parameter commands.
//!
//! Commands:
//! - `scan` — evaluate every stock on one date (defaults to the latest bar)
//! - `replay` — evaluate every trading day in a date range with cooldown carried forward
//! - `params` — print the default configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nshape_core::MemoryCooldownStore;
use nshape_runner::{load_universe_dir, write_report, ScanConfig, ScanReport, Scanner};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "nshape",
    about = "nshape — N-shaped retracement signals for daily equity bars"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every stock on a single date.
    Scan {
        /// Directory of `<stock_id>.csv` files.
        #[arg(long)]
        data_dir: PathBuf,

        /// Evaluation date (YYYY-MM-DD). Defaults to the latest bar in the data.
        #[arg(long)]
        date: Option<String>,

        /// Path to a TOML config file. Defaults to built-in parameters.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the report here (.csv for signals only, anything else for JSON).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Evaluate every trading day in [start, end].
    Replay {
        /// Directory of `<stock_id>.csv` files.
        #[arg(long)]
        data_dir: PathBuf,

        /// First evaluation date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Last evaluation date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Path to a TOML config file. Defaults to built-in parameters.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the report here (.csv for signals only, anything else for JSON).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the default configuration as TOML.
    Params,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            data_dir,
            date,
            config,
            out,
        } => run_scan(&data_dir, date.as_deref(), config.as_deref(), out.as_deref()),
        Commands::Replay {
            data_dir,
            start,
            end,
            config,
            out,
        } => run_replay(&data_dir, &start, &end, config.as_deref(), out.as_deref()),
        Commands::Params => {
            print!("{}", ScanConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn run_scan(
    data_dir: &Path,
    date: Option<&str>,
    config_path: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let universe = load_universe_dir(data_dir)?;
    if universe.is_empty() {
        bail!("no loadable CSV files in {}", data_dir.display());
    }

    let date = match date {
        Some(s) => parse_date(s)?,
        None => universe
            .last_date()
            .context("universe holds no bars")?,
    };

    let scanner = Scanner::new(&config)?;
    info!("Using {} worker threads", scanner.threads());
    let report = scanner.scan_date(&universe, date, &MemoryCooldownStore::new());
    finish(&report, out)
}

fn run_replay(
    data_dir: &Path,
    start: &str,
    end: &str,
    config_path: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let universe = load_universe_dir(data_dir)?;
    if universe.is_empty() {
        bail!("no loadable CSV files in {}", data_dir.display());
    }

    let scanner = Scanner::new(&config)?;
    info!("Using {} worker threads", scanner.threads());
    let store = MemoryCooldownStore::new();
    let report = scanner.replay(&universe, start, end, &store)?;
    info!("{} stocks signalled at least once", store.len());
    finish(&report, out)
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(p) => ScanConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(ScanConfig::default()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn finish(report: &ScanReport, out: Option<&Path>) -> Result<()> {
    print_summary(report);
    if let Some(path) = out {
        write_report(report, path)?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!();
    println!("=== Scan {} .. {} ===", report.start, report.end);
    println!("Params hash:  {}", report.params_hash);
    println!("Stocks:       {}", report.stocks);
    println!("Evaluations:  {}", report.evaluations);
    for (label, n) in &report.outcomes {
        println!("  {label:<22} {n}");
    }
    println!("Signals:      {}", report.signal_count());

    if report.signals.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<10} {:<10} {:>5} {:>7} {:>7} {:>4}  {}",
        "Stock", "Date", "Score", "Rise", "Retr", "BSC", "Triggers"
    );
    println!("{}", "-".repeat(72));
    for s in &report.signals {
        let p = s.pattern();
        println!(
            "{:<10} {:<10} {:>5} {:>6.1}% {:>6.1}% {:>4}  {}",
            s.stock_id(),
            s.signal_date(),
            s.score().total,
            p.rise_pct * 100.0,
            p.retr_pct * 100.0,
            s.bars_since_c(),
            s.triggers().fired().join(",")
        );
    }
}
