//! fonscan CLI: staged TEFAS fund scans.
//!
//! Commands:
//! - `weekly`: weekly momentum scan, filtered by cumulative return
//! - `analyze`: risk metrics over a lookback window, ranked by Sortino
//! - `config init`: write the default config file
//! - `config check`: validate a config and report ladder warnings

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fonscan_core::data::Universe;
use fonscan_runner::{
    export_analysis, export_weekly, run_analysis_scan, run_weekly_scan, AnalysisScanReport,
    LogProgress, RunSummary, ScanConfig, SourceKind, WeeklyScanReport,
};

const DEFAULT_CONFIG: &str = "fonscan.toml";

#[derive(Parser)]
#[command(name = "fonscan", about = "fonscan: staged TEFAS fund scanner")]
struct Cli {
    /// Config file. Defaults to ./fonscan.toml when present, else built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Weekly momentum scan.
    Weekly {
        #[command(flatten)]
        scan: ScanArgs,

        /// Number of consecutive 7-day periods.
        #[arg(long)]
        weeks: Option<usize>,

        /// Minimum cumulative return in percent.
        #[arg(long)]
        threshold: Option<f64>,

        /// Destination name inside the output directory.
        #[arg(long, default_value = "weekly")]
        destination: String,
    },
    /// Detailed risk analysis scan.
    Analyze {
        #[command(flatten)]
        scan: ScanArgs,

        /// Destination name inside the output directory.
        #[arg(long, default_value = "analysis")]
        destination: String,
    },
    /// Config file management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Universe CSV with a code column (and optionally a name column).
    #[arg(long)]
    universe: PathBuf,

    /// Output directory.
    #[arg(long, default_value = "results")]
    out: PathBuf,

    /// Scan date (YYYY-MM-DD). Defaults to today in the configured timezone.
    #[arg(long)]
    today: Option<String>,

    /// Read prices from a local CSV directory instead of TEFAS.
    #[arg(long)]
    prices_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Validate the config and print ladder warnings.
    Check,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Weekly {
            scan,
            weeks,
            threshold,
            destination,
        } => run_weekly(cli.config.as_deref(), scan, weeks, threshold, &destination),
        Commands::Analyze { scan, destination } => {
            run_analyze(cli.config.as_deref(), scan, &destination)
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => run_config_init(&path, force),
            ConfigAction::Check => run_config_check(cli.config.as_deref()),
        },
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fonscan=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(p) => ScanConfig::from_file(p)
            .with_context(|| format!("failed to load config: {}", p.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            ScanConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("failed to load config: {DEFAULT_CONFIG}"))
        }
        None => Ok(ScanConfig::default()),
    }
}

/// Apply shared scan flags, then re-validate.
fn prepare(
    config_path: Option<&Path>,
    args: &ScanArgs,
) -> Result<(ScanConfig, NaiveDate, Universe)> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.prices_dir {
        config.source.kind = SourceKind::CsvDir;
        config.source.prices_dir = Some(dir.clone());
    }
    config.validate().context("invalid configuration")?;

    let today = match args.today.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--today must be YYYY-MM-DD, got '{s}'"))?,
        None => config.today()?,
    };

    let universe = Universe::from_csv_path(
        &args.universe,
        &config.universe.code_column,
        Some(&config.universe.name_column),
    )
    .with_context(|| format!("failed to load universe: {}", args.universe.display()))?;
    if universe.skipped() > 0 {
        warn!(skipped = universe.skipped(), "universe rows with blank or malformed codes");
    }
    if universe.is_empty() {
        bail!("universe {} has no fund codes", args.universe.display());
    }
    info!(funds = universe.len(), %today, "universe loaded");

    Ok((config, today, universe))
}

fn run_weekly(
    config_path: Option<&Path>,
    args: ScanArgs,
    weeks: Option<usize>,
    threshold: Option<f64>,
    destination: &str,
) -> Result<()> {
    let (mut config, today, universe) = prepare(config_path, &args)?;
    if let Some(w) = weeks {
        config.weekly.weeks = w;
    }
    if let Some(t) = threshold {
        config.weekly.threshold = t;
    }

    let provider = config.build_provider()?;
    let report = run_weekly_scan(&config, &universe, today, provider.as_ref(), &LogProgress)?;

    print_weekly(&report);
    let paths = export_weekly(&report, &args.out, destination, config.now()?)?;
    println!("Results saved to: {}", paths.csv.display());
    Ok(())
}

fn run_analyze(config_path: Option<&Path>, args: ScanArgs, destination: &str) -> Result<()> {
    let (config, today, universe) = prepare(config_path, &args)?;

    let provider = config.build_provider()?;
    let report = run_analysis_scan(&config, &universe, today, provider.as_ref(), &LogProgress)?;

    print_analysis(&report);
    let paths = export_analysis(&report, &args.out, destination, config.now()?)?;
    println!("Results saved to: {}", paths.csv.display());
    Ok(())
}

fn run_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let toml = ScanConfig::default().to_toml()?;
    std::fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn run_config_check(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate().context("invalid configuration")?;

    println!("Timezone: {}", config.timezone);
    println!("Source: {:?}", config.source.kind);
    println!("Stages:");
    for (i, s) in config.stages.iter().enumerate() {
        println!(
            "  {}. {:<10} concurrency={:<3} delay={}s jitter={}s",
            i + 1,
            s.name,
            s.max_concurrency,
            s.base_delay_secs,
            s.jitter_secs
        );
    }

    let warnings = config.ladder_warnings();
    if warnings.is_empty() {
        println!("Config OK");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Fetched {} funds over {} stage(s): {} ok, {} no data, {} unresolved",
        summary.submitted, summary.stages_run, summary.succeeded, summary.no_data, summary.unresolved
    );
    for (id, f) in &summary.unresolved_funds {
        println!("  unresolved {id} (last failed in {}): {}", f.stage, f.reason);
    }
}

fn print_weekly(report: &WeeklyScanReport) {
    println!();
    println!("=== Weekly scan {} ({} weeks) ===", report.today, report.weeks);
    print_summary(&report.summary);
    println!(
        "{} at or above {:.2}%, {} below, {} with an incomplete window",
        report.ranked.len(),
        report.threshold,
        report.below_threshold,
        report.insufficient.len()
    );
    println!();
    println!("{:<6} {:>9}  Name", "Code", "Total %");
    println!("{}", "-".repeat(48));
    for r in &report.ranked {
        println!("{:<6} {:>9.2}  {}", r.id.as_str(), r.cumulative_return, r.name);
    }
}

fn print_analysis(report: &AnalysisScanReport) {
    println!();
    println!("=== Analysis scan {} ({}) ===", report.today, report.range);
    print_summary(&report.summary);
    println!(
        "{} analysed, {} with too few points",
        report.ranked.len(),
        report.insufficient.len()
    );
    println!();
    println!(
        "{:<6} {:>8} {:>8} {:>9} {:>8}  Name",
        "Code", "Sortino", "Sharpe", "Return %", "Vol %"
    );
    println!("{}", "-".repeat(64));
    for r in &report.ranked {
        println!(
            "{:<6} {:>8.2} {:>8.2} {:>9.2} {:>8.2}  {}",
            r.id.as_str(), r.sortino, r.sharpe, r.return_pct, r.volatility_pct, r.name
        );
    }
}
