mod commands;
mod input;
mod output;
mod publish;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::attribution::{ExposureArgs, PbaArgs, RbaArgs};
use commands::performance::{RiskAdjustedArgs, RollingArgs, TrailingArgs};
use commands::ranking::{PeerRankArgs, PersistenceArgs, QualityArgs, ScreenArgs};
use commands::{Context, Report};
use fund_analytics_core::AnalyticsConfig;

/// Fund performance analytics and peer rankings
#[derive(Parser)]
#[command(
    name = "fund-analytics",
    version,
    about = "Fund performance analytics and peer rankings",
    long_about = "A CLI for periodic investment-performance reports with decimal precision. \
                  Supports trailing and risk-adjusted returns, rolling statistics, peer \
                  percentile rankings, quartile persistence, screening, performance \
                  quality, return- and position-based attribution and exposure breakdowns."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// TOML file with frequency, risk-free rate and ranking defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write the result as a JSON blob under this directory
    #[arg(long, global = true)]
    publish: Option<PathBuf>,

    /// Deep-merge into an existing published blob instead of replacing it
    #[arg(long, global = true)]
    merge: bool,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Trailing and calendar-year returns against an optional benchmark
    Trailing(TrailingArgs),
    /// Sharpe, Sortino, drawdown, beta and capture ratios
    RiskAdjusted(RiskAdjustedArgs),
    /// Rolling-window return, volatility and Sharpe
    Rolling(RollingArgs),
    /// Rank a peer group by period and metric
    PeerRank(PeerRankArgs),
    /// Quartile persistence across evaluation periods
    Persistence(PersistenceArgs),
    /// Screen a universe on thresholds and rank the survivors
    Screen(ScreenArgs),
    /// Rolling peer percentile and benchmark hit rate of one fund
    Quality(QualityArgs),
    /// Return-based attribution (factor regression)
    Rba(RbaArgs),
    /// Position-based attribution (public vs private)
    Pba(PbaArgs),
    /// Long/short exposure by category
    Exposure(ExposureArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Directives `-v` adds on top of whatever `RUST_LOG` selects.
const VERBOSE_DIRECTIVES: [&str; 2] = ["fund_analytics_core=debug", "fund_analytics_cli=debug"];

fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    let base = env
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    if !verbose {
        return base;
    }
    VERBOSE_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(base, |filter, directive| filter.add_directive(directive))
}

fn init_logging(verbose: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    // stdout carries the report; logs go to stderr
    let _ = tracing_subscriber::registry()
        .with(log_filter(verbose, env.as_deref()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_context(path: Option<&PathBuf>) -> Result<Context, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => AnalyticsConfig::from_toml_file(p)?,
        None => AnalyticsConfig::default(),
    };
    Ok(Context { config })
}

fn run(cli: Cli) -> Result<Option<Report>, Box<dyn std::error::Error>> {
    let Cli {
        command,
        config,
        publish: publish_root,
        merge,
        ..
    } = cli;
    let ctx = load_context(config.as_ref())?;
    let report = match command {
        Commands::Trailing(args) => commands::performance::run_trailing(args, &ctx),
        Commands::RiskAdjusted(args) => commands::performance::run_risk_adjusted(args, &ctx),
        Commands::Rolling(args) => commands::performance::run_rolling(args, &ctx),
        Commands::PeerRank(args) => commands::ranking::run_peer_rank(args, &ctx),
        Commands::Persistence(args) => commands::ranking::run_persistence(args, &ctx),
        Commands::Screen(args) => commands::ranking::run_screen(args, &ctx),
        Commands::Quality(args) => commands::ranking::run_quality(args, &ctx),
        Commands::Rba(args) => commands::attribution::run_rba(args, &ctx),
        Commands::Pba(args) => commands::attribution::run_pba(args, &ctx),
        Commands::Exposure(args) => commands::attribution::run_exposure(args, &ctx),
        Commands::Version => {
            println!("fund-analytics {}", env!("CARGO_PKG_VERSION"));
            return Ok(None);
        }
    }?;

    // Fall back to the config's output_dir when --publish is absent
    let root = publish_root.or_else(|| ctx.config.output_dir.as_ref().map(PathBuf::from));
    if let Some(root) = root {
        publish::publish_report(&root, &report, merge)?;
    }
    Ok(Some(report))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = cli.output.clone();

    match run(cli) {
        Ok(Some(report)) => {
            output::format_output(&format, &report.value);
            process::exit(0);
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
