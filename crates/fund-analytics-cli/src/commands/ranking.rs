use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use fund_analytics_core::peer_ranking::{calculate_peer_rankings, PeerRankingInput};
use fund_analytics_core::persistence::{persistence_analysis, PersistenceInput};
use fund_analytics_core::quality::{performance_quality, QualityInput};
use fund_analytics_core::report::deep_merge;
use fund_analytics_core::screener::{screen_funds, ScreenerInput};

use super::{load_input, ConfigKey, Context, RankingArgs, Report};

const PEER_KEYS: [ConfigKey; 3] = [ConfigKey::Frequency, ConfigKey::RiskFreeRate, ConfigKey::Ranking];

/// Arguments for peer percentile ranking
#[derive(Args)]
pub struct PeerRankArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the as-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Comma-separated ids of the funds to summarise
    #[arg(long, value_delimiter = ',')]
    pub targets: Option<Vec<String>>,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

/// Arguments for quartile persistence across periods
#[derive(Args)]
pub struct PersistenceArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Number of equal-count bins (4 = quartiles, 10 = deciles)
    #[arg(long)]
    pub bins: Option<u32>,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

/// Arguments for the performance screener
#[derive(Args)]
pub struct ScreenArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the as-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

/// Arguments for rolling performance quality
#[derive(Args)]
pub struct QualityArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Rolling window length in periods
    #[arg(long)]
    pub window: Option<usize>,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

fn overrides(ranking: &RankingArgs, extra: Value) -> Result<Value, Box<dyn std::error::Error>> {
    let mut v = ranking.overrides()?;
    deep_merge(&mut v, extra);
    Ok(v)
}

fn optional<T: serde::Serialize>(key: &str, value: Option<T>) -> Result<Value, serde_json::Error> {
    let mut map = serde_json::Map::new();
    if let Some(v) = value {
        map.insert(key.to_string(), serde_json::to_value(v)?);
    }
    Ok(Value::Object(map))
}

pub fn run_peer_rank(args: PeerRankArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let mut extra = optional("as_of", args.as_of)?;
    deep_merge(&mut extra, optional("target_ids", args.targets)?);
    let input: PeerRankingInput = load_input(
        ctx,
        args.input.as_deref(),
        "peer ranking",
        &PEER_KEYS,
        overrides(&args.ranking, extra)?,
    )?;
    let result = calculate_peer_rankings(&input)?;
    Ok(Report::new("peer_ranking", Some(input.as_of), serde_json::to_value(result)?))
}

pub fn run_persistence(
    args: PersistenceArgs,
    ctx: &Context,
) -> Result<Report, Box<dyn std::error::Error>> {
    let input: PersistenceInput = load_input(
        ctx,
        args.input.as_deref(),
        "persistence analysis",
        &PEER_KEYS,
        overrides(&args.ranking, optional("bins", args.bins)?)?,
    )?;
    let result = persistence_analysis(&input)?;
    let as_of = input.periods.last().map(|p| p.end);
    Ok(Report::new("persistence", as_of, serde_json::to_value(result)?))
}

pub fn run_screen(args: ScreenArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let input: ScreenerInput = load_input(
        ctx,
        args.input.as_deref(),
        "performance screen",
        &PEER_KEYS,
        overrides(&args.ranking, optional("as_of", args.as_of)?)?,
    )?;
    let result = screen_funds(&input)?;
    Ok(Report::new("screener", Some(input.as_of), serde_json::to_value(result)?))
}

pub fn run_quality(args: QualityArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let input: QualityInput = load_input(
        ctx,
        args.input.as_deref(),
        "performance quality",
        &[
            ConfigKey::Frequency,
            ConfigKey::RiskFreeRate,
            ConfigKey::Ranking,
            ConfigKey::Window,
        ],
        overrides(&args.ranking, optional("window", args.window)?)?,
    )?;
    let result = performance_quality(&input)?;
    let as_of = result.result.percentiles.last().map(|p| p.date);
    Ok(Report::new("performance_quality", as_of, serde_json::to_value(result)?))
}
