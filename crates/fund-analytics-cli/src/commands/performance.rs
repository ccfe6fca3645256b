use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use fund_analytics_core::performance::risk_adjusted::{
    calculate_risk_adjusted_returns, RiskAdjustedInput,
};
use fund_analytics_core::performance::trailing::{trailing_returns, TrailingReturnsInput};
use fund_analytics_core::rolling::{rolling_statistics, RollingStatisticsInput};
use fund_analytics_core::ReturnFrequency;

use super::{load_input, ConfigKey, Context, Report};

/// Arguments for trailing and calendar-year returns
#[derive(Args)]
pub struct TrailingArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the as-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

/// Arguments for risk-adjusted return metrics
#[derive(Args)]
pub struct RiskAdjustedArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns (e.g. "0.05,0.02,-0.01,0.03")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<Decimal>>,

    /// Comma-separated benchmark returns, same length as --returns
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub benchmark: Option<Vec<Decimal>>,

    /// Risk-free rate (annualised); defaults to the config value
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Return frequency: daily, weekly, monthly, quarterly, annual
    #[arg(long)]
    pub frequency: Option<String>,
}

/// Arguments for rolling-window statistics
#[derive(Args)]
pub struct RollingArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Window length in periods
    #[arg(long)]
    pub window: Option<usize>,

    /// Distance between consecutive window ends
    #[arg(long)]
    pub step: Option<usize>,
}

fn parse_frequency(s: &str) -> Result<ReturnFrequency, Box<dyn std::error::Error>> {
    serde_json::from_value(Value::String(s.to_lowercase()))
        .map_err(|_| format!("Unknown frequency '{}'", s).into())
}

pub fn run_trailing(args: TrailingArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let overrides = match args.as_of {
        Some(d) => json!({ "as_of": d }),
        None => json!({}),
    };
    let input: TrailingReturnsInput = load_input(
        ctx,
        args.input.as_deref(),
        "trailing returns",
        &[ConfigKey::Frequency],
        overrides,
    )?;
    let result = trailing_returns(&input)?;
    Ok(Report::new(
        "trailing_returns",
        Some(input.as_of),
        serde_json::to_value(result)?,
    ))
}

pub fn run_risk_adjusted(
    args: RiskAdjustedArgs,
    ctx: &Context,
) -> Result<Report, Box<dyn std::error::Error>> {
    let mut overrides = serde_json::Map::new();
    if let Some(rf) = args.risk_free_rate {
        overrides.insert("risk_free_rate".into(), serde_json::to_value(rf)?);
    }
    if let Some(ref f) = args.frequency {
        overrides.insert("frequency".into(), serde_json::to_value(parse_frequency(f)?)?);
    }

    let input: RiskAdjustedInput = match args.returns {
        // Inline returns skip the input document entirely
        Some(returns) => RiskAdjustedInput {
            returns,
            risk_free_rate: args.risk_free_rate.unwrap_or(ctx.config.risk_free_rate),
            benchmark_returns: args.benchmark,
            frequency: match args.frequency {
                Some(ref f) => parse_frequency(f)?,
                None => ctx.config.frequency,
            },
            target_return: None,
        },
        None => load_input(
            ctx,
            args.input.as_deref(),
            "risk-adjusted returns",
            &[ConfigKey::Frequency, ConfigKey::RiskFreeRate],
            Value::Object(overrides),
        )?,
    };
    let result = calculate_risk_adjusted_returns(&input)?;
    Ok(Report::new("risk_adjusted", None, serde_json::to_value(result)?))
}

pub fn run_rolling(args: RollingArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let mut overrides = serde_json::Map::new();
    if let Some(w) = args.window {
        overrides.insert("window".into(), json!(w));
    }
    if let Some(s) = args.step {
        overrides.insert("step".into(), json!(s));
    }
    let input: RollingStatisticsInput = load_input(
        ctx,
        args.input.as_deref(),
        "rolling statistics",
        &[ConfigKey::Frequency, ConfigKey::RiskFreeRate, ConfigKey::Window],
        Value::Object(overrides),
    )?;
    let result = rolling_statistics(&input)?;
    let as_of = result.result.windows.last().map(|w| w.end_date);
    Ok(Report::new("rolling_statistics", as_of, serde_json::to_value(result)?))
}
