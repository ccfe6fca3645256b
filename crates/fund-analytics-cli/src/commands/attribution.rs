use clap::Args;
use serde_json::json;

use fund_analytics_core::attribution::exposure::{exposure_breakdown, ExposureInput};
use fund_analytics_core::attribution::position_based::{
    position_based_attribution, PositionAttributionInput,
};
use fund_analytics_core::attribution::return_based::{
    return_based_attribution, ReturnAttributionInput,
};

use super::{load_input, ConfigKey, Context, Report};

/// Arguments for return-based (factor regression) attribution
#[derive(Args)]
pub struct RbaArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for position-based attribution
#[derive(Args)]
pub struct PbaArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for exposure breakdown
#[derive(Args)]
pub struct ExposureArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Number of largest positions to report
    #[arg(long)]
    pub top_n: Option<usize>,
}

pub fn run_rba(args: RbaArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let input: ReturnAttributionInput = load_input(
        ctx,
        args.input.as_deref(),
        "return-based attribution",
        &[ConfigKey::Frequency, ConfigKey::RiskFreeRate],
        json!({}),
    )?;
    let result = return_based_attribution(&input)?;
    let as_of = Some(result.result.end_date);
    Ok(Report::new("rba", as_of, serde_json::to_value(result)?))
}

pub fn run_pba(args: PbaArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let input: PositionAttributionInput = load_input(
        ctx,
        args.input.as_deref(),
        "position-based attribution",
        &[],
        json!({}),
    )?;
    let result = position_based_attribution(&input)?;
    Ok(Report::new("pba", None, serde_json::to_value(result)?))
}

pub fn run_exposure(args: ExposureArgs, ctx: &Context) -> Result<Report, Box<dyn std::error::Error>> {
    let overrides = match args.top_n {
        Some(n) => json!({ "top_n": n }),
        None => json!({}),
    };
    let input: ExposureInput =
        load_input(ctx, args.input.as_deref(), "exposure breakdown", &[], overrides)?;
    let result = exposure_breakdown(&input)?;
    Ok(Report::new("exposure", None, serde_json::to_value(result)?))
}
