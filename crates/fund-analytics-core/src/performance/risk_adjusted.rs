use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FundAnalyticsError;
use crate::stats::{
    covariance, downside_deviation, max_drawdown, mean, sample_variance, sqrt_decimal,
};
use crate::types::*;
use crate::FundAnalyticsResult;

/// Input for risk-adjusted return calculations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustedInput {
    /// Periodic returns (as decimals, e.g. 0.05 = 5%)
    pub returns: Vec<Decimal>,
    /// Risk-free rate (annualised)
    pub risk_free_rate: Rate,
    /// Benchmark returns (same frequency and dates as `returns`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_returns: Option<Vec<Decimal>>,
    /// Observation frequency
    pub frequency: ReturnFrequency,
    /// Target return for Sortino ratio (annualised); defaults to risk_free_rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_return: Option<Rate>,
}

/// Output of risk-adjusted return calculations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustedOutput {
    pub annualised_return: Rate,
    pub annualised_volatility: Rate,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub calmar_ratio: Option<Decimal>,
    pub information_ratio: Option<Decimal>,
    pub treynor_ratio: Option<Decimal>,
    pub max_drawdown: Rate,
    pub downside_deviation: Rate,
    pub tracking_error: Option<Rate>,
    pub beta: Option<Decimal>,
    pub alpha: Option<Rate>,
    /// Mean fund return in up-benchmark periods over the benchmark's
    pub up_capture: Option<Decimal>,
    /// Mean fund return in down-benchmark periods over the benchmark's
    pub down_capture: Option<Decimal>,
    /// Share of periods in which the fund beat the benchmark
    pub batting_average: Option<Decimal>,
}

/// Annualised standard deviation of periodic returns.
pub fn annualised_volatility(returns: &[Decimal], frequency: ReturnFrequency) -> Rate {
    let m = mean(returns);
    sqrt_decimal(sample_variance(returns, m)) * sqrt_decimal(frequency.periods_per_year())
}

/// Sharpe ratio on arithmetic annualisation; zero when volatility is zero.
pub fn sharpe_ratio(returns: &[Decimal], risk_free_rate: Rate, frequency: ReturnFrequency) -> Decimal {
    let vol = annualised_volatility(returns, frequency);
    if vol.is_zero() {
        return Decimal::ZERO;
    }
    (mean(returns) * frequency.periods_per_year() - risk_free_rate) / vol
}

/// Up/down capture ratios and batting average against a benchmark.
///
/// Capture is the mean fund return over the mean benchmark return, taken
/// separately over periods where the benchmark rose and where it fell.
pub fn capture_ratios(
    returns: &[Decimal],
    benchmark: &[Decimal],
) -> (Option<Decimal>, Option<Decimal>, Option<Decimal>) {
    let pairs: Vec<(Decimal, Decimal)> = returns
        .iter()
        .copied()
        .zip(benchmark.iter().copied())
        .collect();
    if pairs.is_empty() {
        return (None, None, None);
    }

    let capture = |keep: fn(Decimal) -> bool| {
        let (f, b): (Vec<Decimal>, Vec<Decimal>) =
            pairs.iter().filter(|(_, b)| keep(*b)).copied().unzip();
        if b.is_empty() {
            None
        } else {
            ratio(mean(&f), mean(&b))
        }
    };
    let wins = pairs.iter().filter(|(f, b)| f > b).count();
    let batting = Decimal::from(wins as i64) / Decimal::from(pairs.len() as i64);

    (
        capture(|b| b > Decimal::ZERO),
        capture(|b| b < Decimal::ZERO),
        Some(batting),
    )
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    (!denominator.is_zero()).then(|| numerator / denominator)
}

/// Calculate risk-adjusted fund returns.
pub fn calculate_risk_adjusted_returns(
    input: &RiskAdjustedInput,
) -> FundAnalyticsResult<ComputationOutput<RiskAdjustedOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let n = input.returns.len();
    if n < 2 {
        return Err(FundAnalyticsError::InsufficientData(
            "At least 2 return observations required".into(),
        ));
    }
    if n < input.frequency.periods_per_year_usize() {
        warnings.push(format!(
            "Only {} observations; annualised figures extrapolate less than one year",
            n
        ));
    }
    validate_growth("returns", &input.returns)?;
    if let Some(ref bench) = input.benchmark_returns {
        if bench.len() != n {
            return Err(FundAnalyticsError::InvalidInput {
                field: "benchmark_returns".into(),
                reason: format!("{} benchmark returns for {} fund returns", bench.len(), n),
            });
        }
        validate_growth("benchmark_returns", bench)?;
    }

    let ppy = input.frequency.periods_per_year();
    let rf = input.risk_free_rate;
    let annualised_return = mean(&input.returns) * ppy;
    let volatility = annualised_volatility(&input.returns, input.frequency);
    let excess = annualised_return - rf;

    let target = input.target_return.unwrap_or(rf) / ppy;
    let downside = downside_deviation(&input.returns, target) * sqrt_decimal(ppy);
    let drawdown = max_drawdown(&input.returns);

    let relative = match input.benchmark_returns {
        Some(ref bench) => relative_to(&input.returns, bench, annualised_return, rf, input.frequency, &mut warnings),
        None => Relative::default(),
    };
    tracing::debug!(observations = n, benchmark = input.benchmark_returns.is_some(), "risk-adjusted metrics");

    let output = RiskAdjustedOutput {
        annualised_return,
        annualised_volatility: volatility,
        sharpe_ratio: ratio(excess, volatility).unwrap_or_default(),
        sortino_ratio: ratio(excess, downside).unwrap_or_default(),
        calmar_ratio: ratio(annualised_return, drawdown.abs()),
        information_ratio: relative.information_ratio,
        treynor_ratio: relative.treynor_ratio,
        max_drawdown: drawdown,
        downside_deviation: downside,
        tracking_error: relative.tracking_error,
        beta: relative.beta,
        alpha: relative.alpha,
        up_capture: relative.up_capture,
        down_capture: relative.down_capture,
        batting_average: relative.batting_average,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Risk-Adjusted Returns (arithmetic annualisation; Sharpe, Sortino, Calmar, IR, Treynor, CAPM alpha/beta, capture)",
        &serde_json::json!({
            "observations": n,
            "frequency": input.frequency,
            "risk_free_rate": rf.to_string(),
            "target_return": input.target_return.unwrap_or(rf).to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Metrics measured against a benchmark of the same length.
#[derive(Default)]
struct Relative {
    information_ratio: Option<Decimal>,
    tracking_error: Option<Rate>,
    beta: Option<Decimal>,
    alpha: Option<Rate>,
    treynor_ratio: Option<Decimal>,
    up_capture: Option<Decimal>,
    down_capture: Option<Decimal>,
    batting_average: Option<Decimal>,
}

fn relative_to(
    returns: &[Decimal],
    bench: &[Decimal],
    annualised_return: Rate,
    rf: Rate,
    frequency: ReturnFrequency,
    warnings: &mut Vec<String>,
) -> Relative {
    let fund_mean = mean(returns);
    let bench_mean = mean(bench);
    let bench_annual = bench_mean * frequency.periods_per_year();

    let active: Vec<Decimal> = returns.iter().zip(bench).map(|(f, b)| f - b).collect();
    let tracking_error = annualised_volatility(&active, frequency);

    let beta = ratio(
        covariance(returns, bench, fund_mean, bench_mean),
        sample_variance(bench, bench_mean),
    );
    match beta {
        None => warnings.push("Benchmark has zero variance; beta undefined".into()),
        Some(b) if b < Decimal::ZERO => {
            warnings.push(format!("Negative beta ({}) to benchmark", b.round_dp(4)))
        }
        _ => {}
    }

    let (up_capture, down_capture, batting_average) = capture_ratios(returns, bench);
    Relative {
        information_ratio: ratio(annualised_return - bench_annual, tracking_error),
        tracking_error: Some(tracking_error),
        // CAPM: Rp - [Rf + beta (Rb - Rf)]
        alpha: beta.map(|b| annualised_return - rf - b * (bench_annual - rf)),
        treynor_ratio: beta.and_then(|b| ratio(annualised_return - rf, b)),
        beta,
        up_capture,
        down_capture,
        batting_average,
    }
}
