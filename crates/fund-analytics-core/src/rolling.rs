//! Rolling-window return, volatility and Sharpe statistics.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FundAnalyticsError;
use crate::performance::risk_adjusted::{annualised_volatility, sharpe_ratio};
use crate::stats::{annualise_compound, compound_return, max_drawdown, mean};
use crate::types::*;
use crate::FundAnalyticsResult;

/// Statistic of a rolling window used when ranking peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingMetric {
    #[default]
    Return,
    Volatility,
    Sharpe,
}

impl RollingMetric {
    pub fn direction(&self) -> RankDirection {
        match self {
            RollingMetric::Volatility => RankDirection::LowerIsBetter,
            RollingMetric::Return | RollingMetric::Sharpe => RankDirection::HigherIsBetter,
        }
    }

    pub fn value(&self, w: &RollingWindow) -> Decimal {
        match self {
            RollingMetric::Return => w.annualised_return,
            RollingMetric::Volatility => w.annualised_volatility,
            RollingMetric::Sharpe => w.sharpe_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cumulative_return: Rate,
    /// Cumulative return for windows shorter than a year
    pub annualised_return: Rate,
    pub annualised_volatility: Rate,
    pub sharpe_ratio: Decimal,
    pub max_drawdown: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingStatisticsInput {
    pub series: ReturnSeries,
    /// Window length in periods
    pub window: usize,
    /// Distance between consecutive window ends (default 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default)]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingSummary {
    pub window_count: usize,
    pub mean_return: Rate,
    pub best_return: Rate,
    pub worst_return: Rate,
    pub mean_sharpe: Decimal,
    pub mean_volatility: Rate,
    /// Share of windows with a positive cumulative return
    pub pct_positive: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingStatisticsOutput {
    pub series_id: String,
    pub window: usize,
    pub step: usize,
    pub windows: Vec<RollingWindow>,
    pub summary: RollingSummary,
}

/// Every full window of `window` observations, advancing `step` at a time.
pub fn rolling_windows(
    series: &ReturnSeries,
    window: usize,
    step: usize,
    risk_free_rate: Rate,
    frequency: ReturnFrequency,
) -> Vec<RollingWindow> {
    let obs = &series.observations;
    if window == 0 || step == 0 || obs.len() < window {
        return Vec::new();
    }
    let ppy = frequency.periods_per_year_usize();
    (window..=obs.len())
        .step_by(step)
        .map(|end| {
            let slice = &obs[end - window..end];
            let values = observation_values(slice);
            let cumulative = compound_return(&values);
            RollingWindow {
                start_date: slice[0].date,
                end_date: slice[window - 1].date,
                cumulative_return: cumulative,
                annualised_return: annualise_compound(cumulative, window, ppy),
                annualised_volatility: annualised_volatility(&values, frequency),
                sharpe_ratio: sharpe_ratio(&values, risk_free_rate, frequency),
                max_drawdown: max_drawdown(&values),
            }
        })
        .collect()
}

/// Compute rolling statistics for one series.
pub fn rolling_statistics(
    input: &RollingStatisticsInput,
) -> FundAnalyticsResult<ComputationOutput<RollingStatisticsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.series.validate()?;
    let step = input.step.unwrap_or(1);
    if input.window < 2 {
        return Err(FundAnalyticsError::InvalidInput {
            field: "window".into(),
            reason: "Rolling window must span at least 2 periods".into(),
        });
    }
    if step == 0 {
        return Err(FundAnalyticsError::InvalidInput {
            field: "step".into(),
            reason: "Step must be at least 1".into(),
        });
    }
    if input.series.len() < input.window {
        return Err(FundAnalyticsError::InsufficientData(format!(
            "Series '{}' has {} observations; a {}-period window needs at least that many",
            input.series.id,
            input.series.len(),
            input.window
        )));
    }
    if input.window < input.frequency.periods_per_year_usize() {
        warnings.push(format!(
            "Window of {} periods is shorter than a year; returns are not annualised",
            input.window
        ));
    }

    let windows = rolling_windows(
        &input.series,
        input.window,
        step,
        input.risk_free_rate,
        input.frequency,
    );
    tracing::debug!(series = %input.series.id, windows = windows.len(), "rolling windows built");

    let returns: Vec<Decimal> = windows.iter().map(|w| w.annualised_return).collect();
    let positives = windows
        .iter()
        .filter(|w| w.cumulative_return > Decimal::ZERO)
        .count();
    let count = windows.len();
    let summary = RollingSummary {
        window_count: count,
        mean_return: mean(&returns),
        best_return: returns.iter().copied().max().unwrap_or_default(),
        worst_return: returns.iter().copied().min().unwrap_or_default(),
        mean_sharpe: mean(&windows.iter().map(|w| w.sharpe_ratio).collect::<Vec<_>>()),
        mean_volatility: mean(
            &windows
                .iter()
                .map(|w| w.annualised_volatility)
                .collect::<Vec<_>>(),
        ),
        pct_positive: Decimal::from(positives as i64) / Decimal::from(count.max(1) as i64),
    };

    let output = RollingStatisticsOutput {
        series_id: input.series.id.clone(),
        window: input.window,
        step,
        windows,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rolling-Window Statistics (geometric return, sample volatility, arithmetic Sharpe)",
        &serde_json::json!({
            "window": input.window,
            "step": step,
            "frequency": input.frequency,
            "risk_free_rate": input.risk_free_rate.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
