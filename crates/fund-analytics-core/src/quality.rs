//! Performance-quality report: how consistently a fund has ranked against
//! its peers on a rolling basis, and how it behaves against a benchmark.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::config::RankingConfig;
use crate::error::FundAnalyticsError;
use crate::peer_ranking::validate_members;
use crate::performance::risk_adjusted::capture_ratios;
use crate::ranking::{bin_from_rank, percentile_from_rank, rank_values};
use crate::rolling::{rolling_windows, RollingMetric};
use crate::stats::{mean, median};
use crate::types::*;
use crate::FundAnalyticsResult;

fn default_window() -> usize {
    36
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityInput {
    pub fund: ReturnSeries,
    pub peers: Vec<ReturnSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<ReturnSeries>,
    /// Rolling window in periods
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub metric: RollingMetric,
    #[serde(default)]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// The fund's standing at one window end date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityPoint {
    pub date: NaiveDate,
    pub value: Decimal,
    pub peer_count: usize,
    pub rank: Decimal,
    pub percentile: u32,
    pub quartile: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingSharpeSummary {
    pub windows: usize,
    pub mean: Decimal,
    pub median: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub latest: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityOutput {
    pub fund_id: String,
    pub metric: RollingMetric,
    pub window: usize,
    pub percentiles: Vec<QualityPoint>,
    pub average_percentile: Decimal,
    pub median_percentile: Decimal,
    pub best_percentile: u32,
    pub worst_percentile: u32,
    /// Share of windows in quartiles 1 through 4
    pub quartile_shares: [Decimal; 4],
    pub top_half_share: Decimal,
    /// Share of periods the fund beat the benchmark
    pub hit_rate: Option<Decimal>,
    pub up_capture: Option<Decimal>,
    pub down_capture: Option<Decimal>,
    pub rolling_sharpe: RollingSharpeSummary,
    /// Mean of top-half share, hit rate and (1 - average percentile / 100)
    pub quality_score: Decimal,
}

fn validate_input(input: &QualityInput) -> FundAnalyticsResult<()> {
    input.fund.validate()?;
    validate_members(&input.peers)?;
    input.ranking.validate()?;
    if let Some(ref b) = input.benchmark {
        b.validate()?;
    }
    if input.window < 2 {
        return Err(FundAnalyticsError::InvalidInput {
            field: "window".into(),
            reason: "Rolling window must span at least 2 periods".into(),
        });
    }
    if input.fund.len() < input.window {
        return Err(FundAnalyticsError::InsufficientData(format!(
            "Fund '{}' has {} observations; the {}-period window needs more",
            input.fund.id,
            input.fund.len(),
            input.window
        )));
    }
    Ok(())
}

/// Rolling peer percentile and benchmark-relative quality of one fund.
pub fn performance_quality(
    input: &QualityInput,
) -> FundAnalyticsResult<ComputationOutput<QualityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let config = &input.ranking;
    let metric = input.metric;

    let fund_windows = rolling_windows(
        &input.fund,
        input.window,
        1,
        input.risk_free_rate,
        input.frequency,
    );

    // Peer metric keyed by window end date; the fund itself never ranks against itself
    let peer_maps: Vec<HashMap<NaiveDate, Decimal>> = input
        .peers
        .iter()
        .filter(|p| p.id != input.fund.id)
        .map(|p| {
            rolling_windows(p, input.window, 1, input.risk_free_rate, input.frequency)
                .iter()
                .map(|w| (w.end_date, metric.value(w)))
                .collect()
        })
        .collect();

    let mut points = Vec::new();
    for w in &fund_windows {
        let fund_value = metric.value(w);
        let mut values = vec![fund_value];
        values.extend(peer_maps.iter().filter_map(|m| m.get(&w.end_date).copied()));
        let peer_count = values.len() - 1;
        if peer_count < config.min_peers {
            continue;
        }
        let ranks = rank_values(&values, metric.direction(), config.tie_break, config.seed);
        let rank = ranks[0];
        let n = values.len();
        points.push(QualityPoint {
            date: w.end_date,
            value: fund_value,
            peer_count,
            rank,
            percentile: percentile_from_rank(rank, n),
            quartile: bin_from_rank(rank, n, 4),
        });
    }

    if points.is_empty() {
        return Err(FundAnalyticsError::InsufficientData(format!(
            "No {}-period window of '{}' has at least {} peers reporting",
            input.window, input.fund.id, config.min_peers
        )));
    }
    let skipped = fund_windows.len() - points.len();
    if skipped > 0 {
        warnings.push(format!(
            "{} of {} windows skipped for lack of peers",
            skipped,
            fund_windows.len()
        ));
    }
    tracing::debug!(fund = %input.fund.id, windows = points.len(), "rolling percentiles computed");

    let count = Decimal::from(points.len() as i64);
    let pcts: Vec<Decimal> = points.iter().map(|p| Decimal::from(p.percentile)).collect();
    let average_percentile = mean(&pcts);
    let share = |pred: &dyn Fn(&QualityPoint) -> bool| {
        Decimal::from(points.iter().filter(|p| pred(p)).count() as i64) / count
    };
    let quartile_shares = [1u32, 2, 3, 4].map(|q| share(&|p: &QualityPoint| p.quartile == q));
    let top_half_share = share(&|p: &QualityPoint| p.percentile <= 50);

    let (hit_rate, up_capture, down_capture) = match input.benchmark {
        Some(ref b) => {
            let aligned = input.fund.align_with(b);
            if aligned.is_empty() {
                warnings.push(format!("Fund and benchmark '{}' share no dates", b.id));
                (None, None, None)
            } else {
                let f: Vec<Decimal> = aligned.iter().map(|(_, f, _)| *f).collect();
                let bm: Vec<Decimal> = aligned.iter().map(|(_, _, b)| *b).collect();
                let (up, down, batting) = capture_ratios(&f, &bm);
                (batting, up, down)
            }
        }
        None => (None, None, None),
    };

    let sharpes: Vec<Decimal> = fund_windows.iter().map(|w| w.sharpe_ratio).collect();
    let rolling_sharpe = RollingSharpeSummary {
        windows: sharpes.len(),
        mean: mean(&sharpes),
        median: median(&sharpes).unwrap_or_default(),
        min: sharpes.iter().copied().min().unwrap_or_default(),
        max: sharpes.iter().copied().max().unwrap_or_default(),
        latest: sharpes.last().copied().unwrap_or_default(),
    };

    let mut components = vec![top_half_share, Decimal::ONE - average_percentile / dec!(100)];
    if let Some(h) = hit_rate {
        components.push(h);
    }
    let quality_score = mean(&components);

    let output = QualityOutput {
        fund_id: input.fund.id.clone(),
        metric,
        window: input.window,
        average_percentile,
        median_percentile: median(&pcts).unwrap_or_default(),
        best_percentile: points.iter().map(|p| p.percentile).min().unwrap_or(1),
        worst_percentile: points.iter().map(|p| p.percentile).max().unwrap_or(100),
        percentiles: points,
        quartile_shares,
        top_half_share,
        hit_rate,
        up_capture,
        down_capture,
        rolling_sharpe,
        quality_score,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Performance Quality (rolling peer percentile, benchmark hit rate and capture)",
        &serde_json::json!({
            "window": input.window,
            "metric": metric,
            "frequency": input.frequency,
            "min_peers": config.min_peers,
            "tie_break": config.tie_break,
            "seed": config.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::monthly;

    fn peers() -> Vec<ReturnSeries> {
        [dec!(0.005), dec!(0.010), dec!(0.015), dec!(0.020)]
            .iter()
            .enumerate()
            .map(|(i, r)| monthly(&format!("P{}", i), 2022, &[*r; 24]))
            .collect()
    }

    fn input(fund_return: Decimal) -> QualityInput {
        QualityInput {
            fund: monthly("F", 2022, &[fund_return; 24]),
            peers: peers(),
            benchmark: None,
            window: 12,
            metric: RollingMetric::Return,
            risk_free_rate: Decimal::ZERO,
            frequency: ReturnFrequency::Monthly,
            ranking: RankingConfig::default(),
        }
    }

    #[test]
    fn test_top_fund_always_first() {
        let out = performance_quality(&input(dec!(0.03))).unwrap().result;
        assert_eq!(out.percentiles.len(), 13);
        assert!(out.percentiles.iter().all(|p| p.percentile == 1 && p.peer_count == 4));
        assert_eq!(out.quartile_shares[0], Decimal::ONE);
        assert_eq!(out.top_half_share, Decimal::ONE);
        assert_eq!(out.best_percentile, 1);
        // (1 + 0.99) / 2 without a benchmark
        assert_eq!(out.quality_score, dec!(0.995));
    }

    #[test]
    fn test_bottom_fund() {
        let out = performance_quality(&input(Decimal::ZERO)).unwrap().result;
        assert!(out.percentiles.iter().all(|p| p.percentile == 100 && p.quartile == 4));
        assert_eq!(out.top_half_share, Decimal::ZERO);
        assert_eq!(out.quality_score, Decimal::ZERO);
    }

    #[test]
    fn test_hit_rate_and_capture() {
        let mut inp = input(dec!(0.012));
        let bench: Vec<Decimal> = (0..24)
            .map(|i| if i % 2 == 0 { dec!(0.02) } else { dec!(-0.01) })
            .collect();
        inp.benchmark = Some(monthly("EHI", 2022, &bench));
        let out = performance_quality(&inp).unwrap().result;
        // Beats the benchmark in down months only
        assert_eq!(out.hit_rate, Some(dec!(0.5)));
        assert_eq!(out.up_capture, Some(dec!(0.6)));
        assert_eq!(out.down_capture, Some(dec!(-1.2)));
    }

    #[test]
    fn test_too_few_peers_is_error() {
        let mut inp = input(dec!(0.01));
        inp.peers.truncate(2);
        assert!(matches!(
            performance_quality(&inp),
            Err(FundAnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_fund_listed_among_peers_is_ignored() {
        let mut inp = input(dec!(0.03));
        inp.peers.push(inp.fund.clone());
        let out = performance_quality(&inp).unwrap().result;
        assert!(out.percentiles.iter().all(|p| p.peer_count == 4));
    }

    #[test]
    fn test_partial_peer_coverage_skips_windows() {
        let mut inp = input(dec!(0.03));
        // One peer only reports the second year
        inp.peers[0].observations.drain(0..12);
        inp.ranking.min_peers = 4;
        let out = performance_quality(&inp).unwrap();
        // Only the final window (ending Dec 2023) has all four peers
        assert_eq!(out.result.percentiles.len(), 1);
        assert_eq!(out.warnings.len(), 1);
    }
}
