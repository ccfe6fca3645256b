//! Performance screener: filter a universe on metric thresholds and peer
//! percentiles, then rank the survivors on a weighted composite score.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::RankingConfig;
use crate::error::FundAnalyticsError;
use crate::peer_ranking::{validate_members, PeerMetric};
use crate::performance::Horizon;
use crate::ranking::{percentile_among, percentile_from_rank, rank_values};
use crate::types::*;
use crate::FundAnalyticsResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

fn default_weight() -> Decimal {
    Decimal::ONE
}

/// One screening rule. A fund passes when its metric lies within
/// `[min, max]` and its peer percentile is at most `max_percentile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenCriterion {
    pub metric: PeerMetric,
    pub period: Horizon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_percentile: Option<u32>,
    #[serde(default = "default_weight")]
    pub weight: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerInput {
    pub as_of: NaiveDate,
    pub members: Vec<ReturnSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<ReturnSeries>,
    pub criteria: Vec<ScreenCriterion>,
    #[serde(default)]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// A fund's value and peer percentile on one criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub metric: PeerMetric,
    pub period: Horizon,
    pub value: Option<Decimal>,
    pub percentile: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCriterion {
    /// Position in the input criteria list
    pub index: usize,
    pub metric: PeerMetric,
    pub period: Horizon,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenedFund {
    pub id: String,
    pub name: String,
    pub passed: bool,
    /// Weighted mean of (101 - percentile); higher is better
    pub composite_score: Option<Decimal>,
    pub rank: Option<Decimal>,
    pub scores: Vec<CriterionScore>,
    pub failed: Vec<FailedCriterion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerOutput {
    pub as_of: NaiveDate,
    pub universe: usize,
    pub passed: usize,
    /// Passing funds by rank, then failing funds by id
    pub funds: Vec<ScreenedFund>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Vec<CriterionScore>>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &ScreenerInput) -> FundAnalyticsResult<()> {
    validate_members(&input.members)?;
    input.ranking.validate()?;
    if input.criteria.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "criteria".into(),
            reason: "At least one criterion is required".into(),
        });
    }
    for (i, c) in input.criteria.iter().enumerate() {
        if c.weight < Decimal::ZERO {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("criteria[{}].weight", i),
                reason: "Weights must be non-negative".into(),
            });
        }
        if let (Some(lo), Some(hi)) = (c.min, c.max) {
            if lo > hi {
                return Err(FundAnalyticsError::InvalidInput {
                    field: format!("criteria[{}]", i),
                    reason: format!("min {} exceeds max {}", lo, hi),
                });
            }
        }
        if matches!(c.max_percentile, Some(p) if p == 0 || p > 100) {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("criteria[{}].max_percentile", i),
                reason: "Percentile threshold must be between 1 and 100".into(),
            });
        }
    }
    if input.criteria.iter().all(|c| c.weight.is_zero()) {
        return Err(FundAnalyticsError::InvalidInput {
            field: "criteria".into(),
            reason: "Criteria weights must not all be zero".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Screen a universe of funds and rank those passing every criterion.
pub fn screen_funds(
    input: &ScreenerInput,
) -> FundAnalyticsResult<ComputationOutput<ScreenerOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let config = &input.ranking;
    let n_members = input.members.len();

    // scores[member][criterion]
    let mut scores: Vec<Vec<CriterionScore>> = vec![Vec::new(); n_members];
    let mut peer_values: Vec<Vec<Decimal>> = Vec::with_capacity(input.criteria.len());

    for criterion in &input.criteria {
        let values: Vec<Option<Decimal>> = input
            .members
            .iter()
            .map(|m| {
                criterion
                    .metric
                    .compute(m, criterion.period, input.as_of, input.frequency, input.risk_free_rate)
                    .ok()
            })
            .collect();

        let present: Vec<(usize, Decimal)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .collect();
        if present.len() < config.min_peers {
            warnings.push(format!(
                "{} {}: only {} funds have data (minimum {}); percentiles are unreliable",
                criterion.period,
                criterion.metric,
                present.len(),
                config.min_peers
            ));
        }

        let raw: Vec<Decimal> = present.iter().map(|(_, v)| *v).collect();
        let ranks = rank_values(&raw, criterion.metric.direction(), config.tie_break, config.seed);
        let mut percentiles = vec![None; n_members];
        for ((idx, _), rank) in present.iter().zip(ranks) {
            percentiles[*idx] = Some(percentile_from_rank(rank, present.len()));
        }

        for (m_idx, row) in scores.iter_mut().enumerate() {
            row.push(CriterionScore {
                metric: criterion.metric,
                period: criterion.period,
                value: values[m_idx],
                percentile: percentiles[m_idx],
            });
        }
        peer_values.push(raw);
    }

    let mut funds: Vec<ScreenedFund> = input
        .members
        .iter()
        .zip(scores)
        .map(|(m, row)| evaluate_fund(m, &input.criteria, row))
        .collect();

    // Rank the survivors on their composite scores
    let passing: Vec<usize> = (0..funds.len()).filter(|&i| funds[i].passed).collect();
    let composites: Vec<Decimal> = passing
        .iter()
        .map(|&i| funds[i].composite_score.unwrap_or_default())
        .collect();
    let ranks = rank_values(
        &composites,
        RankDirection::HigherIsBetter,
        config.tie_break,
        config.seed,
    );
    for (&i, rank) in passing.iter().zip(ranks) {
        funds[i].rank = Some(rank);
    }
    funds.sort_by(|a, b| match (a.rank, b.rank) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });

    let benchmark = input.benchmark.as_ref().map(|b| {
        input
            .criteria
            .iter()
            .zip(&peer_values)
            .map(|(c, peers)| {
                let value = c
                    .metric
                    .compute(b, c.period, input.as_of, input.frequency, input.risk_free_rate)
                    .ok();
                CriterionScore {
                    metric: c.metric,
                    period: c.period,
                    value,
                    percentile: value
                        .filter(|_| !peers.is_empty())
                        .map(|v| percentile_among(v, peers, c.metric.direction())),
                }
            })
            .collect()
    });

    tracing::debug!(universe = n_members, passed = passing.len(), "screen complete");

    let output = ScreenerOutput {
        as_of: input.as_of,
        universe: n_members,
        passed: passing.len(),
        funds,
        benchmark,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Performance Screener (threshold filters, weighted composite of 101 - peer percentile)",
        &serde_json::json!({
            "as_of": input.as_of.to_string(),
            "criteria": input.criteria.len(),
            "tie_break": config.tie_break,
            "seed": config.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn evaluate_fund(
    member: &ReturnSeries,
    criteria: &[ScreenCriterion],
    scores: Vec<CriterionScore>,
) -> ScreenedFund {
    let mut failed = Vec::new();
    let mut weighted = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;

    for (index, (c, s)) in criteria.iter().zip(&scores).enumerate() {
        let fail = |reason: String| FailedCriterion {
            index,
            metric: c.metric,
            period: c.period,
            reason,
        };
        let (value, percentile) = match (s.value, s.percentile) {
            (Some(v), Some(p)) => (v, p),
            _ => {
                failed.push(fail("insufficient history".into()));
                continue;
            }
        };
        if let Some(lo) = c.min {
            if value < lo {
                failed.push(fail(format!("{} below minimum {}", value, lo)));
            }
        }
        if let Some(hi) = c.max {
            if value > hi {
                failed.push(fail(format!("{} above maximum {}", value, hi)));
            }
        }
        if let Some(limit) = c.max_percentile {
            if percentile > limit {
                failed.push(fail(format!("percentile {} worse than {}", percentile, limit)));
            }
        }
        weighted += c.weight * (dec!(101) - Decimal::from(percentile));
        total_weight += c.weight;
    }

    let passed = failed.is_empty();
    ScreenedFund {
        id: member.id.clone(),
        name: member.name.clone(),
        passed,
        composite_score: (passed && !total_weight.is_zero()).then(|| weighted / total_weight),
        rank: None,
        scores,
        failed,
    }
}
