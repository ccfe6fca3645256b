//! Peer-ranking report: rank every member of a peer group on each
//! requested (horizon, metric) pair and summarise where the target funds
//! sit.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::config::RankingConfig;
use crate::error::FundAnalyticsError;
use crate::performance::risk_adjusted::{annualised_volatility, sharpe_ratio};
use crate::performance::trailing::horizon_return;
use crate::performance::Horizon;
use crate::ranking::{
    peer_statistics, percentile_among, rank_members, PeerStatistics, RankedMember,
};
use crate::stats::{compound_return, max_drawdown};
use crate::types::*;
use crate::FundAnalyticsResult;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Statistic a peer group is ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerMetric {
    Return,
    Volatility,
    Sharpe,
    MaxDrawdown,
}

impl PeerMetric {
    pub fn direction(&self) -> RankDirection {
        match self {
            PeerMetric::Return | PeerMetric::Sharpe => RankDirection::HigherIsBetter,
            PeerMetric::Volatility | PeerMetric::MaxDrawdown => RankDirection::LowerIsBetter,
        }
    }

    /// Value of this metric for `series` over `horizon`.
    pub fn compute(
        &self,
        series: &ReturnSeries,
        horizon: Horizon,
        as_of: NaiveDate,
        frequency: ReturnFrequency,
        risk_free_rate: Rate,
    ) -> Result<Decimal, ExclusionReason> {
        if *self == PeerMetric::Return {
            return horizon_return(series, horizon, as_of, frequency)
                .map(|(r, _)| r)
                .ok_or(ExclusionReason::InsufficientHistory);
        }
        let obs = horizon
            .select(series, as_of, frequency)
            .ok_or(ExclusionReason::InsufficientHistory)?;
        self.evaluate(&observation_values(obs), risk_free_rate, frequency)
    }

    /// Value of this metric over a run of periodic returns. Returns are
    /// compounded, not annualised.
    pub fn evaluate(
        &self,
        values: &[Decimal],
        risk_free_rate: Rate,
        frequency: ReturnFrequency,
    ) -> Result<Decimal, ExclusionReason> {
        match self {
            _ if values.is_empty() => Err(ExclusionReason::InsufficientHistory),
            PeerMetric::Volatility | PeerMetric::Sharpe if values.len() < 2 => {
                Err(ExclusionReason::TooFewObservations)
            }
            PeerMetric::Return => Ok(compound_return(values)),
            PeerMetric::Volatility => Ok(annualised_volatility(values, frequency)),
            PeerMetric::Sharpe => Ok(sharpe_ratio(values, risk_free_rate, frequency)),
            PeerMetric::MaxDrawdown => Ok(max_drawdown(values)),
        }
    }
}

impl std::fmt::Display for PeerMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerMetric::Return => write!(f, "Return"),
            PeerMetric::Volatility => write!(f, "Volatility"),
            PeerMetric::Sharpe => write!(f, "Sharpe"),
            PeerMetric::MaxDrawdown => write!(f, "Max Drawdown"),
        }
    }
}

/// Why a member was left out of a ranking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// No full window for the horizon (short or stale history)
    InsufficientHistory,
    /// Window too short for a dispersion statistic
    TooFewObservations,
    /// Since-inception track record below the configured minimum
    BelowMinimumTrackRecord,
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

fn default_periods() -> Vec<Horizon> {
    vec![
        Horizon::OneYear,
        Horizon::ThreeYears,
        Horizon::FiveYears,
        Horizon::InceptionToDate,
    ]
}

fn default_metrics() -> Vec<PeerMetric> {
    vec![PeerMetric::Return, PeerMetric::Volatility, PeerMetric::Sharpe]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRankingInput {
    pub peer_group: String,
    pub as_of: NaiveDate,
    /// Funds to summarise; every member is ranked regardless
    #[serde(default)]
    pub target_ids: Vec<String>,
    pub members: Vec<ReturnSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<ReturnSeries>,
    #[serde(default)]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    #[serde(default = "default_periods")]
    pub periods: Vec<Horizon>,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<PeerMetric>,
    #[serde(default)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedMember {
    pub id: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPosition {
    pub id: String,
    pub value: Decimal,
    /// Where the benchmark would sit among the ranked members
    pub percentile: Option<u32>,
}

/// Ranking of the peer group on one (horizon, metric) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingTable {
    pub horizon: Horizon,
    pub metric: PeerMetric,
    pub direction: RankDirection,
    pub ranked: Vec<RankedMember>,
    pub excluded: Vec<ExcludedMember>,
    pub statistics: Option<PeerStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkPosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPosition {
    pub horizon: Horizon,
    pub metric: PeerMetric,
    pub value: Option<Decimal>,
    pub rank: Option<Decimal>,
    pub ranked_count: usize,
    pub percentile: Option<u32>,
    pub quartile: Option<u32>,
    pub decile: Option<u32>,
    /// Target value minus the peer median
    pub vs_median: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    pub positions: Vec<TargetPosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRankingOutput {
    pub peer_group: String,
    pub as_of: NaiveDate,
    pub member_count: usize,
    pub tables: Vec<RankingTable>,
    pub targets: Vec<TargetSummary>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a peer group: non-empty, unique ids, well-formed series.
pub(crate) fn validate_members(members: &[ReturnSeries]) -> FundAnalyticsResult<()> {
    if members.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "members".into(),
            reason: "Peer group must contain at least one member".into(),
        });
    }
    let mut seen = HashSet::new();
    for m in members {
        m.validate()?;
        if !seen.insert(m.id.as_str()) {
            return Err(FundAnalyticsError::InvalidInput {
                field: "members".into(),
                reason: format!("Duplicate member id '{}'", m.id),
            });
        }
    }
    Ok(())
}

fn validate_input(input: &PeerRankingInput) -> FundAnalyticsResult<()> {
    validate_members(&input.members)?;
    input.ranking.validate()?;
    if let Some(ref b) = input.benchmark {
        b.validate()?;
    }
    if input.periods.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "periods".into(),
            reason: "At least one period is required".into(),
        });
    }
    if input.metrics.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "metrics".into(),
            reason: "At least one metric is required".into(),
        });
    }
    for t in &input.target_ids {
        if !input.members.iter().any(|m| &m.id == t) {
            return Err(FundAnalyticsError::InvalidInput {
                field: "target_ids".into(),
                reason: format!("Target '{}' is not a member of the peer group", t),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Rank a peer group on each (period, metric) pair.
pub fn calculate_peer_rankings(
    input: &PeerRankingInput,
) -> FundAnalyticsResult<ComputationOutput<PeerRankingOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let config = &input.ranking;

    let mut tables = Vec::with_capacity(input.periods.len() * input.metrics.len());
    for &horizon in &input.periods {
        for &metric in &input.metrics {
            let table = rank_table(input, horizon, metric);
            if table.ranked.len() < config.min_peers {
                warnings.push(format!(
                    "{} {}: only {} members ranked (minimum {}); percentiles omitted",
                    horizon,
                    metric,
                    table.ranked.len(),
                    config.min_peers
                ));
            }
            tracing::debug!(
                %horizon,
                %metric,
                ranked = table.ranked.len(),
                excluded = table.excluded.len(),
                "ranking table built"
            );
            tables.push(table);
        }
    }

    let targets = input
        .target_ids
        .iter()
        .filter_map(|id| input.members.iter().find(|m| &m.id == id))
        .map(|member| summarise_target(member, &tables))
        .collect();

    let output = PeerRankingOutput {
        peer_group: input.peer_group.clone(),
        as_of: input.as_of,
        member_count: input.members.len(),
        tables,
        targets,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Peer Percentile Ranking (rank 1 = best; percentile 1-100; equal-count quartiles and deciles)",
        &serde_json::json!({
            "peer_group": input.peer_group,
            "as_of": input.as_of.to_string(),
            "frequency": input.frequency,
            "risk_free_rate": input.risk_free_rate.to_string(),
            "tie_break": config.tie_break,
            "seed": config.seed,
            "outlier_policy": config.outlier_policy,
            "min_peers": config.min_peers,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn rank_table(input: &PeerRankingInput, horizon: Horizon, metric: PeerMetric) -> RankingTable {
    let config = &input.ranking;
    let mut values: Vec<(String, Decimal)> = Vec::new();
    let mut excluded = Vec::new();

    for m in &input.members {
        if horizon == Horizon::InceptionToDate
            && m.through(input.as_of).len() < config.min_observations
        {
            excluded.push(ExcludedMember {
                id: m.id.clone(),
                reason: ExclusionReason::BelowMinimumTrackRecord,
            });
            continue;
        }
        match metric.compute(m, horizon, input.as_of, input.frequency, input.risk_free_rate) {
            Ok(v) => values.push((m.id.clone(), v)),
            Err(reason) => excluded.push(ExcludedMember {
                id: m.id.clone(),
                reason,
            }),
        }
    }

    let direction = metric.direction();
    let ranked = rank_members(&values, direction, config);
    let raw: Vec<Decimal> = values.iter().map(|(_, v)| *v).collect();
    let statistics = peer_statistics(&raw, &config.outlier_policy);

    let benchmark = input.benchmark.as_ref().and_then(|b| {
        metric
            .compute(b, horizon, input.as_of, input.frequency, input.risk_free_rate)
            .ok()
            .map(|value| BenchmarkPosition {
                id: b.id.clone(),
                value,
                percentile: (raw.len() >= config.min_peers)
                    .then(|| percentile_among(value, &raw, direction)),
            })
    });

    RankingTable {
        horizon,
        metric,
        direction,
        ranked,
        excluded,
        statistics,
        benchmark,
    }
}

fn summarise_target(member: &ReturnSeries, tables: &[RankingTable]) -> TargetSummary {
    let positions = tables
        .iter()
        .map(|t| {
            let by_id: HashMap<&str, &RankedMember> =
                t.ranked.iter().map(|r| (r.id.as_str(), r)).collect();
            let hit = by_id.get(member.id.as_str());
            let median = t.statistics.as_ref().map(|s| s.median);
            TargetPosition {
                horizon: t.horizon,
                metric: t.metric,
                value: hit.map(|r| r.value),
                rank: hit.map(|r| r.rank),
                ranked_count: t.ranked.len(),
                percentile: hit.and_then(|r| r.percentile),
                quartile: hit.and_then(|r| r.quartile),
                decile: hit.and_then(|r| r.decile),
                vs_median: match (hit, median) {
                    (Some(r), Some(m)) => Some(r.value - m),
                    _ => None,
                },
            }
        })
        .collect();
    TargetSummary {
        id: member.id.clone(),
        name: member.name.clone(),
        classification: member.classification.clone(),
        positions,
    }
}
