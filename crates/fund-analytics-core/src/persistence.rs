//! Persistence of peer rankings across consecutive evaluation periods.
//!
//! Each period is ranked independently and binned; persistence is then
//! measured per fund (how often it stays in the top bins) and for the
//! group (bin transition matrix, repeat-winner rate, rank correlation
//! between consecutive periods).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::RankingConfig;
use crate::error::FundAnalyticsError;
use crate::peer_ranking::{validate_members, PeerMetric};
use crate::performance::trailing::staleness_tolerance;
use crate::ranking::{bin_from_rank, percentile_from_rank, rank_values};
use crate::stats::{mean, spearman};
use crate::types::*;
use crate::FundAnalyticsResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// One evaluation period, dates inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Percentile bins are the finest split persistence reports on.
pub const MAX_BINS: u32 = 100;

fn default_bins() -> u32 {
    4
}

fn default_top_bins() -> u32 {
    1
}

fn default_metric() -> PeerMetric {
    PeerMetric::Return
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceInput {
    pub members: Vec<ReturnSeries>,
    pub periods: Vec<EvaluationPeriod>,
    #[serde(default = "default_metric")]
    pub metric: PeerMetric,
    #[serde(default = "default_bins")]
    pub bins: u32,
    /// Bins counted as a "top" finish, starting from bin 1
    #[serde(default = "default_top_bins")]
    pub top_bins: u32,
    #[serde(default)]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// A fund's placement in one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodPlacement {
    pub period: String,
    pub value: Decimal,
    pub rank: Decimal,
    pub percentile: u32,
    pub bin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundPersistence {
    pub id: String,
    pub name: String,
    /// Bin per period; `None` where the fund was not ranked
    pub bin_history: Vec<Option<u32>>,
    pub placements: Vec<PeriodPlacement>,
    pub periods_ranked: usize,
    pub top_finishes: usize,
    pub persistence_score: Option<Decimal>,
    pub average_percentile: Option<Decimal>,
    pub longest_top_streak: usize,
    /// Share of ranked periods spent in the top half
    pub consistency: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub ranked: usize,
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodCorrelation {
    pub from: String,
    pub to: String,
    pub common_members: usize,
    pub spearman: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPersistence {
    /// `transition_matrix[i][j]`: funds moving from bin i+1 to bin j+1
    pub transition_matrix: Vec<Vec<usize>>,
    pub transitions: usize,
    /// P(top at t+1 | top at t)
    pub stay_top_probability: Option<Decimal>,
    /// Winners (top half) at t that are winners again at t+1
    pub repeat_winner_rate: Option<Decimal>,
    pub correlations: Vec<PeriodCorrelation>,
    pub average_spearman: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceOutput {
    pub metric: PeerMetric,
    pub bins: u32,
    pub top_bins: u32,
    pub periods: Vec<PeriodSummary>,
    pub funds: Vec<FundPersistence>,
    pub group: GroupPersistence,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &PersistenceInput) -> FundAnalyticsResult<()> {
    validate_members(&input.members)?;
    input.ranking.validate()?;
    if input.periods.len() < 2 {
        return Err(FundAnalyticsError::InvalidInput {
            field: "periods".into(),
            reason: "Persistence needs at least two periods".into(),
        });
    }
    for (i, p) in input.periods.iter().enumerate() {
        if p.start > p.end {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("periods[{}]", i),
                reason: format!("Period '{}' starts after it ends", p.label),
            });
        }
        if i > 0 && p.start <= input.periods[i - 1].end {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("periods[{}]", i),
                reason: format!(
                    "Period '{}' overlaps or precedes '{}'",
                    p.label,
                    input.periods[i - 1].label
                ),
            });
        }
    }
    if input.bins < 2 || input.bins > MAX_BINS {
        return Err(FundAnalyticsError::InvalidInput {
            field: "bins".into(),
            reason: format!("bins must be between 2 and {}, got {}", MAX_BINS, input.bins),
        });
    }
    if input.top_bins == 0 || input.top_bins >= input.bins {
        return Err(FundAnalyticsError::InvalidInput {
            field: "top_bins".into(),
            reason: format!("top_bins must be between 1 and {}", input.bins - 1),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Rank each period and measure how persistent the rankings are.
pub fn persistence_analysis(
    input: &PersistenceInput,
) -> FundAnalyticsResult<ComputationOutput<PersistenceOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let config = &input.ranking;
    let bins = input.bins;
    let tolerance = staleness_tolerance(input.frequency);
    let n_members = input.members.len();
    let n_periods = input.periods.len();

    // placements[member][period]
    let mut placements: Vec<Vec<Option<PeriodPlacement>>> = vec![vec![None; n_periods]; n_members];
    let mut period_summaries = Vec::with_capacity(n_periods);

    for (p_idx, period) in input.periods.iter().enumerate() {
        let mut eligible: Vec<(usize, Decimal)> = Vec::new();
        let mut excluded = Vec::new();
        for (m_idx, m) in input.members.iter().enumerate() {
            let obs = m.between(period.start, period.end);
            // Complete data: reporting from the start through the end of the period
            let complete = match (obs.first(), obs.last()) {
                (Some(first), Some(last)) => {
                    first.date - period.start <= tolerance && period.end - last.date <= tolerance
                }
                _ => false,
            };
            let value = if complete {
                input
                    .metric
                    .evaluate(&observation_values(obs), input.risk_free_rate, input.frequency)
                    .ok()
            } else {
                None
            };
            match value {
                Some(v) => eligible.push((m_idx, v)),
                None => excluded.push(m.id.clone()),
            }
        }

        if eligible.len() < config.min_peers {
            warnings.push(format!(
                "Period '{}': only {} members with complete data (minimum {}); period not ranked",
                period.label,
                eligible.len(),
                config.min_peers
            ));
            excluded.extend(eligible.iter().map(|(i, _)| input.members[*i].id.clone()));
            eligible.clear();
        }

        let values: Vec<Decimal> = eligible.iter().map(|(_, v)| *v).collect();
        let ranks = rank_values(&values, input.metric.direction(), config.tie_break, config.seed);
        let n = eligible.len();
        for ((m_idx, value), rank) in eligible.iter().zip(ranks) {
            placements[*m_idx][p_idx] = Some(PeriodPlacement {
                period: period.label.clone(),
                value: *value,
                rank,
                percentile: percentile_from_rank(rank, n),
                bin: bin_from_rank(rank, n, bins),
            });
        }
        tracing::debug!(period = %period.label, ranked = n, excluded = excluded.len(), "period ranked");

        period_summaries.push(PeriodSummary {
            label: period.label.clone(),
            start: period.start,
            end: period.end,
            ranked: n,
            excluded,
        });
    }

    let funds = input
        .members
        .iter()
        .zip(&placements)
        .map(|(m, history)| fund_persistence(m, history, input.top_bins))
        .collect();

    let group = group_persistence(input, &placements);

    let output = PersistenceOutput {
        metric: input.metric,
        bins,
        top_bins: input.top_bins,
        periods: period_summaries,
        funds,
        group,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Ranking Persistence (per-period equal-count bins, transition matrix, Spearman rank correlation)",
        &serde_json::json!({
            "metric": input.metric,
            "bins": bins,
            "top_bins": input.top_bins,
            "tie_break": config.tie_break,
            "seed": config.seed,
            "min_peers": config.min_peers,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn is_top_half(p: &PeriodPlacement) -> bool {
    p.percentile <= 50
}

fn ratio(num: usize, den: usize) -> Option<Decimal> {
    (den > 0).then(|| Decimal::from(num as i64) / Decimal::from(den as i64))
}

fn fund_persistence(
    member: &ReturnSeries,
    history: &[Option<PeriodPlacement>],
    top_bins: u32,
) -> FundPersistence {
    let placed: Vec<&PeriodPlacement> = history.iter().flatten().collect();
    let top_finishes = placed.iter().filter(|p| p.bin <= top_bins).count();
    let top_half = placed.iter().filter(|p| is_top_half(p)).count();

    // An unranked period breaks a streak
    let mut longest = 0;
    let mut current = 0;
    for slot in history {
        match slot {
            Some(p) if p.bin <= top_bins => {
                current += 1;
                longest = longest.max(current);
            }
            _ => current = 0,
        }
    }

    let percentiles: Vec<Decimal> = placed.iter().map(|p| Decimal::from(p.percentile)).collect();

    FundPersistence {
        id: member.id.clone(),
        name: member.name.clone(),
        bin_history: history.iter().map(|s| s.as_ref().map(|p| p.bin)).collect(),
        placements: placed.iter().map(|p| (*p).clone()).collect(),
        periods_ranked: placed.len(),
        top_finishes,
        persistence_score: ratio(top_finishes, placed.len()),
        average_percentile: (!percentiles.is_empty()).then(|| mean(&percentiles)),
        longest_top_streak: longest,
        consistency: ratio(top_half, placed.len()),
    }
}

fn group_persistence(
    input: &PersistenceInput,
    placements: &[Vec<Option<PeriodPlacement>>],
) -> GroupPersistence {
    let bins = input.bins as usize;
    let mut matrix = vec![vec![0usize; bins]; bins];
    let mut transitions = 0;
    let (mut top_then, mut top_stay) = (0, 0);
    let (mut win_then, mut win_again) = (0, 0);
    let mut correlations = Vec::new();

    for t in 0..input.periods.len() - 1 {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for history in placements {
            if let (Some(a), Some(b)) = (&history[t], &history[t + 1]) {
                matrix[(a.bin - 1) as usize][(b.bin - 1) as usize] += 1;
                transitions += 1;
                if a.bin <= input.top_bins {
                    top_then += 1;
                    if b.bin <= input.top_bins {
                        top_stay += 1;
                    }
                }
                if is_top_half(a) {
                    win_then += 1;
                    if is_top_half(b) {
                        win_again += 1;
                    }
                }
                x.push(a.value);
                y.push(b.value);
            }
        }
        correlations.push(PeriodCorrelation {
            from: input.periods[t].label.clone(),
            to: input.periods[t + 1].label.clone(),
            common_members: x.len(),
            spearman: spearman(&x, &y),
        });
    }

    let rhos: Vec<Decimal> = correlations.iter().filter_map(|c| c.spearman).collect();
    GroupPersistence {
        transition_matrix: matrix,
        transitions,
        stay_top_probability: ratio(top_stay, top_then),
        repeat_winner_rate: ratio(win_again, win_then),
        average_spearman: (!rhos.is_empty()).then(|| mean(&rhos)),
        correlations,
    }
}
