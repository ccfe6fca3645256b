//! Percentile ranking, quantile binning and peer-distribution statistics.
//!
//! Conventions used throughout the crate:
//!
//! - **Rank 1 is best.** Direction decides whether best means highest
//!   (returns, Sharpe) or lowest (volatility, drawdown).
//! - **Percentile 1 is best, 100 is worst**: `1 + 99 * (rank - 1) / (n - 1)`.
//! - **Bin 1 is best.** Quartile 1 is the top quarter of the peer group.
//!
//! Binning is equal-count on ordinal ranks, so bins differ in size by at
//! most one member. Ties that would otherwise make equal-count bins
//! impossible are separated with [`TieBreak::First`] or
//! [`TieBreak::Jitter`]; jitter draws one random key per member from a
//! seeded generator and uses it only to order tied values, so the metric
//! values themselves are never perturbed and the same seed always gives
//! the same ranking.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;
use crate::stats::{mean, quantile};
use crate::types::{OutlierPolicy, RankDirection, TieBreak};

// ---------------------------------------------------------------------------
// Ranks
// ---------------------------------------------------------------------------

/// Rank `values` best-first. Ranks are 1-based and fractional only under
/// [`TieBreak::Average`].
pub fn rank_values(
    values: &[Decimal],
    direction: RankDirection,
    tie_break: TieBreak,
    seed: u64,
) -> Vec<Decimal> {
    let n = values.len();
    let better = |a: &Decimal, b: &Decimal| match direction {
        RankDirection::HigherIsBetter => b.cmp(a),
        RankDirection::LowerIsBetter => a.cmp(b),
    };

    let jitter: Vec<u64> = match tie_break {
        TieBreak::Jitter => {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..n).map(|_| rng.gen::<u64>()).collect()
        }
        _ => Vec::new(),
    };

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        better(&values[a], &values[b]).then_with(|| match tie_break {
            TieBreak::Jitter => jitter[a].cmp(&jitter[b]).then(a.cmp(&b)),
            _ => a.cmp(&b),
        })
    });

    let mut ranks = vec![Decimal::ZERO; n];
    match tie_break {
        TieBreak::First | TieBreak::Jitter => {
            for (pos, &idx) in order.iter().enumerate() {
                ranks[idx] = Decimal::from((pos + 1) as i64);
            }
        }
        TieBreak::Average | TieBreak::Min | TieBreak::Max => {
            let mut i = 0;
            while i < n {
                let mut j = i + 1;
                while j < n && values[order[j]] == values[order[i]] {
                    j += 1;
                }
                // Positions i+1 ..= j share one rank
                let rank = match tie_break {
                    TieBreak::Average => Decimal::from((i + 1 + j) as i64) / dec!(2),
                    TieBreak::Min => Decimal::from((i + 1) as i64),
                    _ => Decimal::from(j as i64),
                };
                for &idx in &order[i..j] {
                    ranks[idx] = rank;
                }
                i = j;
            }
        }
    }
    ranks
}

/// Percentile (1 = best, 100 = worst) of `rank` in a group of `n`.
pub fn percentile_from_rank(rank: Decimal, n: usize) -> u32 {
    if n <= 1 {
        return 1;
    }
    let pct = Decimal::ONE + dec!(99) * (rank - Decimal::ONE) / Decimal::from((n - 1) as i64);
    pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(100)
        .clamp(1, 100)
}

/// Equal-count bin (1 = best) of `rank` in a group of `n` split into `bins`.
pub fn bin_from_rank(rank: Decimal, n: usize, bins: u32) -> u32 {
    if n == 0 || bins == 0 {
        return 1;
    }
    let raw = (rank - Decimal::ONE) * Decimal::from(bins) / Decimal::from(n as i64);
    let bin = raw.floor().to_u32().unwrap_or(0) + 1;
    bin.clamp(1, bins)
}

/// Percentile a value would hold if inserted into `peers`, counting only
/// strictly better peers ahead of it. Used to place a benchmark.
pub fn percentile_among(value: Decimal, peers: &[Decimal], direction: RankDirection) -> u32 {
    let better = peers
        .iter()
        .filter(|p| match direction {
            RankDirection::HigherIsBetter => *p > &value,
            RankDirection::LowerIsBetter => *p < &value,
        })
        .count();
    percentile_from_rank(Decimal::from((better + 1) as i64), peers.len() + 1)
}

// ---------------------------------------------------------------------------
// Ranked members
// ---------------------------------------------------------------------------

/// One member of a ranked peer group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMember {
    pub id: String,
    pub value: Decimal,
    pub rank: Decimal,
    /// `None` when the group is below the minimum peer count
    pub percentile: Option<u32>,
    pub quartile: Option<u32>,
    pub decile: Option<u32>,
}

/// Rank `(id, value)` pairs and attach percentile, quartile and decile.
///
/// The result is ordered best-first.
pub fn rank_members(
    members: &[(String, Decimal)],
    direction: RankDirection,
    config: &RankingConfig,
) -> Vec<RankedMember> {
    let values: Vec<Decimal> = members.iter().map(|(_, v)| *v).collect();
    let ranks = rank_values(&values, direction, config.tie_break, config.seed);
    let n = members.len();
    let scored = n >= config.min_peers;

    let mut ranked: Vec<RankedMember> = members
        .iter()
        .zip(ranks)
        .map(|((id, value), rank)| RankedMember {
            id: id.clone(),
            value: *value,
            rank,
            percentile: scored.then(|| percentile_from_rank(rank, n)),
            quartile: scored.then(|| bin_from_rank(rank, n, 4)),
            decile: scored.then(|| bin_from_rank(rank, n, 10)),
        })
        .collect();
    ranked.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));
    ranked
}

// ---------------------------------------------------------------------------
// Outliers and peer statistics
// ---------------------------------------------------------------------------

/// Apply `policy` to a peer distribution. Returns the adjusted values and
/// how many were dropped (trim) or clamped (winsorize).
pub fn apply_outlier_policy(values: &[Decimal], policy: &OutlierPolicy) -> (Vec<Decimal>, usize) {
    let mut sorted = values.to_vec();
    sorted.sort();
    let bounds = |lower: Decimal, upper: Decimal| {
        (
            quantile(&sorted, lower).unwrap_or_default(),
            quantile(&sorted, upper).unwrap_or_default(),
        )
    };
    match *policy {
        OutlierPolicy::None => (values.to_vec(), 0),
        _ if values.is_empty() => (Vec::new(), 0),
        OutlierPolicy::Trim { lower, upper } => {
            let (lo, hi) = bounds(lower, upper);
            let kept: Vec<Decimal> = values
                .iter()
                .copied()
                .filter(|v| *v >= lo && *v <= hi)
                .collect();
            let dropped = values.len() - kept.len();
            (kept, dropped)
        }
        OutlierPolicy::Winsorize { lower, upper } => {
            let (lo, hi) = bounds(lower, upper);
            let mut clamped = 0;
            let adjusted: Vec<Decimal> = values
                .iter()
                .map(|v| {
                    let c = (*v).max(lo).min(hi);
                    if c != *v {
                        clamped += 1;
                    }
                    c
                })
                .collect();
            (adjusted, clamped)
        }
    }
}

/// Summary of a peer distribution after outlier treatment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerStatistics {
    /// Members after outlier treatment
    pub count: usize,
    /// Members dropped or clamped by the outlier policy
    pub adjusted: usize,
    pub mean: Decimal,
    pub median: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub p5: Decimal,
    pub p25: Decimal,
    pub p75: Decimal,
    pub p95: Decimal,
}

pub fn peer_statistics(values: &[Decimal], policy: &OutlierPolicy) -> Option<PeerStatistics> {
    let (adjusted_values, adjusted) = apply_outlier_policy(values, policy);
    let mut sorted = adjusted_values;
    sorted.sort();
    let q = |p: Decimal| quantile(&sorted, p);
    Some(PeerStatistics {
        count: sorted.len(),
        adjusted,
        mean: mean(&sorted),
        median: q(dec!(0.5))?,
        min: *sorted.first()?,
        max: *sorted.last()?,
        p5: q(dec!(0.05))?,
        p25: q(dec!(0.25))?,
        p75: q(dec!(0.75))?,
        p95: q(dec!(0.95))?,
    })
}
