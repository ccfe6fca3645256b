use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::FundAnalyticsError;
use crate::types::*;
use crate::FundAnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Listing {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    /// Strategy, sector or other grouping
    pub bucket: String,
    pub listing: Listing,
    /// Share of NAV; negative for shorts
    pub weight: Decimal,
    #[serde(rename = "return")]
    pub period_return: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAttributionInput {
    #[serde(default)]
    pub period: Option<String>,
    pub positions: Vec<Position>,
    /// Return earned on the uninvested residual
    #[serde(default)]
    pub cash_return: Rate,
    /// Reported fund return, reconciled against the summed contributions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fund_return: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionContribution {
    pub name: String,
    pub bucket: String,
    pub listing: Listing,
    pub weight: Decimal,
    pub period_return: Rate,
    pub contribution: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupContribution {
    pub group: String,
    pub positions: usize,
    pub weight: Decimal,
    pub contribution: Rate,
    /// Contribution over weight; `None` for a zero net weight
    pub group_return: Option<Rate>,
    /// Share of total position contribution
    pub share_of_total: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAttributionOutput {
    pub period: Option<String>,
    pub positions: Vec<PositionContribution>,
    pub by_bucket: Vec<GroupContribution>,
    pub by_listing: Vec<GroupContribution>,
    pub invested_weight: Decimal,
    pub cash_weight: Decimal,
    pub cash_contribution: Rate,
    /// Position contributions plus cash
    pub total_contribution: Rate,
    /// Reported fund return minus the total, when a fund return is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unexplained: Option<Rate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Contribution to return by position, bucket and listing.
pub fn position_based_attribution(
    input: &PositionAttributionInput,
) -> FundAnalyticsResult<ComputationOutput<PositionAttributionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.positions.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "positions".into(),
            reason: "At least one position is required".into(),
        });
    }
    for (i, p) in input.positions.iter().enumerate() {
        if p.name.trim().is_empty() {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("positions[{}].name", i),
                reason: "Position name must not be empty".into(),
            });
        }
        if p.period_return < dec!(-1) {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("positions[{}].return", i),
                reason: format!("Return {} is below -100%", p.period_return),
            });
        }
    }

    let positions: Vec<PositionContribution> = input
        .positions
        .iter()
        .map(|p| PositionContribution {
            name: p.name.clone(),
            bucket: p.bucket.clone(),
            listing: p.listing,
            weight: p.weight,
            period_return: p.period_return,
            contribution: p.weight * p.period_return,
        })
        .collect();

    let invested_weight: Decimal = positions.iter().map(|p| p.weight).sum();
    let position_total: Decimal = positions.iter().map(|p| p.contribution).sum();
    let cash_weight = Decimal::ONE - invested_weight;
    if cash_weight < Decimal::ZERO {
        warnings.push(format!(
            "Net position weight {} exceeds NAV; cash residual is negative (leverage)",
            invested_weight
        ));
    }
    let cash_contribution = cash_weight * input.cash_return;
    let total_contribution = position_total + cash_contribution;

    let by_bucket = aggregate(&positions, position_total, |p| p.bucket.clone());
    let by_listing = aggregate(&positions, position_total, |p| match p.listing {
        Listing::Public => "public".to_string(),
        Listing::Private => "private".to_string(),
    });

    let unexplained = input.fund_return.map(|r| r - total_contribution);
    if let Some(u) = unexplained {
        if u.abs() > dec!(0.0005) {
            warnings.push(format!(
                "Position contributions leave {} of the reported return unexplained",
                u.round_dp(6)
            ));
        }
    }
    tracing::debug!(positions = positions.len(), buckets = by_bucket.len(), "position attribution");

    let output = PositionAttributionOutput {
        period: input.period.clone(),
        positions,
        by_bucket,
        by_listing,
        invested_weight,
        cash_weight,
        cash_contribution,
        total_contribution,
        unexplained,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Position-Based Attribution (contribution = weight x return, public/private split)",
        &serde_json::json!({
            "positions": input.positions.len(),
            "cash_return": input.cash_return.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn aggregate(
    positions: &[PositionContribution],
    total: Decimal,
    key: impl Fn(&PositionContribution) -> String,
) -> Vec<GroupContribution> {
    let mut groups: BTreeMap<String, (usize, Decimal, Decimal)> = BTreeMap::new();
    for p in positions {
        let entry = groups.entry(key(p)).or_insert((0, Decimal::ZERO, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += p.weight;
        entry.2 += p.contribution;
    }
    groups
        .into_iter()
        .map(|(group, (count, weight, contribution))| GroupContribution {
            group,
            positions: count,
            weight,
            contribution,
            group_return: (!weight.is_zero()).then(|| contribution / weight),
            share_of_total: (!total.is_zero()).then(|| contribution / total),
        })
        .collect()
}
