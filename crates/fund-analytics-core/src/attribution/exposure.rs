use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::error::FundAnalyticsError;
use crate::types::*;
use crate::FundAnalyticsResult;

const UNCLASSIFIED: &str = "Unclassified";

fn default_top_n() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposurePosition {
    pub name: String,
    #[serde(default)]
    pub long_value: Money,
    /// Magnitude of the short market value
    #[serde(default)]
    pub short_value: Money,
    /// Category per dimension, e.g. `{"sector": "Energy", "region": "EMEA"}`
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureInput {
    pub nav: Money,
    pub positions: Vec<ExposurePosition>,
    /// Dimensions to break down; empty means every dimension present
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

/// Long, short, gross and net exposure, in value and as % of NAV.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exposure {
    pub long: Money,
    pub short: Money,
    pub gross: Money,
    pub net: Money,
    pub long_pct: Decimal,
    pub short_pct: Decimal,
    pub gross_pct: Decimal,
    pub net_pct: Decimal,
}

impl Exposure {
    fn new(long: Money, short: Money, nav: Money) -> Self {
        let pct = |v: Money| v / nav * dec!(100);
        Exposure {
            long,
            short,
            gross: long + short,
            net: long - short,
            long_pct: pct(long),
            short_pct: pct(short),
            gross_pct: pct(long + short),
            net_pct: pct(long - short),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryExposure {
    pub category: String,
    pub positions: usize,
    pub exposure: Exposure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionBreakdown {
    pub dimension: String,
    /// Largest gross exposure first
    pub categories: Vec<CategoryExposure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConcentration {
    pub name: String,
    pub gross: Money,
    pub gross_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureOutput {
    pub nav: Money,
    pub totals: Exposure,
    pub breakdowns: Vec<DimensionBreakdown>,
    pub top_positions: Vec<PositionConcentration>,
    /// Gross exposure of the top-N positions as % of NAV
    pub top_n_gross_pct: Decimal,
    /// Share of total gross exposure held in the top-N positions
    pub top_n_share_of_gross: Decimal,
}

/// Long/short exposure by category and position concentration.
pub fn exposure_breakdown(
    input: &ExposureInput,
) -> FundAnalyticsResult<ComputationOutput<ExposureOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.nav <= Decimal::ZERO {
        return Err(FundAnalyticsError::InvalidInput {
            field: "nav".into(),
            reason: "NAV must be positive".into(),
        });
    }
    if input.positions.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "positions".into(),
            reason: "At least one position is required".into(),
        });
    }
    for (i, p) in input.positions.iter().enumerate() {
        if p.long_value < Decimal::ZERO || p.short_value < Decimal::ZERO {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("positions[{}]", i),
                reason: format!(
                    "'{}': long and short values are magnitudes and must be non-negative",
                    p.name
                ),
            });
        }
    }
    if input.top_n == 0 {
        return Err(FundAnalyticsError::InvalidInput {
            field: "top_n".into(),
            reason: "top_n must be at least 1".into(),
        });
    }

    let nav = input.nav;
    let long: Money = input.positions.iter().map(|p| p.long_value).sum();
    let short: Money = input.positions.iter().map(|p| p.short_value).sum();
    let totals = Exposure::new(long, short, nav);
    if totals.gross_pct > dec!(300) {
        warnings.push(format!("Gross exposure is {}% of NAV", totals.gross_pct.round_dp(1)));
    }

    let dimensions: Vec<String> = if input.dimensions.is_empty() {
        input
            .positions
            .iter()
            .flat_map(|p| p.categories.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        input.dimensions.clone()
    };

    let breakdowns: Vec<DimensionBreakdown> = dimensions
        .iter()
        .map(|dim| {
            let mut groups: BTreeMap<&str, (usize, Money, Money)> = BTreeMap::new();
            for p in &input.positions {
                let category = p.categories.get(dim).map_or(UNCLASSIFIED, String::as_str);
                let entry = groups.entry(category).or_insert((0, Decimal::ZERO, Decimal::ZERO));
                entry.0 += 1;
                entry.1 += p.long_value;
                entry.2 += p.short_value;
            }
            let mut categories: Vec<CategoryExposure> = groups
                .into_iter()
                .map(|(category, (count, l, s))| CategoryExposure {
                    category: category.to_string(),
                    positions: count,
                    exposure: Exposure::new(l, s, nav),
                })
                .collect();
            categories.sort_by(|a, b| {
                b.exposure
                    .gross
                    .cmp(&a.exposure.gross)
                    .then_with(|| a.category.cmp(&b.category))
            });
            DimensionBreakdown {
                dimension: dim.clone(),
                categories,
            }
        })
        .collect();

    for b in &breakdowns {
        if let Some(u) = b.categories.iter().find(|c| c.category == UNCLASSIFIED) {
            warnings.push(format!(
                "{} positions have no '{}' classification",
                u.positions, b.dimension
            ));
        }
    }

    let mut by_gross: Vec<PositionConcentration> = input
        .positions
        .iter()
        .map(|p| {
            let gross = p.long_value + p.short_value;
            PositionConcentration {
                name: p.name.clone(),
                gross,
                gross_pct: gross / nav * dec!(100),
            }
        })
        .collect();
    by_gross.sort_by(|a, b| b.gross.cmp(&a.gross).then_with(|| a.name.cmp(&b.name)));
    by_gross.truncate(input.top_n);
    let top_gross: Money = by_gross.iter().map(|p| p.gross).sum();

    tracing::debug!(dimensions = breakdowns.len(), positions = input.positions.len(), "exposure breakdown");

    let output = ExposureOutput {
        nav,
        top_n_gross_pct: top_gross / nav * dec!(100),
        top_n_share_of_gross: if totals.gross.is_zero() {
            Decimal::ZERO
        } else {
            top_gross / totals.gross
        },
        totals,
        breakdowns,
        top_positions: by_gross,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Exposure Breakdown (long, short, gross and net as % of NAV)",
        &serde_json::json!({
            "nav": nav.to_string(),
            "dimensions": dimensions,
            "top_n": input.top_n,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(name: &str, long: Decimal, short: Decimal, sector: Option<&str>) -> ExposurePosition {
        let mut categories = BTreeMap::new();
        if let Some(s) = sector {
            categories.insert("sector".to_string(), s.to_string());
        }
        categories.insert("region".to_string(), "US".to_string());
        ExposurePosition {
            name: name.into(),
            long_value: long,
            short_value: short,
            categories,
        }
    }

    fn input() -> ExposureInput {
        ExposureInput {
            nav: dec!(1000),
            positions: vec![
                position("XOM", dec!(300), dec!(0), Some("Energy")),
                position("CVX", dec!(0), dec!(100), Some("Energy")),
                position("AAPL", dec!(400), dec!(0), Some("Tech")),
                position("MSFT", dec!(0), dec!(250), Some("Tech")),
            ],
            dimensions: vec![],
            top_n: 2,
        }
    }

    #[test]
    fn test_totals() {
        let out = exposure_breakdown(&input()).unwrap().result;
        assert_eq!(out.totals.long, dec!(700));
        assert_eq!(out.totals.short, dec!(350));
        assert_eq!(out.totals.gross_pct, dec!(105));
        assert_eq!(out.totals.net_pct, dec!(35));
    }

    #[test]
    fn test_sector_breakdown_sorted_by_gross() {
        let out = exposure_breakdown(&input()).unwrap().result;
        let dims: Vec<&str> = out.breakdowns.iter().map(|b| b.dimension.as_str()).collect();
        assert_eq!(dims, vec!["region", "sector"]);
        let sector = &out.breakdowns[1];
        assert_eq!(sector.categories[0].category, "Tech");
        assert_eq!(sector.categories[0].exposure.net, dec!(150));
        assert_eq!(sector.categories[1].exposure.gross_pct, dec!(40));
    }

    #[test]
    fn test_top_n_concentration() {
        let out = exposure_breakdown(&input()).unwrap().result;
        let names: Vec<&str> = out.top_positions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "XOM"]);
        assert_eq!(out.top_n_gross_pct, dec!(70));
        assert_eq!(out.top_n_share_of_gross, dec!(700) / dec!(1050));
    }

    #[test]
    fn test_unclassified_bucket() {
        let mut inp = input();
        inp.positions.push(position("GLD", dec!(50), dec!(0), None));
        inp.dimensions = vec!["sector".into()];
        let out = exposure_breakdown(&inp).unwrap();
        let cats = &out.result.breakdowns[0].categories;
        assert!(cats.iter().any(|c| c.category == UNCLASSIFIED && c.positions == 1));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_non_positive_nav_rejected() {
        let mut inp = input();
        inp.nav = Decimal::ZERO;
        assert!(exposure_breakdown(&inp).is_err());
    }

    #[test]
    fn test_negative_short_rejected() {
        let mut inp = input();
        inp.positions[1].short_value = dec!(-100);
        assert!(exposure_breakdown(&inp).is_err());
    }
}
