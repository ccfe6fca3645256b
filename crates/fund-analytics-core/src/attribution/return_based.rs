use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::error::FundAnalyticsError;
use crate::stats::{mean, sqrt_decimal};
use crate::types::*;
use crate::FundAnalyticsResult;

/// Below this many observations the regression is run but flagged.
const RECOMMENDED_OBSERVATIONS: usize = 24;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnAttributionInput {
    pub fund: ReturnSeries,
    /// Factor return series; each series id names the factor
    pub factors: Vec<ReturnSeries>,
    /// Annual rate, de-annualised per period before regression
    #[serde(default)]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    /// Confidence level for significance flags (default 0.95)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorLoading {
    pub factor: String,
    pub beta: Decimal,
    pub std_error: Decimal,
    pub t_stat: Decimal,
    pub p_value: Decimal,
    pub significant: bool,
    /// Mean factor return per period
    pub mean_return: Decimal,
    /// Annualised contribution: beta * mean factor return * periods per year
    pub contribution: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnAttributionOutput {
    pub fund_id: String,
    pub observations: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Intercept per period
    pub alpha: Decimal,
    /// Arithmetic annualisation of the intercept
    pub alpha_annualised: Decimal,
    pub alpha_t_stat: Decimal,
    pub alpha_significant: bool,
    pub loadings: Vec<FactorLoading>,
    pub r_squared: Decimal,
    pub adjusted_r_squared: Decimal,
    /// Annualised standard error of the regression
    pub residual_volatility: Decimal,
    /// Annualised mean excess return of the fund
    pub total_excess_return: Decimal,
    pub alpha_contribution: Decimal,
    /// Excess return left after alpha and factor contributions
    pub residual_contribution: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Regress fund excess returns on factor returns (OLS, normal equations).
pub fn return_based_attribution(
    input: &ReturnAttributionInput,
) -> FundAnalyticsResult<ComputationOutput<ReturnAttributionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.fund.validate()?;
    if input.factors.is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "factors".into(),
            reason: "At least one factor series is required".into(),
        });
    }
    for f in &input.factors {
        f.validate()?;
    }
    let confidence = input.confidence_level.unwrap_or(dec!(0.95));
    if confidence <= Decimal::ZERO || confidence >= Decimal::ONE {
        return Err(FundAnalyticsError::InvalidInput {
            field: "confidence_level".into(),
            reason: "Confidence level must be between 0 and 1".into(),
        });
    }

    // Align on dates every series reports
    let factor_maps: Vec<HashMap<NaiveDate, Decimal>> = input
        .factors
        .iter()
        .map(|f| f.observations.iter().map(|o| (o.date, o.value)).collect())
        .collect();
    let mut dates = Vec::new();
    let mut y = Vec::new();
    let mut x = Vec::new();
    let rf_period = input.risk_free_rate / input.frequency.periods_per_year();
    for obs in &input.fund.observations {
        let row: Option<Vec<Decimal>> = factor_maps.iter().map(|m| m.get(&obs.date).copied()).collect();
        if let Some(factors) = row {
            let mut design = Vec::with_capacity(factors.len() + 1);
            design.push(Decimal::ONE);
            design.extend(factors);
            dates.push(obs.date);
            y.push(obs.value - rf_period);
            x.push(design);
        }
    }

    let n = y.len();
    let k = input.factors.len();
    if n < k + 2 {
        return Err(FundAnalyticsError::InsufficientData(format!(
            "{} common observations for {} factors; at least {} required",
            n,
            k,
            k + 2
        )));
    }
    if n < RECOMMENDED_OBSERVATIONS {
        warnings.push(format!(
            "Only {} observations; estimates below {} are unstable",
            n, RECOMMENDED_OBSERVATIONS
        ));
    }
    let dropped = input.fund.len() - n;
    if dropped > 0 {
        warnings.push(format!(
            "{} fund observations without matching factor data were dropped",
            dropped
        ));
    }

    // beta = (X'X)^-1 X'y
    let xt = mat_transpose(&x);
    let xtx = mat_multiply(&xt, &x);
    let xtx_inv = mat_inverse(&xtx).ok_or_else(|| FundAnalyticsError::SingularSystem {
        context: "OLS normal equations (collinear factors)".into(),
    })?;
    let beta = mat_vec_multiply(&xtx_inv, &mat_vec_multiply(&xt, &y));

    let y_mean = mean(&y);
    let mut ss_res = Decimal::ZERO;
    let mut ss_tot = Decimal::ZERO;
    for (row, yi) in x.iter().zip(&y) {
        let fitted: Decimal = row.iter().zip(&beta).map(|(a, b)| *a * *b).sum();
        let e = *yi - fitted;
        ss_res += e * e;
        ss_tot += (*yi - y_mean) * (*yi - y_mean);
    }

    let n_dec = Decimal::from(n as i64);
    let k_dec = Decimal::from(k as i64);
    let r_squared = if ss_tot.is_zero() {
        Decimal::ONE
    } else {
        Decimal::ONE - ss_res / ss_tot
    };
    let adjusted_r_squared = if ss_tot.is_zero() {
        r_squared
    } else {
        Decimal::ONE - (Decimal::ONE - r_squared) * (n_dec - Decimal::ONE) / (n_dec - k_dec - Decimal::ONE)
    };

    let dof = (n - k - 1) as i64;
    let sigma_sq = ss_res / Decimal::from(dof);
    let t_critical = t_critical_value(confidence, dof);
    let ppy = input.frequency.periods_per_year();

    let t_stat = |coef: Decimal, se: Decimal| if se.is_zero() { Decimal::ZERO } else { coef / se };

    let alpha = beta[0];
    let alpha_se = sqrt_decimal(sigma_sq * xtx_inv[0][0]);
    let alpha_t_stat = t_stat(alpha, alpha_se);

    let loadings: Vec<FactorLoading> = input
        .factors
        .iter()
        .enumerate()
        .map(|(j, f)| {
            let b = beta[j + 1];
            let se = sqrt_decimal(sigma_sq * xtx_inv[j + 1][j + 1]);
            let t = t_stat(b, se);
            let factor_mean = mean(&x.iter().map(|row| row[j + 1]).collect::<Vec<_>>());
            FactorLoading {
                factor: f.id.clone(),
                beta: b,
                std_error: se,
                t_stat: t,
                p_value: approx_p_value_from_t(t, dof),
                significant: t.abs() > t_critical,
                mean_return: factor_mean,
                contribution: b * factor_mean * ppy,
            }
        })
        .collect();

    let total_excess_return = y_mean * ppy;
    let alpha_contribution = alpha * ppy;
    let factor_total: Decimal = loadings.iter().map(|l| l.contribution).sum();

    if r_squared < dec!(0.3) {
        warnings.push(format!(
            "Low R-squared ({}); the factors explain little of the fund's variance",
            r_squared.round_dp(4)
        ));
    }
    tracing::debug!(fund = %input.fund.id, observations = n, factors = k, "factor regression fitted");

    let output = ReturnAttributionOutput {
        fund_id: input.fund.id.clone(),
        observations: n,
        start_date: dates[0],
        end_date: dates[n - 1],
        alpha,
        alpha_annualised: alpha_contribution,
        alpha_t_stat,
        alpha_significant: alpha_t_stat.abs() > t_critical,
        loadings,
        r_squared,
        adjusted_r_squared,
        residual_volatility: sqrt_decimal(sigma_sq) * sqrt_decimal(ppy),
        total_excess_return,
        alpha_contribution,
        residual_contribution: total_excess_return - alpha_contribution - factor_total,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Return-Based Attribution (OLS on factor returns, normal equations)",
        &serde_json::json!({
            "factors": input.factors.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(),
            "observations": n,
            "frequency": input.frequency,
            "risk_free_rate": input.risk_free_rate.to_string(),
            "confidence_level": confidence.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Matrix helpers
// ---------------------------------------------------------------------------

fn mat_transpose(a: &[Vec<Decimal>]) -> Vec<Vec<Decimal>> {
    if a.is_empty() {
        return Vec::new();
    }
    (0..a[0].len())
        .map(|j| a.iter().map(|row| row[j]).collect())
        .collect()
}

fn mat_multiply(a: &[Vec<Decimal>], b: &[Vec<Decimal>]) -> Vec<Vec<Decimal>> {
    let p = b.len();
    let n = b.first().map_or(0, Vec::len);
    a.iter()
        .map(|row| {
            (0..n)
                .map(|j| (0..p).map(|l| row[l] * b[l][j]).sum())
                .collect()
        })
        .collect()
}

fn mat_vec_multiply(a: &[Vec<Decimal>], v: &[Decimal]) -> Vec<Decimal> {
    a.iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| *a * *b).sum())
        .collect()
}

/// Gauss-Jordan inverse with partial pivoting; `None` when singular.
#[allow(clippy::needless_range_loop)]
fn mat_inverse(a: &[Vec<Decimal>]) -> Option<Vec<Vec<Decimal>>> {
    let n = a.len();
    let mut aug: Vec<Vec<Decimal>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { Decimal::ONE } else { Decimal::ZERO }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by_key(|&r| aug[r][col].abs())?;
        if aug[pivot_row][col].abs() < dec!(0.0000000000000001) {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for j in 0..2 * n {
            aug[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor.is_zero() {
                continue;
            }
            for j in 0..2 * n {
                let update = factor * aug[col][j];
                aug[row][j] -= update;
            }
        }
    }
    Some(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

// ---------------------------------------------------------------------------
// Significance
// ---------------------------------------------------------------------------

/// Two-tailed critical t-value: normal quantile with a small-sample
/// correction `z + (z + z^3) / (4 dof)`.
fn t_critical_value(confidence: Decimal, dof: i64) -> Decimal {
    let z = if confidence >= dec!(0.99) {
        dec!(2.576)
    } else if confidence >= dec!(0.95) {
        dec!(1.960) + (confidence - dec!(0.95)) / dec!(0.04) * dec!(0.616)
    } else if confidence >= dec!(0.90) {
        dec!(1.645) + (confidence - dec!(0.90)) / dec!(0.05) * dec!(0.315)
    } else {
        dec!(1.645)
    };
    if dof >= 120 || dof <= 0 {
        z
    } else {
        z + (z + z * z * z) / (dec!(4) * Decimal::from(dof))
    }
}

/// Two-tailed p-value from a t-statistic via an interpolated normal tail,
/// inflated by `1 + 1 / (2 dof)` for small samples.
fn approx_p_value_from_t(t_stat: Decimal, dof: i64) -> Decimal {
    const TAIL: [(Decimal, Decimal); 11] = [
        (dec!(0.0), dec!(0.5000)),
        (dec!(0.5), dec!(0.3085)),
        (dec!(1.0), dec!(0.1587)),
        (dec!(1.5), dec!(0.0668)),
        (dec!(2.0), dec!(0.0228)),
        (dec!(2.5), dec!(0.0062)),
        (dec!(3.0), dec!(0.0013)),
        (dec!(3.5), dec!(0.0002)),
        (dec!(4.0), dec!(0.00003)),
        (dec!(5.0), dec!(0.000000287)),
        (dec!(6.0), Decimal::ZERO),
    ];
    let z = t_stat.abs();
    let one_tail = TAIL
        .windows(2)
        .find(|w| z >= w[0].0 && z <= w[1].0)
        .map(|w| w[0].1 + (z - w[0].0) / (w[1].0 - w[0].0) * (w[1].1 - w[0].1))
        .unwrap_or(Decimal::ZERO);
    let mut p = dec!(2) * one_tail;
    if dof > 0 && dof < 120 {
        p *= Decimal::ONE + Decimal::ONE / (dec!(2) * Decimal::from(dof));
    }
    p.min(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::monthly;

    fn tol(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.00000001)
    }

    fn market() -> Vec<Decimal> {
        [
            dec!(0.020), dec!(-0.010), dec!(0.015), dec!(0.030), dec!(-0.025), dec!(0.010),
            dec!(0.005), dec!(-0.015), dec!(0.025), dec!(0.000), dec!(0.012), dec!(-0.008),
        ]
        .iter()
        .cycle()
        .take(24)
        .copied()
        .collect()
    }

    fn value_factor() -> Vec<Decimal> {
        (0..24)
            .map(|i| Decimal::from((i * 7) % 5) / dec!(1000) - dec!(0.002))
            .collect()
    }

    fn input(fund: Vec<Decimal>) -> ReturnAttributionInput {
        ReturnAttributionInput {
            fund: monthly("F", 2022, &fund),
            factors: vec![
                monthly("MKT", 2022, &market()),
                monthly("HML", 2022, &value_factor()),
            ],
            risk_free_rate: Decimal::ZERO,
            frequency: ReturnFrequency::Monthly,
            confidence_level: None,
        }
    }

    #[test]
    fn test_recovers_exact_loadings() {
        let fund: Vec<Decimal> = market()
            .iter()
            .zip(value_factor())
            .map(|(m, v)| dec!(0.001) + dec!(1.5) * m + dec!(0.5) * v)
            .collect();
        let out = return_based_attribution(&input(fund)).unwrap().result;
        assert!(tol(out.alpha, dec!(0.001)));
        assert!(tol(out.alpha_annualised, dec!(0.012)));
        assert!(tol(out.loadings[0].beta, dec!(1.5)));
        assert!(tol(out.loadings[1].beta, dec!(0.5)));
        assert!(tol(out.r_squared, Decimal::ONE));
        assert!(tol(out.residual_volatility, Decimal::ZERO));
        assert_eq!(out.observations, 24);
    }

    #[test]
    fn test_contributions_sum_to_excess_return() {
        let noise = [dec!(0.002), dec!(-0.001), dec!(0.0005), dec!(-0.0015)];
        let fund: Vec<Decimal> = market()
            .iter()
            .enumerate()
            .map(|(i, m)| dec!(0.8) * m + noise[i % 4])
            .collect();
        let out = return_based_attribution(&input(fund)).unwrap().result;
        let factors: Decimal = out.loadings.iter().map(|l| l.contribution).sum();
        let total = out.alpha_contribution + factors + out.residual_contribution;
        assert!(tol(total, out.total_excess_return));
        // OLS residuals have zero mean
        assert!(tol(out.residual_contribution, Decimal::ZERO));
        assert!(out.r_squared < Decimal::ONE && out.r_squared > dec!(0.9));
    }

    #[test]
    fn test_too_few_observations() {
        let mut inp = input(market());
        inp.fund.observations.truncate(3);
        assert!(matches!(
            return_based_attribution(&inp),
            Err(FundAnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_short_sample_warns() {
        let fund: Vec<Decimal> = market().iter().map(|m| m * dec!(1.1)).collect();
        let mut inp = input(fund);
        inp.fund.observations.truncate(12);
        let out = return_based_attribution(&inp).unwrap();
        assert_eq!(out.result.observations, 12);
        assert!(out.warnings.iter().any(|w| w.contains("unstable")));
        assert!(!out.warnings.iter().any(|w| w.contains("dropped")));
    }

    #[test]
    fn test_collinear_factors_rejected() {
        let mut inp = input(market());
        inp.factors[1] = monthly("MKT2", 2022, &market());
        assert!(matches!(
            return_based_attribution(&inp),
            Err(FundAnalyticsError::SingularSystem { .. })
        ));
    }

    #[test]
    fn test_risk_free_rate_shifts_alpha() {
        let fund: Vec<Decimal> = market().iter().map(|m| dec!(0.002) + m).collect();
        let mut inp = input(fund);
        inp.risk_free_rate = dec!(0.024);
        let out = return_based_attribution(&inp).unwrap().result;
        // 0.002 - 0.024 / 12
        assert!(tol(out.alpha, Decimal::ZERO));
    }

    #[test]
    fn test_p_value_bounds() {
        assert_eq!(approx_p_value_from_t(Decimal::ZERO, 200), Decimal::ONE);
        assert!(approx_p_value_from_t(dec!(10), 30).is_zero());
    }
}
