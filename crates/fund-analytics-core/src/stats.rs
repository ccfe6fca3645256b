//! Decimal statistics shared by every report.
//!
//! All functions are total: degenerate inputs (empty slices, a single
//! observation, zero variance) return zero or `None` instead of erroring,
//! and callers decide whether that is worth a warning.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Moments
// ---------------------------------------------------------------------------

pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().sum();
    sum / Decimal::from(values.len() as i64)
}

/// Sample variance (n-1 denominator)
pub fn sample_variance(data: &[Decimal], mean: Decimal) -> Decimal {
    let n = data.len();
    if n < 2 {
        return Decimal::ZERO;
    }
    let sum_sq: Decimal = data.iter().map(|x| (x - mean) * (x - mean)).sum();
    sum_sq / Decimal::from((n - 1) as i64)
}

pub fn sample_std_dev(data: &[Decimal]) -> Decimal {
    sqrt_decimal(sample_variance(data, mean(data)))
}

/// Covariance between two series (sample, n-1)
pub fn covariance(x: &[Decimal], y: &[Decimal], x_mean: Decimal, y_mean: Decimal) -> Decimal {
    let n = x.len().min(y.len());
    if n < 2 {
        return Decimal::ZERO;
    }
    let sum: Decimal = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum();
    sum / Decimal::from((n - 1) as i64)
}

/// Pearson correlation; `None` when either side has no variance.
pub fn correlation(x: &[Decimal], y: &[Decimal]) -> Option<Decimal> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let sx = sqrt_decimal(sample_variance(x, mx));
    let sy = sqrt_decimal(sample_variance(y, my));
    if sx.is_zero() || sy.is_zero() {
        return None;
    }
    let r = covariance(x, y, mx, my) / (sx * sy);
    Some(r.max(dec!(-1)).min(Decimal::ONE))
}

pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

/// Geometrically linked return: Π(1 + r) - 1
pub fn compound_return(returns: &[Decimal]) -> Decimal {
    returns
        .iter()
        .fold(Decimal::ONE, |acc, r| acc * (Decimal::ONE + r))
        - Decimal::ONE
}

/// Annualise a cumulative return earned over `periods` observations.
///
/// Spans shorter than a year are returned as-is rather than extrapolated.
pub fn annualise_compound(total: Decimal, periods: usize, periods_per_year: usize) -> Decimal {
    if periods == 0 || periods < periods_per_year {
        return total;
    }
    let growth = Decimal::ONE + total;
    if growth <= Decimal::ZERO {
        return dec!(-1);
    }
    let exponent = Decimal::from(periods_per_year as i64) / Decimal::from(periods as i64);
    match growth.checked_powd(exponent) {
        Some(g) => g - Decimal::ONE,
        None => total,
    }
}

/// Maximum peak-to-trough decline of the compounded wealth path, positive.
///
/// Wealth is tracked relative to its running peak, so long winning runs
/// never grow the intermediate products.
pub fn max_drawdown(returns: &[Decimal]) -> Decimal {
    let mut from_peak = Decimal::ONE;
    let mut max_dd = Decimal::ZERO;

    for r in returns {
        from_peak = (from_peak * (Decimal::ONE + r)).min(Decimal::ONE);
        max_dd = max_dd.max(Decimal::ONE - from_peak);
    }
    max_dd
}

/// Downside deviation: root mean square of shortfalls below `target`
pub fn downside_deviation(returns: &[Decimal], target: Decimal) -> Decimal {
    let n = returns.len();
    if n == 0 {
        return Decimal::ZERO;
    }
    let sum_sq: Decimal = returns
        .iter()
        .map(|r| {
            let diff = r - target;
            if diff < Decimal::ZERO {
                diff * diff
            } else {
                Decimal::ZERO
            }
        })
        .sum();
    sqrt_decimal(sum_sq / Decimal::from(n as i64))
}

// ---------------------------------------------------------------------------
// Order statistics
// ---------------------------------------------------------------------------

/// Quantile of an ascending-sorted slice with linear interpolation between
/// closest ranks. `q` is clamped to [0, 1].
pub fn quantile(sorted: &[Decimal], q: Decimal) -> Option<Decimal> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }
    let q = q.max(Decimal::ZERO).min(Decimal::ONE);
    let pos = q * Decimal::from((n - 1) as i64);
    let lo = pos.floor();
    let frac = pos - lo;
    let lo_idx = lo.to_usize().unwrap_or(0).min(n - 1);
    let hi_idx = (lo_idx + 1).min(n - 1);
    Some(sorted[lo_idx] + (sorted[hi_idx] - sorted[lo_idx]) * frac)
}

pub fn median(values: &[Decimal]) -> Option<Decimal> {
    let mut sorted = values.to_vec();
    sorted.sort();
    quantile(&sorted, dec!(0.5))
}

/// 1-based ascending ranks; tied values receive the average of their ranks.
pub fn average_ranks(values: &[Decimal]) -> Vec<Decimal> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| values[a].cmp(&values[b]));

    let mut ranks = vec![Decimal::ZERO; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && values[indices[j]] == values[indices[i]] {
            j += 1;
        }
        let avg_rank = Decimal::from((i + 1 + j) as i64) / dec!(2);
        for &idx in &indices[i..j] {
            ranks[idx] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Spearman rank correlation; `None` below three pairs or with no variance.
pub fn spearman(x: &[Decimal], y: &[Decimal]) -> Option<Decimal> {
    if x.len() != y.len() || x.len() < 3 {
        return None;
    }
    correlation(&average_ranks(x), &average_ranks(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_return() {
        // 1.1 * 0.9 - 1 = -0.01
        assert_eq!(compound_return(&[dec!(0.10), dec!(-0.10)]), dec!(-0.01));
        assert_eq!(compound_return(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_annualise_two_years() {
        // 21% over 24 months => 10% a year
        let ann = annualise_compound(dec!(0.21), 24, 12);
        assert!((ann - dec!(0.10)).abs() < dec!(0.000001), "got {}", ann);
    }

    #[test]
    fn test_annualise_short_span_not_extrapolated() {
        assert_eq!(annualise_compound(dec!(0.05), 6, 12), dec!(0.05));
    }

    #[test]
    fn test_max_drawdown() {
        let dd = max_drawdown(&[dec!(0.10), dec!(-0.20), dec!(0.05), dec!(-0.10)]);
        // Peak 1.1, trough 0.8316 => ~24.4%
        assert!(dd > dec!(0.24) && dd < dec!(0.25));
    }

    #[test]
    fn test_max_drawdown_after_long_rally() {
        // 1001^40 is far beyond Decimal's range; only the fall from the peak matters
        let mut returns = vec![dec!(1000); 40];
        returns.push(dec!(-0.5));
        assert_eq!(max_drawdown(&returns), dec!(0.5));
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [dec!(1), dec!(2), dec!(3), dec!(4)];
        assert_eq!(quantile(&sorted, dec!(0.5)), Some(dec!(2.5)));
        assert_eq!(quantile(&sorted, dec!(0)), Some(dec!(1)));
        assert_eq!(quantile(&sorted, dec!(1)), Some(dec!(4)));
        // pos = 0.25 * 3 = 0.75
        assert_eq!(quantile(&sorted, dec!(0.25)), Some(dec!(1.75)));
        assert_eq!(quantile(&[], dec!(0.5)), None);
    }

    #[test]
    fn test_average_ranks_ties() {
        let ranks = average_ranks(&[dec!(3), dec!(1), dec!(3), dec!(2)]);
        assert_eq!(ranks, vec![dec!(3.5), dec!(1), dec!(3.5), dec!(2)]);
    }

    #[test]
    fn test_spearman_perfect_and_inverse() {
        let x = [dec!(1), dec!(2), dec!(3), dec!(4)];
        let y = [dec!(10), dec!(20), dec!(30), dec!(40)];
        let z = [dec!(4), dec!(3), dec!(2), dec!(1)];
        assert!((spearman(&x, &y).unwrap() - Decimal::ONE).abs() < dec!(0.0000001));
        assert!((spearman(&x, &z).unwrap() + Decimal::ONE).abs() < dec!(0.0000001));
        assert_eq!(spearman(&x[..2], &y[..2]), None);
    }

    #[test]
    fn test_correlation_no_variance() {
        assert_eq!(correlation(&[dec!(1), dec!(1)], &[dec!(1), dec!(2)]), None);
    }

    #[test]
    fn test_downside_deviation_ignores_gains() {
        assert_eq!(downside_deviation(&[dec!(0.05), dec!(0.02)], Decimal::ZERO), Decimal::ZERO);
    }
}
