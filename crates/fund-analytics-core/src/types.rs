use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FundAnalyticsError;
use crate::FundAnalyticsResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Frequency of return observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFrequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Annual,
}

impl ReturnFrequency {
    /// Number of periods in a year for annualisation
    pub fn periods_per_year(&self) -> Decimal {
        match self {
            ReturnFrequency::Daily => dec!(252),
            ReturnFrequency::Weekly => dec!(52),
            ReturnFrequency::Monthly => dec!(12),
            ReturnFrequency::Quarterly => dec!(4),
            ReturnFrequency::Annual => dec!(1),
        }
    }

    /// Integer form of `periods_per_year`, used to size look-back windows.
    pub fn periods_per_year_usize(&self) -> usize {
        match self {
            ReturnFrequency::Daily => 252,
            ReturnFrequency::Weekly => 52,
            ReturnFrequency::Monthly => 12,
            ReturnFrequency::Quarterly => 4,
            ReturnFrequency::Annual => 1,
        }
    }
}

impl std::str::FromStr for ReturnFrequency {
    type Err = FundAnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(ReturnFrequency::Daily),
            "weekly" => Ok(ReturnFrequency::Weekly),
            "monthly" => Ok(ReturnFrequency::Monthly),
            "quarterly" => Ok(ReturnFrequency::Quarterly),
            "annual" | "annually" => Ok(ReturnFrequency::Annual),
            other => Err(FundAnalyticsError::InvalidInput {
                field: "frequency".into(),
                reason: format!(
                    "Unknown frequency '{}'. Use: daily, weekly, monthly, quarterly, annual",
                    other
                ),
            }),
        }
    }
}

/// Which way a metric is "good" when ranking peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankDirection {
    HigherIsBetter,
    LowerIsBetter,
}

/// How tied metric values are resolved when ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Tied members share the mean of the ranks they span.
    Average,
    /// Tied members all take the best rank of the group.
    Min,
    /// Tied members all take the worst rank of the group.
    Max,
    /// Ties resolved by input order.
    First,
    /// Ties resolved by a seeded random key.
    #[default]
    Jitter,
}

/// Treatment of extreme values in the peer distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierPolicy {
    None,
    /// Drop values outside the [lower, upper] quantile band.
    Trim { lower: Decimal, upper: Decimal },
    /// Clamp values to the [lower, upper] quantile band.
    Winsorize { lower: Decimal, upper: Decimal },
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        OutlierPolicy::Trim {
            lower: dec!(0.05),
            upper: dec!(0.95),
        }
    }
}

impl OutlierPolicy {
    pub fn validate(&self) -> FundAnalyticsResult<()> {
        match self {
            OutlierPolicy::None => Ok(()),
            OutlierPolicy::Trim { lower, upper } | OutlierPolicy::Winsorize { lower, upper } => {
                if *lower < Decimal::ZERO || *upper > Decimal::ONE || lower >= upper {
                    return Err(FundAnalyticsError::InvalidInput {
                        field: "outlier_policy".into(),
                        reason: format!(
                            "Quantile band must satisfy 0 <= lower < upper <= 1, got [{}, {}]",
                            lower, upper
                        ),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Largest multiple any run of consecutive returns may compound to.
pub const MAX_GROWTH_MULTIPLE: Decimal = dec!(1000000000);

/// Reject returns below -100% and any run of consecutive returns whose
/// compounded growth exceeds [`MAX_GROWTH_MULTIPLE`].
///
/// Series that pass keep every compounded product, sum and squared
/// deviation the statistics take inside `Decimal`'s range.
pub fn validate_growth(field: &str, values: &[Decimal]) -> FundAnalyticsResult<()> {
    // best growth of any run ending at the current observation
    let mut run_up = Decimal::ONE;
    for (i, r) in values.iter().enumerate() {
        if *r < dec!(-1) {
            return Err(FundAnalyticsError::InvalidInput {
                field: field.to_string(),
                reason: format!("Return {} at index {} is below -100%", r, i),
            });
        }
        run_up = Decimal::ONE
            .checked_add(*r)
            .and_then(|g| run_up.max(Decimal::ONE).checked_mul(g))
            .filter(|g| *g <= MAX_GROWTH_MULTIPLE)
            .ok_or_else(|| FundAnalyticsError::InvalidInput {
                field: field.to_string(),
                reason: format!(
                    "Returns compound past {}x growth at index {}",
                    MAX_GROWTH_MULTIPLE, i
                ),
            })?;
    }
    Ok(())
}

/// A single periodic return
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    /// Period end date
    pub date: NaiveDate,
    /// Return for the period ending on `date`
    pub value: Rate,
}

/// Periodic returns of a fund, benchmark or factor.
///
/// Observations are ordered by strictly increasing date; call
/// [`ReturnSeries::validate`] on anything that came from outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Free-form classification code carried into report headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    pub observations: Vec<ReturnObservation>,
}

impl ReturnSeries {
    pub fn new(id: impl Into<String>, observations: Vec<ReturnObservation>) -> Self {
        let id = id.into();
        ReturnSeries {
            name: id.clone(),
            id,
            classification: None,
            observations,
        }
    }

    pub fn validate(&self) -> FundAnalyticsResult<()> {
        if self.id.trim().is_empty() {
            return Err(FundAnalyticsError::InvalidInput {
                field: "id".into(),
                reason: "Series id must not be empty".into(),
            });
        }
        for pair in self.observations.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(FundAnalyticsError::DateError(format!(
                    "Series '{}': dates must be strictly increasing ({} follows {})",
                    self.id, pair[1].date, pair[0].date
                )));
            }
        }
        if let Some(bad) = self.observations.iter().find(|o| o.value < dec!(-1)) {
            return Err(FundAnalyticsError::InvalidInput {
                field: format!("{}.observations", self.id),
                reason: format!("Return {} on {} is below -100%", bad.value, bad.date),
            });
        }
        validate_growth(&format!("{}.observations", self.id), &self.values())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn values(&self) -> Vec<Decimal> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Number of observations dated on or before `as_of`.
    fn count_through(&self, as_of: NaiveDate) -> usize {
        self.observations.partition_point(|o| o.date <= as_of)
    }

    /// The last `n` observations ending on or before `as_of`, or `None` if
    /// the series is shorter than that.
    pub fn window_ending(&self, as_of: NaiveDate, n: usize) -> Option<&[ReturnObservation]> {
        let end = self.count_through(as_of);
        if n == 0 || end < n {
            return None;
        }
        Some(&self.observations[end - n..end])
    }

    /// Every observation dated on or before `as_of`.
    pub fn through(&self, as_of: NaiveDate) -> &[ReturnObservation] {
        &self.observations[..self.count_through(as_of)]
    }

    /// Observations with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> &[ReturnObservation] {
        let lo = self.observations.partition_point(|o| o.date < start);
        let hi = self.observations.partition_point(|o| o.date <= end);
        if lo >= hi {
            &[]
        } else {
            &self.observations[lo..hi]
        }
    }

    /// Pairs of (self, other) values on the dates both series share.
    pub fn align_with(&self, other: &ReturnSeries) -> Vec<(NaiveDate, Decimal, Decimal)> {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.observations.len() && j < other.observations.len() {
            let a = &self.observations[i];
            let b = &other.observations[j];
            match a.date.cmp(&b.date) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push((a.date, a.value, b.value));
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }
}

/// Values of a slice of observations.
pub fn observation_values(obs: &[ReturnObservation]) -> Vec<Decimal> {
    obs.iter().map(|o| o.value).collect()
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    for w in &warnings {
        tracing::warn!(methodology, "{}", w);
    }
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series() -> ReturnSeries {
        ReturnSeries::new(
            "F1",
            vec![
                ReturnObservation { date: d(2024, 1, 31), value: dec!(0.01) },
                ReturnObservation { date: d(2024, 2, 29), value: dec!(0.02) },
                ReturnObservation { date: d(2024, 3, 31), value: dec!(-0.01) },
                ReturnObservation { date: d(2024, 4, 30), value: dec!(0.03) },
            ],
        )
    }

    #[test]
    fn test_window_ending() {
        let s = series();
        let w = s.window_ending(d(2024, 3, 31), 2).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].value, dec!(0.02));
        assert_eq!(w[1].value, dec!(-0.01));
        // As-of between observation dates uses the last one before it
        let w = s.window_ending(d(2024, 4, 15), 3).unwrap();
        assert_eq!(w[2].date, d(2024, 3, 31));
        assert!(s.window_ending(d(2024, 2, 29), 3).is_none());
    }

    #[test]
    fn test_between_inclusive() {
        let s = series();
        assert_eq!(s.between(d(2024, 2, 1), d(2024, 3, 31)).len(), 2);
        assert!(s.between(d(2025, 1, 1), d(2025, 12, 31)).is_empty());
    }

    #[test]
    fn test_validate_rejects_unordered_dates() {
        let mut s = series();
        s.observations.swap(0, 1);
        assert!(matches!(s.validate(), Err(FundAnalyticsError::DateError(_))));
    }

    #[test]
    fn test_validate_rejects_total_loss_beyond_100pct() {
        let mut s = series();
        s.observations[0].value = dec!(-1.5);
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_runaway_growth() {
        let mut s = series();
        s.observations[1].value = dec!(100000);
        assert!(s.validate().is_ok());
        s.observations[2].value = dec!(100000);
        assert!(matches!(s.validate(), Err(FundAnalyticsError::InvalidInput { .. })));
    }

    #[test]
    fn test_growth_run_restarts_after_a_loss() {
        // the whole series grows 1e7x, but the run after the trough grows 1e10x
        let values = [dec!(-0.999), dec!(99999), dec!(99999)];
        assert!(validate_growth("r", &values).is_err());
        assert!(validate_growth("r", &[dec!(-0.5), dec!(0.9)]).is_ok());
        assert!(validate_growth("r", &[Decimal::MAX]).is_err());
        assert!(validate_growth("r", &[dec!(-2)]).is_err());
    }

    #[test]
    fn test_align_with() {
        let a = series();
        let b = ReturnSeries::new(
            "B",
            vec![
                ReturnObservation { date: d(2024, 2, 29), value: dec!(0.5) },
                ReturnObservation { date: d(2024, 4, 30), value: dec!(0.6) },
            ],
        );
        let pairs = a.align_with(&b);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], (d(2024, 4, 30), dec!(0.03), dec!(0.6)));
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("Monthly".parse::<ReturnFrequency>().unwrap(), ReturnFrequency::Monthly);
        assert!("hourly".parse::<ReturnFrequency>().is_err());
    }

    #[test]
    fn test_outlier_policy_validation() {
        assert!(OutlierPolicy::default().validate().is_ok());
        let bad = OutlierPolicy::Trim { lower: dec!(0.9), upper: dec!(0.1) };
        assert!(bad.validate().is_err());
    }
}
