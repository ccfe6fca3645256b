//! Trailing and calendar-year return summaries.
//!
//! Horizons are measured in observations of the series frequency, ending
//! at the last observation on or before the as-of date. A series whose
//! latest observation is older than one period before the as-of date is
//! treated as stale and produces no figure for any horizon.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::FundAnalyticsError;
use crate::stats::{annualise_compound, compound_return};
use crate::types::*;
use crate::FundAnalyticsResult;

// ---------------------------------------------------------------------------
// Horizons
// ---------------------------------------------------------------------------

/// Look-back horizon for a trailing return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1m", alias = "1M")]
    OneMonth,
    #[serde(rename = "3m", alias = "3M")]
    ThreeMonths,
    #[serde(rename = "6m", alias = "6M")]
    SixMonths,
    #[serde(rename = "ytd", alias = "YTD")]
    YearToDate,
    #[serde(rename = "1y", alias = "1Y")]
    OneYear,
    #[serde(rename = "3y", alias = "3Y")]
    ThreeYears,
    #[serde(rename = "5y", alias = "5Y")]
    FiveYears,
    #[serde(rename = "itd", alias = "ITD")]
    InceptionToDate,
}

impl Horizon {
    pub const ALL: [Horizon; 8] = [
        Horizon::OneMonth,
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::YearToDate,
        Horizon::OneYear,
        Horizon::ThreeYears,
        Horizon::FiveYears,
        Horizon::InceptionToDate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Horizon::OneMonth => "1M",
            Horizon::ThreeMonths => "3M",
            Horizon::SixMonths => "6M",
            Horizon::YearToDate => "YTD",
            Horizon::OneYear => "1Y",
            Horizon::ThreeYears => "3Y",
            Horizon::FiveYears => "5Y",
            Horizon::InceptionToDate => "ITD",
        }
    }

    fn months(&self) -> Option<usize> {
        match self {
            Horizon::OneMonth => Some(1),
            Horizon::ThreeMonths => Some(3),
            Horizon::SixMonths => Some(6),
            Horizon::OneYear => Some(12),
            Horizon::ThreeYears => Some(36),
            Horizon::FiveYears => Some(60),
            Horizon::YearToDate | Horizon::InceptionToDate => None,
        }
    }

    /// Fixed number of observations this horizon spans at `frequency`, or
    /// `None` for calendar-anchored horizons and spans shorter than one
    /// period (e.g. one month of quarterly data).
    pub fn fixed_periods(&self, frequency: ReturnFrequency) -> Option<usize> {
        let months = self.months()?;
        let ppy = frequency.periods_per_year_usize();
        let n = (months * ppy + 6) / 12;
        if n == 0 {
            None
        } else {
            Some(n)
        }
    }

    /// Horizons of a year or more are quoted annualised.
    pub fn is_annualised(&self) -> bool {
        matches!(
            self,
            Horizon::ThreeYears | Horizon::FiveYears | Horizon::InceptionToDate
        )
    }

    /// Observations of `series` covered by this horizon, or `None` when the
    /// series lacks the full history (or is stale) as of `as_of`.
    pub fn select<'a>(
        &self,
        series: &'a ReturnSeries,
        as_of: NaiveDate,
        frequency: ReturnFrequency,
    ) -> Option<&'a [ReturnObservation]> {
        let available = series.through(as_of);
        let last = available.last()?;
        let tolerance = staleness_tolerance(frequency);
        if as_of - last.date > tolerance {
            return None;
        }

        match self {
            Horizon::YearToDate => {
                let year_start = NaiveDate::from_ymd_opt(as_of.year(), 1, 1)?;
                let lo = available.partition_point(|o| o.date < year_start);
                let slice = &available[lo..];
                let first = slice.first()?;
                // The fund must have been reporting from the start of the year
                let started_on_time = first.date - year_start <= tolerance;
                let had_history = lo > 0;
                if started_on_time || had_history {
                    Some(slice)
                } else {
                    None
                }
            }
            Horizon::InceptionToDate => Some(available),
            fixed => {
                let n = fixed.fixed_periods(frequency)?;
                series.window_ending(as_of, n)
            }
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Maximum gap between the as-of date and the latest observation.
pub fn staleness_tolerance(frequency: ReturnFrequency) -> Duration {
    let days = (366 / frequency.periods_per_year_usize() as i64).max(4) + 1;
    Duration::days(days)
}

/// Return of `series` over `horizon`, annualised where the horizon calls
/// for it. Yields `(return, observations used)`.
pub fn horizon_return(
    series: &ReturnSeries,
    horizon: Horizon,
    as_of: NaiveDate,
    frequency: ReturnFrequency,
) -> Option<(Rate, usize)> {
    let obs = horizon.select(series, as_of, frequency)?;
    let values = observation_values(obs);
    let total = compound_return(&values);
    let ret = if horizon.is_annualised() {
        annualise_compound(total, values.len(), frequency.periods_per_year_usize())
    } else {
        total
    };
    Some((ret, values.len()))
}

// ---------------------------------------------------------------------------
// Trailing returns
// ---------------------------------------------------------------------------

/// Input for a single-fund trailing return summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingReturnsInput {
    pub fund: ReturnSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<ReturnSeries>,
    pub as_of: NaiveDate,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    /// Horizons to report; all of them when empty
    #[serde(default)]
    pub horizons: Vec<Horizon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingReturn {
    pub horizon: Horizon,
    pub observations: usize,
    pub annualised: bool,
    pub fund_return: Option<Rate>,
    pub benchmark_return: Option<Rate>,
    pub excess_return: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarYearReturn {
    pub year: i32,
    pub fund_return: Rate,
    pub observations: usize,
    /// Fewer observations than a full year at the series frequency
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_return: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingReturnsOutput {
    pub fund_id: String,
    pub fund_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_id: Option<String>,
    pub as_of: NaiveDate,
    pub trailing: Vec<TrailingReturn>,
    pub calendar_years: Vec<CalendarYearReturn>,
}

/// Compute trailing and calendar-year returns for one fund.
pub fn trailing_returns(
    input: &TrailingReturnsInput,
) -> FundAnalyticsResult<ComputationOutput<TrailingReturnsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.fund.validate()?;
    if let Some(ref b) = input.benchmark {
        b.validate()?;
    }
    if input.fund.through(input.as_of).is_empty() {
        return Err(FundAnalyticsError::InsufficientData(format!(
            "Fund '{}' has no observations on or before {}",
            input.fund.id, input.as_of
        )));
    }

    let horizons: Vec<Horizon> = if input.horizons.is_empty() {
        Horizon::ALL.to_vec()
    } else {
        input.horizons.clone()
    };

    let mut trailing = Vec::with_capacity(horizons.len());
    for h in horizons {
        let fund = horizon_return(&input.fund, h, input.as_of, input.frequency);
        let bench = input
            .benchmark
            .as_ref()
            .and_then(|b| horizon_return(b, h, input.as_of, input.frequency));

        if fund.is_none() {
            warnings.push(format!(
                "{}: insufficient history for '{}' as of {}",
                h, input.fund.id, input.as_of
            ));
        }

        let fund_return = fund.map(|(r, _)| r);
        let benchmark_return = bench.map(|(r, _)| r);
        let excess_return = match (fund_return, benchmark_return) {
            (Some(f), Some(b)) => Some(f - b),
            _ => None,
        };

        trailing.push(TrailingReturn {
            horizon: h,
            observations: fund.map(|(_, n)| n).unwrap_or(0),
            annualised: h.is_annualised(),
            fund_return,
            benchmark_return,
            excess_return,
        });
    }

    let mut calendar_years = calendar_year_returns(&input.fund, input.as_of, input.frequency);
    if let Some(ref b) = input.benchmark {
        let bench_years: BTreeMap<i32, Rate> =
            calendar_year_returns(b, input.as_of, input.frequency)
                .into_iter()
                .map(|y| (y.year, y.fund_return))
                .collect();
        for y in calendar_years.iter_mut() {
            y.benchmark_return = bench_years.get(&y.year).copied();
        }
    }

    tracing::debug!(fund = %input.fund.id, horizons = trailing.len(), "trailing returns computed");

    let output = TrailingReturnsOutput {
        fund_id: input.fund.id.clone(),
        fund_name: input.fund.name.clone(),
        benchmark_id: input.benchmark.as_ref().map(|b| b.id.clone()),
        as_of: input.as_of,
        trailing,
        calendar_years,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Trailing Returns (geometric linking; annualised for 3Y, 5Y and ITD)",
        &serde_json::json!({
            "frequency": input.frequency,
            "as_of": input.as_of.to_string(),
            "staleness_tolerance_days": staleness_tolerance(input.frequency).num_days(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Compounded return for each calendar year with data on or before `as_of`.
pub fn calendar_year_returns(
    series: &ReturnSeries,
    as_of: NaiveDate,
    frequency: ReturnFrequency,
) -> Vec<CalendarYearReturn> {
    let mut by_year: BTreeMap<i32, Vec<Decimal>> = BTreeMap::new();
    for o in series.through(as_of) {
        by_year.entry(o.date.year()).or_default().push(o.value);
    }
    let full_year = frequency.periods_per_year_usize();
    by_year
        .into_iter()
        .map(|(year, values)| CalendarYearReturn {
            year,
            fund_return: compound_return(&values),
            observations: values.len(),
            partial: values.len() < full_year,
            benchmark_return: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{date, monthly};
    use rust_decimal_macros::dec;

    #[test]
    fn test_fixed_periods_by_frequency() {
        assert_eq!(Horizon::ThreeYears.fixed_periods(ReturnFrequency::Monthly), Some(36));
        assert_eq!(Horizon::OneMonth.fixed_periods(ReturnFrequency::Quarterly), None);
        assert_eq!(Horizon::SixMonths.fixed_periods(ReturnFrequency::Quarterly), Some(2));
        assert_eq!(Horizon::OneMonth.fixed_periods(ReturnFrequency::Daily), Some(21));
        assert_eq!(Horizon::YearToDate.fixed_periods(ReturnFrequency::Monthly), None);
    }

    #[test]
    fn test_three_month_return() {
        let s = monthly("F", 2024, &[dec!(0.01), dec!(0.02), dec!(0.03), dec!(0.04)]);
        let (r, n) =
            horizon_return(&s, Horizon::ThreeMonths, date(2024, 4, 30), ReturnFrequency::Monthly)
                .unwrap();
        assert_eq!(n, 3);
        assert_eq!(r, dec!(1.02) * dec!(1.03) * dec!(1.04) - dec!(1));
    }

    #[test]
    fn test_ytd_uses_calendar_year() {
        let mut values = vec![dec!(0.01); 12];
        values.extend([dec!(0.02), dec!(0.03)]);
        let s = monthly("F", 2023, &values);
        let (r, n) =
            horizon_return(&s, Horizon::YearToDate, date(2024, 2, 29), ReturnFrequency::Monthly)
                .unwrap();
        assert_eq!(n, 2);
        assert_eq!(r, dec!(1.02) * dec!(1.03) - dec!(1));
    }

    #[test]
    fn test_ytd_requires_presence_at_year_start() {
        // Fund launched in June: no YTD figure
        let obs = vec![
            ReturnObservation { date: date(2024, 6, 30), value: dec!(0.01) },
            ReturnObservation { date: date(2024, 7, 31), value: dec!(0.01) },
        ];
        let s = ReturnSeries::new("F", obs);
        assert!(Horizon::YearToDate
            .select(&s, date(2024, 7, 31), ReturnFrequency::Monthly)
            .is_none());
    }

    #[test]
    fn test_stale_series_has_no_returns() {
        let s = monthly("F", 2023, &[dec!(0.01); 12]);
        // Last observation Dec 2023, as-of March 2024
        assert!(horizon_return(&s, Horizon::OneMonth, date(2024, 3, 31), ReturnFrequency::Monthly)
            .is_none());
    }

    #[test]
    fn test_insufficient_history_warns() {
        let s = monthly("F", 2024, &[dec!(0.01); 6]);
        let input = TrailingReturnsInput {
            fund: s,
            benchmark: None,
            as_of: date(2024, 6, 30),
            frequency: ReturnFrequency::Monthly,
            horizons: vec![Horizon::SixMonths, Horizon::OneYear],
        };
        let out = trailing_returns(&input).unwrap();
        assert!(out.result.trailing[0].fund_return.is_some());
        assert!(out.result.trailing[1].fund_return.is_none());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_excess_vs_benchmark() {
        let f = monthly("F", 2024, &[dec!(0.02), dec!(0.02), dec!(0.02)]);
        let b = monthly("B", 2024, &[dec!(0.01), dec!(0.01), dec!(0.01)]);
        let input = TrailingReturnsInput {
            fund: f,
            benchmark: Some(b),
            as_of: date(2024, 3, 31),
            frequency: ReturnFrequency::Monthly,
            horizons: vec![Horizon::OneMonth],
        };
        let out = trailing_returns(&input).unwrap();
        assert_eq!(out.result.trailing[0].excess_return, Some(dec!(0.01)));
        assert_eq!(out.result.calendar_years[0].benchmark_return.unwrap(), dec!(1.01) * dec!(1.01) * dec!(1.01) - dec!(1));
    }

    #[test]
    fn test_calendar_years_flag_partial() {
        let mut values = vec![dec!(0.01); 12];
        values.extend([dec!(0.02); 3]);
        let s = monthly("F", 2023, &values);
        let years = calendar_year_returns(&s, date(2024, 12, 31), ReturnFrequency::Monthly);
        assert_eq!(years.len(), 2);
        assert!(!years[0].partial);
        assert!(years[1].partial);
        assert_eq!(years[1].observations, 3);
    }

    #[test]
    fn test_empty_history_is_error() {
        let s = monthly("F", 2025, &[dec!(0.01)]);
        let input = TrailingReturnsInput {
            fund: s,
            benchmark: None,
            as_of: date(2024, 1, 31),
            frequency: ReturnFrequency::Monthly,
            horizons: vec![],
        };
        assert!(matches!(
            trailing_returns(&input),
            Err(FundAnalyticsError::InsufficientData(_))
        ));
    }
}
