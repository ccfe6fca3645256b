#![cfg(feature = "performance")]

use chrono::NaiveDate;
use fund_analytics_core::performance::risk_adjusted::{
    calculate_risk_adjusted_returns, RiskAdjustedInput,
};
use fund_analytics_core::performance::trailing::{trailing_returns, TrailingReturnsInput};
use fund_analytics_core::performance::Horizon;
use fund_analytics_core::rolling::{rolling_statistics, RollingStatisticsInput};
use fund_analytics_core::{FundAnalyticsError, ReturnFrequency, ReturnObservation, ReturnSeries};
use pretty_assertions::assert_eq;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn month_end(year: i32, offset: usize) -> NaiveDate {
    let y = year + (offset / 12) as i32;
    let m = (offset % 12) as u32 + 1;
    let first_of_next = if m == 12 { date(y + 1, 1, 1) } else { date(y, m + 1, 1) };
    first_of_next.pred_opt().unwrap()
}

fn monthly(id: &str, year: i32, values: &[Decimal]) -> ReturnSeries {
    ReturnSeries::new(
        id,
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ReturnObservation {
                date: month_end(year, i),
                value: *v,
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Trailing returns
// ---------------------------------------------------------------------------

#[test]
fn test_trailing_returns_from_json() {
    let json = r#"{
        "fund": {
            "id": "ALPHA",
            "name": "Alpha Long/Short",
            "classification": "ARS",
            "observations": [
                {"date": "2024-01-31", "value": "0.01"},
                {"date": "2024-02-29", "value": "0.02"},
                {"date": "2024-03-31", "value": "-0.01"}
            ]
        },
        "as_of": "2024-03-31",
        "horizons": ["1M", "3m", "ytd"]
    }"#;
    let input: TrailingReturnsInput = serde_json::from_str(json).unwrap();
    assert_eq!(input.frequency, ReturnFrequency::Monthly);

    let out = trailing_returns(&input).unwrap().result;
    assert_eq!(out.fund_name, "Alpha Long/Short");
    let horizons: Vec<Horizon> = out.trailing.iter().map(|t| t.horizon).collect();
    assert_eq!(
        horizons,
        vec![Horizon::OneMonth, Horizon::ThreeMonths, Horizon::YearToDate]
    );
    assert_eq!(out.trailing[0].fund_return, Some(dec!(-0.01)));
    let three_month = dec!(1.01) * dec!(1.02) * dec!(0.99) - Decimal::ONE;
    assert_eq!(out.trailing[1].fund_return, Some(three_month));
    // YTD and 3M coincide for a fund reporting since January
    assert_eq!(out.trailing[2].fund_return, Some(three_month));
}

#[test]
fn test_three_year_return_is_annualised() {
    let fund = monthly("F", 2022, &[dec!(0.01); 36]);
    let input = TrailingReturnsInput {
        fund,
        benchmark: None,
        as_of: date(2024, 12, 31),
        frequency: ReturnFrequency::Monthly,
        horizons: vec![Horizon::ThreeYears],
    };
    let out = trailing_returns(&input).unwrap().result;
    let r = out.trailing[0].fund_return.unwrap();
    assert!(out.trailing[0].annualised);
    // (1.01^36)^(1/3) - 1 = 1.01^12 - 1
    let expected = dec!(1.01).powi(12) - Decimal::ONE;
    assert!((r - expected).abs() < dec!(0.0000001), "got {}", r);
}

#[test]
fn test_calendar_years_flag_partial_years() {
    let fund = monthly("F", 2023, &[dec!(0.01); 18]);
    let input = TrailingReturnsInput {
        fund,
        benchmark: None,
        as_of: date(2024, 6, 30),
        frequency: ReturnFrequency::Monthly,
        horizons: vec![],
    };
    let out = trailing_returns(&input).unwrap().result;
    assert_eq!(out.calendar_years.len(), 2);
    assert!(!out.calendar_years[0].partial);
    assert!(out.calendar_years[1].partial);
    assert_eq!(out.calendar_years[1].observations, 6);
}

#[test]
fn test_as_of_before_inception_is_error() {
    let input = TrailingReturnsInput {
        fund: monthly("F", 2024, &[dec!(0.01); 3]),
        benchmark: None,
        as_of: date(2023, 12, 31),
        frequency: ReturnFrequency::Monthly,
        horizons: vec![],
    };
    assert!(matches!(
        trailing_returns(&input),
        Err(FundAnalyticsError::InsufficientData(_))
    ));
}

#[test]
fn test_unordered_dates_rejected() {
    let mut fund = monthly("F", 2024, &[dec!(0.01); 3]);
    fund.observations.swap(0, 2);
    let input = TrailingReturnsInput {
        fund,
        benchmark: None,
        as_of: date(2024, 3, 31),
        frequency: ReturnFrequency::Monthly,
        horizons: vec![],
    };
    assert!(trailing_returns(&input).is_err());
}

#[test]
fn test_runaway_returns_rejected_before_compounding() {
    // 1001^12 overflows Decimal
    let fund = monthly("F", 2024, &[dec!(1000); 12]);
    assert!(fund.validate().is_err());
    let input = TrailingReturnsInput {
        fund: fund.clone(),
        benchmark: None,
        as_of: date(2024, 12, 31),
        frequency: ReturnFrequency::Monthly,
        horizons: vec![Horizon::OneYear],
    };
    assert!(matches!(
        trailing_returns(&input),
        Err(FundAnalyticsError::InvalidInput { .. })
    ));

    let rolling = RollingStatisticsInput {
        series: fund,
        window: 6,
        step: None,
        risk_free_rate: Decimal::ZERO,
        frequency: ReturnFrequency::Monthly,
    };
    assert!(matches!(
        rolling_statistics(&rolling),
        Err(FundAnalyticsError::InvalidInput { .. })
    ));

    let raw = RiskAdjustedInput {
        returns: vec![dec!(1000); 12],
        risk_free_rate: Decimal::ZERO,
        benchmark_returns: None,
        frequency: ReturnFrequency::Monthly,
        target_return: None,
    };
    assert!(matches!(
        calculate_risk_adjusted_returns(&raw),
        Err(FundAnalyticsError::InvalidInput { .. })
    ));
}

// ---------------------------------------------------------------------------
// Risk-adjusted returns
// ---------------------------------------------------------------------------

#[test]
fn test_risk_adjusted_against_benchmark() {
    let returns = vec![
        dec!(0.02), dec!(-0.01), dec!(0.03), dec!(0.01), dec!(-0.02), dec!(0.015),
        dec!(0.005), dec!(0.02), dec!(-0.005), dec!(0.01), dec!(0.025), dec!(-0.015),
    ];
    let benchmark: Vec<Decimal> = returns.iter().map(|r| *r * dec!(0.8)).collect();
    let input = RiskAdjustedInput {
        returns,
        risk_free_rate: dec!(0.02),
        benchmark_returns: Some(benchmark),
        frequency: ReturnFrequency::Monthly,
        target_return: None,
    };
    let out = calculate_risk_adjusted_returns(&input).unwrap().result;
    // Fund is 1.25x the benchmark
    let beta = out.beta.unwrap();
    assert!((beta - dec!(1.25)).abs() < dec!(0.0000001));
    assert!(out.up_capture.unwrap() > Decimal::ONE);
    assert!(out.tracking_error.unwrap() > Decimal::ZERO);
    assert!(out.max_drawdown > Decimal::ZERO);
}

// ---------------------------------------------------------------------------
// Rolling statistics
// ---------------------------------------------------------------------------

#[test]
fn test_rolling_twelve_month_windows() {
    let mut values = vec![dec!(0.01); 12];
    values.extend(vec![dec!(-0.01); 12]);
    let input = RollingStatisticsInput {
        series: monthly("F", 2023, &values),
        window: 12,
        step: None,
        risk_free_rate: Decimal::ZERO,
        frequency: ReturnFrequency::Monthly,
    };
    let out = rolling_statistics(&input).unwrap();
    let windows = &out.result.windows;
    assert_eq!(windows.len(), 13);
    assert_eq!(windows[0].end_date, date(2023, 12, 31));
    assert!(windows[0].cumulative_return > Decimal::ZERO);
    assert!(windows[12].cumulative_return < Decimal::ZERO);
    assert!(out.warnings.is_empty());
}
