//! Fixtures shared by unit tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::types::{ReturnObservation, ReturnSeries};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Last calendar day of the month `offset` months after January of `year`.
pub(crate) fn month_end(year: i32, offset: usize) -> NaiveDate {
    let y = year + (offset / 12) as i32;
    let m = (offset % 12) as u32 + 1;
    let next = if m == 12 {
        date(y + 1, 1, 1)
    } else {
        date(y, m + 1, 1)
    };
    next.pred_opt().unwrap()
}

/// Monthly series with month-end dates starting January of `year`.
pub(crate) fn monthly(id: &str, year: i32, values: &[Decimal]) -> ReturnSeries {
    let obs = values
        .iter()
        .enumerate()
        .map(|(i, v)| ReturnObservation {
            date: month_end(year, i),
            value: *v,
        })
        .collect();
    ReturnSeries::new(id, obs)
}
