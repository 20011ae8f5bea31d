//! Time axis decoding
//!
//! Time values are day offsets from 1949-12-01. Only the calendar month
//! matters downstream, so every offset is reduced to the first of its month.

use crate::constants::{EPOCH_DAY, EPOCH_MONTH, EPOCH_YEAR, WINTER_MONTHS};
use chrono::{Datelike, NaiveDate, TimeDelta};

/// Epoch the offsets count from
pub fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(EPOCH_YEAR, EPOCH_MONTH, EPOCH_DAY)
}

/// First day of the month containing `epoch + floor(days)`
///
/// `None` for non-finite offsets or dates chrono cannot represent.
pub fn month_start(days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    let delta = TimeDelta::try_days(days.floor() as i64)?;
    epoch()?.checked_add_signed(delta)?.with_day(1)
}

/// `(year, month)` of a day offset
pub fn year_month(days: f64) -> Option<(i32, u32)> {
    month_start(days).map(|d| (d.year(), d.month()))
}

pub fn is_winter_month(month: u32) -> bool {
    WINTER_MONTHS.contains(&month)
}
