//! Inclusive date window for a fetch run.

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("lookback of {0} underflows the calendar")]
    Underflow(String),
}

/// `[start, end]`, both inclusive, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window ending at `today` and reaching back `days` calendar days.
    pub fn lookback_days(today: NaiveDate, days: u32) -> Result<Self, RangeError> {
        let start = today
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| RangeError::Underflow(format!("{days} days")))?;
        Self::new(start, today)
    }

    /// Window ending at `today` and reaching back `months` calendar months.
    ///
    /// Month arithmetic clamps to the last valid day (May 31 minus 3 months is Feb 28/29).
    pub fn lookback_months(today: NaiveDate, months: u32) -> Result<Self, RangeError> {
        let start = today
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| RangeError::Underflow(format!("{months} months")))?;
        Self::new(start, today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::new(d(2024, 2, 1), d(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, RangeError::Inverted { .. }));
    }

    #[test]
    fn single_day_range_is_valid() {
        let r = DateRange::new(d(2024, 1, 1), d(2024, 1, 1)).unwrap();
        assert_eq!(r.len_days(), 1);
        assert!(r.contains(d(2024, 1, 1)));
    }

    #[test]
    fn weekly_lookback_covers_padding() {
        // 2 weeks + 21 days of padding
        let r = DateRange::lookback_days(d(2024, 3, 15), 2 * 7 + 21).unwrap();
        assert_eq!(r.start(), d(2024, 2, 9));
        assert_eq!(r.end(), d(2024, 3, 15));
    }

    #[test]
    fn month_lookback_clamps_day() {
        let r = DateRange::lookback_months(d(2024, 5, 31), 3).unwrap();
        assert_eq!(r.start(), d(2024, 2, 29));
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let r = DateRange::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert!(r.contains(d(2024, 1, 1)));
        assert!(r.contains(d(2024, 1, 31)));
        assert!(!r.contains(d(2024, 2, 1)));
        assert!(!r.contains(d(2023, 12, 31)));
    }
}
