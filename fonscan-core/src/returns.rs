//! Weekly return calculator.
//!
//! Boundaries walk back from "today" in 7-day steps: `d_0 = today`,
//! `d_k = d_{k-1} - 7`. Period `k` runs from `d_{k+1}` to `d_k`, priced with
//! the as-of lookup (latest known price on or before the boundary), so a
//! boundary landing on a weekend or holiday uses the previous trading day.
//!
//! Any unknown endpoint makes that period unknown, and a single unknown
//! period disqualifies the whole record. Partial series are never scored.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{InstrumentId, PriceSeries};

/// Percentage change from `start` to `end`.
///
/// `None` when either price is unknown, non-finite, or `start` is zero.
pub fn calculate_change(end: Option<f64>, start: Option<f64>) -> Option<f64> {
    let (end, start) = (end?, start?);
    if !end.is_finite() || !start.is_finite() || start == 0.0 {
        return None;
    }
    Some((end - start) / start * 100.0)
}

/// Period changes for one series, most recent period first.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReturns {
    pub changes: Vec<Option<f64>>,
    /// Sum of all changes, present only when every change is known.
    pub cumulative: Option<f64>,
}

impl PeriodReturns {
    pub fn is_complete(&self) -> bool {
        self.cumulative.is_some()
    }

    /// Zero-based indices of periods with no resolvable change.
    pub fn unknown_periods(&self) -> Vec<usize> {
        self.changes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
            .collect()
    }
}

/// A series had fewer resolvable periods than the scan requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{id}: {} of {required} periods unresolvable (periods {unknown:?})", .unknown.len())]
pub struct InsufficientWindow {
    pub id: InstrumentId,
    pub required: usize,
    pub unknown: Vec<usize>,
}

/// Fully-resolved weekly momentum record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReturnRecord {
    pub id: InstrumentId,
    pub name: String,
    /// Percentage change per week, most recent week first.
    pub period_returns: Vec<f64>,
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnCalculator {
    today: NaiveDate,
    window_count: usize,
}

impl ReturnCalculator {
    pub fn new(today: NaiveDate, window_count: usize) -> Self {
        Self {
            today,
            window_count,
        }
    }

    pub fn window_count(&self) -> usize {
        self.window_count
    }

    /// `window_count + 1` boundaries, most recent first.
    pub fn boundaries(&self) -> Vec<NaiveDate> {
        (0..=self.window_count)
            .map(|k| self.today - Duration::days(7 * k as i64))
            .collect()
    }

    /// Resolve every period and the all-or-nothing cumulative.
    pub fn compute(&self, series: &PriceSeries) -> PeriodReturns {
        let prices: Vec<Option<f64>> = self
            .boundaries()
            .into_iter()
            .map(|d| series.as_of_price(d))
            .collect();

        let changes: Vec<Option<f64>> = prices
            .windows(2)
            .map(|w| calculate_change(w[0], w[1]))
            .collect();

        let cumulative = if changes.iter().all(Option::is_some) {
            Some(changes.iter().flatten().sum::<f64>())
        } else {
            None
        };

        PeriodReturns {
            changes,
            cumulative,
        }
    }

    /// Build a record, or report which periods could not be resolved.
    pub fn record(
        &self,
        name: impl Into<String>,
        series: &PriceSeries,
    ) -> Result<WeeklyReturnRecord, InsufficientWindow> {
        let returns = self.compute(series);
        match returns.cumulative {
            Some(cumulative) => Ok(WeeklyReturnRecord {
                id: series.id().clone(),
                name: name.into(),
                period_returns: returns.changes.into_iter().flatten().collect(),
                cumulative_return: cumulative,
            }),
            None => Err(InsufficientWindow {
                id: series.id().clone(),
                required: self.window_count,
                unknown: returns.unknown_periods(),
            }),
        }
    }
}
