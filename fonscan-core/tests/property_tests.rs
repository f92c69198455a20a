//! Property tests for series invariants.
//!
//! 1. As-of lookup returns the latest point dated on or before the query
//! 2. Canonicalization yields strictly ascending, valid, last-wins points
//! 3. Weekly cumulative is known exactly when every period is known

use chrono::{Duration, NaiveDate};
use fonscan_core::data::{canonicalize, RawRow};
use fonscan_core::domain::{InstrumentId, PricePoint, PriceSeries};
use fonscan_core::returns::ReturnCalculator;
use proptest::prelude::*;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

// ── Strategies ───────────────────────────────────────────────────────

/// Sorted, distinct day offsets with positive prices.
fn arb_series() -> impl Strategy<Value = PriceSeries> {
    prop::collection::btree_map(0i64..120, 0.5..500.0_f64, 1..40).prop_map(|m| {
        let points = m
            .into_iter()
            .map(|(off, p)| PricePoint::new(base() + Duration::days(off), p))
            .collect();
        PriceSeries::new(InstrumentId::parse("PRP").unwrap(), None, points).unwrap()
    })
}

/// Unordered raw rows with duplicate dates and some invalid prices.
fn arb_raw_rows() -> impl Strategy<Value = Vec<RawRow>> {
    let price = prop_oneof![
        4 => 0.01..100.0_f64,
        1 => Just(0.0),
        1 => Just(-1.0),
        1 => Just(f64::NAN),
    ];
    prop::collection::vec((0i64..20, price), 0..60).prop_map(|rows| {
        rows.into_iter()
            .map(|(off, p)| RawRow::new(base() + Duration::days(off), p))
            .collect()
    })
}

// ── 1. As-of lookup ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn as_of_is_latest_point_not_after_query(series in arb_series(), q in -5i64..130) {
        let date = base() + Duration::days(q);
        let expected = series.points().iter().filter(|p| p.date <= date).last();
        prop_assert_eq!(series.as_of(date), expected);
        prop_assert_eq!(series.as_of_price(date), expected.map(|p| p.price));
    }
}

// ── 2. Canonicalization ──────────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_points_are_strictly_ascending_and_valid(rows in arb_raw_rows()) {
        let (points, _) = canonicalize(rows);
        prop_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        prop_assert!(points.iter().all(|p| p.has_valid_price()));
    }

    #[test]
    fn canonical_accounting_adds_up(rows in arb_raw_rows()) {
        let n = rows.len();
        let (points, report) = canonicalize(rows);
        prop_assert_eq!(points.len() + report.dropped_invalid + report.duplicates_resolved, n);
    }

    #[test]
    fn last_valid_row_per_date_wins(rows in arb_raw_rows()) {
        let (points, _) = canonicalize(rows.clone());
        for p in &points {
            let last = rows
                .iter()
                .filter(|r| r.date == p.date && r.price.is_finite() && r.price > 0.0)
                .last()
                .map(|r| r.price);
            prop_assert_eq!(Some(p.price), last);
        }
    }
}

// ── 3. All-or-nothing cumulative ─────────────────────────────────────

proptest! {
    #[test]
    fn cumulative_known_iff_all_periods_known(
        series in arb_series(),
        today_off in 0i64..140,
        weeks in 1usize..6,
    ) {
        let calc = ReturnCalculator::new(base() + Duration::days(today_off), weeks);
        let r = calc.compute(&series);
        prop_assert_eq!(r.changes.len(), weeks);
        prop_assert_eq!(r.cumulative.is_some(), r.changes.iter().all(Option::is_some));
        if let Some(total) = r.cumulative {
            let sum: f64 = r.changes.iter().flatten().sum();
            prop_assert!((total - sum).abs() < 1e-9);
        }
    }
}
