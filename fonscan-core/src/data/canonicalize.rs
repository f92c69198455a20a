//! Raw rows → canonical price points: validate, sort, dedupe.

use crate::data::provider::RawRow;
use crate::domain::PricePoint;

/// What canonicalization had to fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalReport {
    /// Rows dropped for a missing, zero, negative or non-finite price.
    pub dropped_invalid: usize,
    /// Rows superseded by a later row with the same date.
    pub duplicates_resolved: usize,
}

/// Canonicalize raw rows into strictly ascending, one-per-date points.
///
/// The sort is stable, so among rows sharing a date the last one in upstream
/// order wins.
pub fn canonicalize(rows: Vec<RawRow>) -> (Vec<PricePoint>, CanonicalReport) {
    let mut report = CanonicalReport::default();

    let mut valid: Vec<PricePoint> = rows
        .into_iter()
        .map(|r| PricePoint {
            date: r.date,
            price: r.price,
            market_cap: r.market_cap,
            investor_count: r.investor_count,
        })
        .filter(|p| {
            let ok = p.has_valid_price();
            if !ok {
                report.dropped_invalid += 1;
            }
            ok
        })
        .collect();

    valid.sort_by_key(|p| p.date);

    let mut points: Vec<PricePoint> = Vec::with_capacity(valid.len());
    for p in valid {
        match points.last_mut() {
            Some(prev) if prev.date == p.date => {
                *prev = p;
                report.duplicates_resolved += 1;
            }
            _ => points.push(p),
        }
    }

    (points, report)
}
