//! Filter and rank metric records.

use std::cmp::Ordering;

use fonscan_core::metrics::AnalysisRecord;
use fonscan_core::returns::WeeklyReturnRecord;

/// Keep records with `cumulative_return >= threshold`, best first.
///
/// Ties are broken by code ascending so the output is deterministic.
pub fn rank_weekly(records: Vec<WeeklyReturnRecord>, threshold: f64) -> Vec<WeeklyReturnRecord> {
    let mut kept: Vec<WeeklyReturnRecord> = records
        .into_iter()
        .filter(|r| r.cumulative_return.is_finite() && r.cumulative_return >= threshold)
        .collect();
    kept.sort_by(|a, b| {
        b.cumulative_return
            .total_cmp(&a.cumulative_return)
            .then_with(|| a.id.cmp(&b.id))
    });
    kept
}

/// Sortino descending, then Sharpe descending, then code ascending.
pub fn rank_analysis(mut records: Vec<AnalysisRecord>) -> Vec<AnalysisRecord> {
    records.sort_by(compare_analysis);
    records
}

fn compare_analysis(a: &AnalysisRecord, b: &AnalysisRecord) -> Ordering {
    b.sortino
        .total_cmp(&a.sortino)
        .then_with(|| b.sharpe.total_cmp(&a.sharpe))
        .then_with(|| a.id.cmp(&b.id))
}
