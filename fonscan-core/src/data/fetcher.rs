//! Single-call fetch classification.
//!
//! Turns whatever a provider did (rows, error, panic) into one of three
//! outcomes. The retryable/terminal split lives here and nowhere else.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::canonicalize::canonicalize;
use super::provider::{PriceProvider, RawSeries};
use crate::domain::{DateRange, InstrumentId, PriceSeries};

/// Result of one attempt at one fund.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Canonical, non-empty series.
    Success(PriceSeries),
    /// The upstream knows nothing about this fund in the range. Terminal.
    Empty(InstrumentId),
    /// Transport, parse or upstream error. Retryable.
    Failure { id: InstrumentId, reason: String },
}

impl FetchOutcome {
    pub fn id(&self) -> &InstrumentId {
        match self {
            FetchOutcome::Success(series) => series.id(),
            FetchOutcome::Empty(id) => id,
            FetchOutcome::Failure { id, .. } => id,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchOutcome::Failure { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "ok",
            FetchOutcome::Empty(_) => "no-data",
            FetchOutcome::Failure { .. } => "failed",
        }
    }
}

/// Perform exactly one provider call for `id` and classify it.
///
/// Never panics and never retries: a panic inside the provider becomes a
/// `Failure` so one bad task cannot take down a stage.
pub fn fetch_series(
    provider: &dyn PriceProvider,
    id: &InstrumentId,
    range: &DateRange,
) -> FetchOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| provider.fetch(id, range))) {
        Ok(Ok(raw)) => classify_rows(id, raw),
        Ok(Err(e)) if !e.is_transient() => FetchOutcome::Empty(id.clone()),
        Ok(Err(e)) => FetchOutcome::Failure {
            id: id.clone(),
            reason: e.to_string(),
        },
        Err(payload) => FetchOutcome::Failure {
            id: id.clone(),
            reason: format!("fetch panicked: {}", panic_message(payload.as_ref())),
        },
    }
}

fn classify_rows(id: &InstrumentId, raw: RawSeries) -> FetchOutcome {
    if raw.rows.is_empty() {
        return FetchOutcome::Empty(id.clone());
    }

    let (points, _) = canonicalize(raw.rows);
    if points.is_empty() {
        // Rows came back but none carried a usable price.
        return FetchOutcome::Empty(id.clone());
    }

    let title = raw.title.filter(|t| !t.trim().is_empty());
    match PriceSeries::new(id.clone(), title, points) {
        Ok(series) => FetchOutcome::Success(series),
        Err(e) => FetchOutcome::Failure {
            id: id.clone(),
            reason: e.to_string(),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{FetchError, RawRow};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(d(1), d(31)).unwrap()
    }

    fn id() -> InstrumentId {
        InstrumentId::parse("AAK").unwrap()
    }

    enum Canned {
        Rows(Vec<RawRow>),
        NotFound,
        RateLimited,
        Panic,
    }

    struct CannedProvider(Canned);

    impl PriceProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        fn fetch(&self, id: &InstrumentId, _range: &DateRange) -> Result<RawSeries, FetchError> {
            match &self.0 {
                Canned::Rows(rows) => Ok(RawSeries::new(Some("Ak Fon".into()), rows.clone())),
                Canned::NotFound => Err(FetchError::NotFound { id: id.clone() }),
                Canned::RateLimited => Err(FetchError::RateLimited { status: 429 }),
                Canned::Panic => panic!("upstream exploded"),
            }
        }
    }

    #[test]
    fn rows_become_sorted_success() {
        let p = CannedProvider(Canned::Rows(vec![
            RawRow::new(d(5), 2.0),
            RawRow::new(d(2), 1.0),
        ]));
        match fetch_series(&p, &id(), &range()) {
            FetchOutcome::Success(s) => {
                assert_eq!(s.len(), 2);
                assert_eq!(s.first().unwrap().date, d(2));
                assert_eq!(s.title(), Some("Ak Fon"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn no_rows_is_empty_not_failure() {
        let p = CannedProvider(Canned::Rows(vec![]));
        let outcome = fetch_series(&p, &id(), &range());
        assert_eq!(outcome, FetchOutcome::Empty(id()));
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn only_invalid_rows_is_empty() {
        let p = CannedProvider(Canned::Rows(vec![RawRow::new(d(1), 0.0)]));
        assert_eq!(fetch_series(&p, &id(), &range()), FetchOutcome::Empty(id()));
    }

    #[test]
    fn not_found_is_empty() {
        let p = CannedProvider(Canned::NotFound);
        assert_eq!(fetch_series(&p, &id(), &range()), FetchOutcome::Empty(id()));
    }

    #[test]
    fn transient_error_is_retryable_failure() {
        let p = CannedProvider(Canned::RateLimited);
        let outcome = fetch_series(&p, &id(), &range());
        assert!(outcome.is_retryable());
        match outcome {
            FetchOutcome::Failure { reason, .. } => assert!(reason.contains("429")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn panic_is_contained_as_failure() {
        let p = CannedProvider(Canned::Panic);
        match fetch_series(&p, &id(), &range()) {
            FetchOutcome::Failure { reason, .. } => {
                assert!(reason.contains("upstream exploded"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn outcome_id_is_always_available() {
        let p = CannedProvider(Canned::RateLimited);
        assert_eq!(fetch_series(&p, &id(), &range()).id(), &id());
    }
}
