//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over price sources (TEFAS over HTTP, a
//! local directory of CSV files) so the scheduler can be driven by either and
//! mocked for tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DateRange, InstrumentId};

/// Raw daily row from a provider (before validation/deduplication).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: NaiveDate,
    pub price: f64,
    pub market_cap: Option<f64>,
    pub investor_count: Option<u64>,
}

impl RawRow {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self {
            date,
            price,
            market_cap: None,
            investor_count: None,
        }
    }
}

/// Everything one upstream call returned for a fund.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub title: Option<String>,
    pub rows: Vec<RawRow>,
}

impl RawSeries {
    pub fn new(title: Option<String>, rows: Vec<RawRow>) -> Self {
        Self { title, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Structured error types for a single upstream call.
///
/// Every variant except `NotFound` is treated as transient by the scheduler.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by upstream (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("instrument not found: {id}")]
    NotFound { id: InstrumentId },
}

impl FetchError {
    /// Whether a later, slower attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::NotFound { .. })
    }
}

/// Trait for price providers (TEFAS, CSV directory, test doubles).
///
/// One call to `fetch` is exactly one upstream round-trip. Implementations
/// must not retry internally; backoff belongs to the stage scheduler.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily rows for a fund over an inclusive date range.
    fn fetch(&self, id: &InstrumentId, range: &DateRange) -> Result<RawSeries, FetchError>;
}
