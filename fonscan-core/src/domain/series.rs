//! Daily price history for one fund.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::InstrumentId;

/// One daily observation. `price` is always positive and finite once it sits
/// inside a [`PriceSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
    pub market_cap: Option<f64>,
    pub investor_count: Option<u64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self {
            date,
            price,
            market_cap: None,
            investor_count: None,
        }
    }

    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series for {id} is not strictly ascending at {date}")]
    NotAscending { id: InstrumentId, date: NaiveDate },

    #[error("series for {id} has invalid price {price} on {date}")]
    InvalidPrice {
        id: InstrumentId,
        date: NaiveDate,
        price: f64,
    },
}

/// Strictly date-ascending, one point per date, positive prices.
///
/// Raw provider rows go through `data::canonicalize` before they get here;
/// [`PriceSeries::new`] only checks the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    id: InstrumentId,
    title: Option<String>,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(
        id: InstrumentId,
        title: Option<String>,
        points: Vec<PricePoint>,
    ) -> Result<Self, SeriesError> {
        for p in &points {
            if !p.has_valid_price() {
                return Err(SeriesError::InvalidPrice {
                    id,
                    date: p.date,
                    price: p.price,
                });
            }
        }
        if let Some(w) = points.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(SeriesError::NotAscending { id, date: w[1].date });
        }
        Ok(Self { id, title, points })
    }

    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    /// Fund title as reported by the upstream, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.price)
    }

    /// Latest point dated on or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Option<&PricePoint> {
        let idx = self.points.partition_point(|p| p.date <= date);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// Most recent known price on or before `date`; `None` when the series
    /// starts after it.
    pub fn as_of_price(&self, date: NaiveDate) -> Option<f64> {
        self.as_of(date).map(|p| p.price)
    }
}
