//! Domain types for fund price scanning

pub mod ids;
pub mod range;
pub mod series;

pub use ids::{IdError, InstrumentId};
pub use range::{DateRange, RangeError};
pub use series::{PricePoint, PriceSeries, SeriesError};
