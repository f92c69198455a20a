//! Price acquisition: provider seam, concrete providers, classification, universe

pub mod canonicalize;
pub mod csv_dir;
pub mod fetcher;
pub mod provider;
pub mod tefas;
pub mod universe;

pub use canonicalize::{canonicalize, CanonicalReport};
pub use csv_dir::CsvDirProvider;
pub use fetcher::{fetch_series, FetchOutcome};
pub use provider::{FetchError, PriceProvider, RawRow, RawSeries};
pub use tefas::{TefasOptions, TefasProvider};
pub use universe::{Universe, UniverseError};
