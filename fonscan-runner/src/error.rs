//! Setup-phase errors. Per-fund problems never surface here; they end up in
//! the run ledger instead.

use thiserror::Error;

use fonscan_core::data::UniverseError;
use fonscan_core::domain::RangeError;

use crate::config::ConfigError;
use crate::pool::PoolError;
use crate::state::LedgerError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("universe is empty: nothing to scan")]
    EmptyUniverse,

    #[error("no stages configured")]
    NoStages,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error("date range: {0}")]
    Range(#[from] RangeError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
