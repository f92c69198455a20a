//! fonscan runner: staged fetch scheduling, run ledger, ranking, export.
//!
//! This crate builds on `fonscan-core` to provide:
//! - Layered TOML configuration with a validated retry ladder
//! - A bounded, jittered worker pool per stage
//! - The stage scheduler and its append-only run ledger
//! - Weekly momentum and risk-analysis scans
//! - Run summaries and CSV/Markdown/JSON export

pub mod config;
pub mod error;
pub mod export;
pub mod pool;
pub mod ranking;
pub mod scan;
pub mod scheduler;
pub mod state;
pub mod summary;

pub use config::{
    default_stages, AnalysisConfig, ConfigError, ScanConfig, SourceConfig, SourceKind,
    StageConfig, UniverseConfig, WeeklyConfig, MAX_STAGE_DELAY_SECS,
};
pub use error::ScanError;
pub use export::{analysis_csv, export_analysis, export_weekly, weekly_csv, ExportPaths};
pub use pool::{FetchProgress, LogProgress, NoProgress, PoolError, StageWorkerPool};
pub use ranking::{rank_analysis, rank_weekly};
pub use scan::{run_analysis_scan, run_weekly_scan, AnalysisScanReport, WeeklyScanReport};
pub use scheduler::StageScheduler;
pub use state::{LastFailure, LedgerError, RunState, StageRecord};
pub use summary::{RunSummary, StageSummary, UnresolvedFund};
