//! End-to-end scans: universe -> staged fetch -> metrics -> ranked report.
//!
//! Both scans share the fetch half (scheduler + ledger + summary) and differ
//! only in the date window and the metric applied to each fetched series.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use fonscan_core::data::{PriceProvider, Universe};
use fonscan_core::domain::{DateRange, InstrumentId, PriceSeries};
use fonscan_core::metrics::{AnalysisRecord, RiskMetrics};
use fonscan_core::returns::{InsufficientWindow, ReturnCalculator, WeeklyReturnRecord};
use fonscan_core::rng::JitterSeeds;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::pool::{FetchProgress, StageWorkerPool};
use crate::ranking::{rank_analysis, rank_weekly};
use crate::scheduler::StageScheduler;
use crate::state::RunState;
use crate::summary::RunSummary;

/// Weekly momentum result.
#[derive(Debug, Clone)]
pub struct WeeklyScanReport {
    pub today: NaiveDate,
    pub range: DateRange,
    pub weeks: usize,
    pub threshold: f64,
    /// Records at or above the threshold, best first.
    pub ranked: Vec<WeeklyReturnRecord>,
    /// Complete records that missed the threshold.
    pub below_threshold: usize,
    /// Fetched series with at least one unresolvable period.
    pub insufficient: Vec<InsufficientWindow>,
    pub summary: RunSummary,
}

/// Detailed risk analysis result.
#[derive(Debug, Clone)]
pub struct AnalysisScanReport {
    pub today: NaiveDate,
    pub range: DateRange,
    /// Sortino, then Sharpe, descending.
    pub ranked: Vec<AnalysisRecord>,
    /// Fetched series shorter than `min_points`.
    pub insufficient: Vec<InstrumentId>,
    pub summary: RunSummary,
}

/// Registry name, else the upstream title, else the code.
pub fn display_name(universe: &Universe, series: &PriceSeries) -> String {
    universe
        .name(series.id())
        .or_else(|| series.title())
        .map(str::to_string)
        .unwrap_or_else(|| series.id().to_string())
}

fn fetch_all(
    config: &ScanConfig,
    universe: &Universe,
    range: &DateRange,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
) -> Result<RunState, ScanError> {
    config.validate()?;
    for warning in config.ladder_warnings() {
        warn!("{warning}");
    }
    if universe.is_empty() {
        return Err(ScanError::EmptyUniverse);
    }

    let seeds = config
        .jitter_seed
        .map(JitterSeeds::new)
        .unwrap_or_else(JitterSeeds::from_entropy);

    info!(
        provider = provider.name(),
        funds = universe.len(),
        stages = config.stages.len(),
        "fetching {range}"
    );
    let pool = StageWorkerPool::new(provider, seeds, progress);
    StageScheduler::new(pool).run(&universe.ids(), &config.stages, range)
}

/// Weekly momentum scan: `weeks` consecutive 7-day returns ending `today`,
/// summed, kept at or above `threshold`.
pub fn run_weekly_scan(
    config: &ScanConfig,
    universe: &Universe,
    today: NaiveDate,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
) -> Result<WeeklyScanReport, ScanError> {
    let range = config.weekly.range(today)?;
    let state = fetch_all(config, universe, &range, provider, progress)?;
    let summary = RunSummary::build(&state);

    let calc = ReturnCalculator::new(today, config.weekly.weeks);
    let mut records = Vec::new();
    let mut insufficient = Vec::new();
    for series in state.successes().values() {
        match calc.record(display_name(universe, series), series) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!("{e}");
                insufficient.push(e);
            }
        }
    }

    let complete = records.len();
    let ranked = rank_weekly(records, config.weekly.threshold);
    info!(
        complete,
        passed = ranked.len(),
        insufficient = insufficient.len(),
        "weekly scan done; {} funds at or above {}%",
        ranked.len(),
        config.weekly.threshold
    );

    Ok(WeeklyScanReport {
        today,
        range,
        weeks: config.weekly.weeks,
        threshold: config.weekly.threshold,
        below_threshold: complete - ranked.len(),
        ranked,
        insufficient,
        summary,
    })
}

/// Detailed analysis scan over `lookback_months`, ranked by Sortino.
pub fn run_analysis_scan(
    config: &ScanConfig,
    universe: &Universe,
    today: NaiveDate,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
) -> Result<AnalysisScanReport, ScanError> {
    let range = config.analysis.range(today)?;
    let state = fetch_all(config, universe, &range, provider, progress)?;
    let summary = RunSummary::build(&state);

    let mut records = Vec::new();
    let mut insufficient = Vec::new();
    for (id, series) in state.successes() {
        match RiskMetrics::compute(series, config.analysis.min_points) {
            Some(metrics) => records.push(AnalysisRecord::new(
                id.clone(),
                display_name(universe, series),
                metrics,
            )),
            None => {
                debug!(%id, points = series.len(), "too few points for risk metrics");
                insufficient.push(id.clone());
            }
        }
    }

    let ranked = rank_analysis(records);
    info!(
        analysed = ranked.len(),
        insufficient = insufficient.len(),
        "analysis scan done"
    );

    Ok(AnalysisScanReport {
        today,
        range,
        ranked,
        insufficient,
        summary,
    })
}

