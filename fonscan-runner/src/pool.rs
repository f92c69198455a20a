//! Per-stage bounded worker pool.
//!
//! Each stage gets its own rayon pool sized to the stage's `max_concurrency`,
//! so at most that many fetches (including their pre-fetch sleeps) are in
//! flight. Results come back through the pool's return value; workers share
//! nothing mutable except a completion counter for progress.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use fonscan_core::data::{fetch_series, FetchOutcome, PriceProvider};
use fonscan_core::domain::{DateRange, InstrumentId};
use fonscan_core::rng::JitterSeeds;

use crate::config::StageConfig;
use crate::state::StageRecord;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("stage '{stage}': max_concurrency must be at least 1")]
    ZeroConcurrency { stage: String },

    #[error("stage '{stage}': failed to build worker pool: {source}")]
    Build {
        stage: String,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Progress callbacks for a scan. Called from worker threads.
pub trait FetchProgress: Sync {
    fn on_stage_start(&self, stage: &StageConfig, index: usize, total_stages: usize, pending: usize);

    fn on_outcome(&self, stage: &str, outcome: &FetchOutcome, done: usize, total: usize);

    fn on_stage_complete(&self, record: &StageRecord, still_pending: usize);
}

/// Reports progress as `tracing` events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_stage_start(&self, stage: &StageConfig, index: usize, total_stages: usize, pending: usize) {
        info!(
            stage = %stage.name,
            concurrency = stage.max_concurrency,
            base_delay_secs = stage.base_delay_secs,
            jitter_secs = stage.jitter_secs,
            "stage {}/{}: fetching {pending} funds",
            index + 1,
            total_stages,
        );
    }

    fn on_outcome(&self, stage: &str, outcome: &FetchOutcome, done: usize, total: usize) {
        match outcome {
            FetchOutcome::Failure { id, reason } => {
                debug!(stage, %id, done, total, "failed: {reason}");
            }
            other => debug!(stage, id = %other.id(), done, total, "{}", other.label()),
        }
    }

    fn on_stage_complete(&self, record: &StageRecord, still_pending: usize) {
        info!(
            stage = %record.name,
            attempted = record.attempted,
            succeeded = record.succeeded,
            no_data = record.no_data,
            failed = record.failed(),
            elapsed_ms = record.elapsed.as_millis() as u64,
            "stage complete; {still_pending} left for the next stage"
        );
        if record.attempted > 0 && record.failed() == record.attempted {
            warn!(stage = %record.name, "every fetch in this stage failed");
        }
    }
}

/// Silent progress, for tests and library callers.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_stage_start(&self, _: &StageConfig, _: usize, _: usize, _: usize) {}
    fn on_outcome(&self, _: &str, _: &FetchOutcome, _: usize, _: usize) {}
    fn on_stage_complete(&self, _: &StageRecord, _: usize) {}
}

/// Runs one stage's batch against a provider.
pub struct StageWorkerPool<'a> {
    provider: &'a dyn PriceProvider,
    seeds: JitterSeeds,
    progress: &'a dyn FetchProgress,
}

impl<'a> StageWorkerPool<'a> {
    pub fn new(
        provider: &'a dyn PriceProvider,
        seeds: JitterSeeds,
        progress: &'a dyn FetchProgress,
    ) -> Self {
        Self {
            provider,
            seeds,
            progress,
        }
    }

    pub fn progress(&self) -> &'a dyn FetchProgress {
        self.progress
    }

    /// Fetch every id once and return one outcome per id.
    ///
    /// Blocks until all tasks have resolved. Each task sleeps for the stage's
    /// pre-fetch delay first, drawn from its own (stage, id) RNG.
    pub fn run(
        &self,
        ids: &BTreeSet<InstrumentId>,
        stage: &StageConfig,
        range: &DateRange,
    ) -> Result<BTreeMap<InstrumentId, FetchOutcome>, PoolError> {
        if stage.max_concurrency == 0 {
            return Err(PoolError::ZeroConcurrency {
                stage: stage.name.clone(),
            });
        }
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(stage.max_concurrency.min(ids.len()))
            .thread_name(|i| format!("fetch-{i}"))
            .build()
            .map_err(|source| PoolError::Build {
                stage: stage.name.clone(),
                source,
            })?;

        let work: Vec<&InstrumentId> = ids.iter().collect();
        let total = work.len();
        let done = AtomicUsize::new(0);

        let outcomes = pool.install(|| {
            work.par_iter()
                .with_max_len(1)
                .map(|&id| {
                    let delay = stage.pre_fetch_delay(&mut self.seeds.rng_for(&stage.name, id));
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    let outcome = fetch_series(self.provider, id, range);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    self.progress.on_outcome(&stage.name, &outcome, n, total);
                    (id.clone(), outcome)
                })
                .collect::<BTreeMap<_, _>>()
        });

        Ok(outcomes)
    }
}
