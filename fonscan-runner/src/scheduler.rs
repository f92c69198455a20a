//! Stage scheduler: one state machine over an ordered retry ladder.
//!
//! ```text
//! pending = all ids
//! for stage in ladder:
//!     pending empty?  -> stop early
//!     outcomes = pool.run(pending, stage)       (blocks until all resolve)
//!     state    = state.absorb_stage(outcomes)   (pending = this stage's failures)
//! leftover pending = final unresolved failures
//! ```
//!
//! Stages never overlap. Stage k+1 is not started until every task of
//! stage k has returned.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{info, warn};

use fonscan_core::domain::{DateRange, InstrumentId};

use crate::config::StageConfig;
use crate::error::ScanError;
use crate::pool::StageWorkerPool;
use crate::state::RunState;

pub struct StageScheduler<'a> {
    pool: StageWorkerPool<'a>,
}

impl<'a> StageScheduler<'a> {
    pub fn new(pool: StageWorkerPool<'a>) -> Self {
        Self { pool }
    }

    /// Drive `all_ids` through `stages`. Errors only on setup problems or a
    /// broken ledger; per-fund failures are recorded in the returned state.
    pub fn run(
        &self,
        all_ids: &BTreeSet<InstrumentId>,
        stages: &[StageConfig],
        range: &DateRange,
    ) -> Result<RunState, ScanError> {
        if all_ids.is_empty() {
            return Err(ScanError::EmptyUniverse);
        }
        if stages.is_empty() {
            return Err(ScanError::NoStages);
        }

        let progress = self.pool.progress();
        let mut state = RunState::new(all_ids.clone());

        for (index, stage) in stages.iter().enumerate() {
            if state.pending().is_empty() {
                info!(
                    skipped = stages.len() - index,
                    "every fund settled; skipping remaining stages"
                );
                break;
            }

            progress.on_stage_start(stage, index, stages.len(), state.pending().len());
            let started = Instant::now();
            let outcomes = self.pool.run(state.pending(), stage, range)?;
            state = state.absorb_stage(&stage.name, outcomes, started.elapsed())?;

            if let Some(record) = state.stages().last() {
                progress.on_stage_complete(record, state.pending().len());
            }
        }

        if !state.pending().is_empty() {
            warn!(
                unresolved = state.pending().len(),
                "funds still failing after the last stage"
            );
        }
        Ok(state)
    }
}
