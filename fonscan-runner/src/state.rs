//! Run ledger.
//!
//! `RunState` is a value rebuilt at every stage boundary: [`RunState::absorb_stage`]
//! consumes the previous state plus one stage's outcomes and returns the next
//! state. Workers never touch it.
//!
//! Membership invariant, checked after every absorb: each submitted id sits in
//! exactly one of `successes`, `no_data` or `pending`. Failure history is kept
//! separately per stage, so an id that failed twice and then succeeded is in
//! `successes` and appears in the first two stage records only.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use thiserror::Error;

use fonscan_core::data::FetchOutcome;
use fonscan_core::domain::{InstrumentId, PriceSeries};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("stage '{stage}' returned no outcome for {missing:?}")]
    MissingOutcomes {
        stage: String,
        missing: Vec<InstrumentId>,
    },

    #[error("stage '{stage}' returned outcomes for ids that were not pending: {unexpected:?}")]
    UnexpectedOutcomes {
        stage: String,
        unexpected: Vec<InstrumentId>,
    },

    #[error("stage '{stage}' filed an outcome for {actual} under {key}")]
    MisfiledOutcome {
        stage: String,
        key: InstrumentId,
        actual: InstrumentId,
    },

    #[error("ledger out of balance: {0}")]
    Unbalanced(String),
}

/// What happened during one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub name: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub no_data: usize,
    /// Retryable failures of this stage, with their reasons.
    pub failures: BTreeMap<InstrumentId, String>,
    pub elapsed: Duration,
}

impl StageRecord {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// The most recent retryable failure of an id that has not succeeded since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFailure {
    /// Zero-based stage index.
    pub stage: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunState {
    all_ids: BTreeSet<InstrumentId>,
    successes: BTreeMap<InstrumentId, PriceSeries>,
    /// Terminal empty results, keyed to the stage that saw them.
    no_data: BTreeMap<InstrumentId, String>,
    pending: BTreeSet<InstrumentId>,
    stages: Vec<StageRecord>,
    last_failure: BTreeMap<InstrumentId, LastFailure>,
}

impl RunState {
    /// Fresh ledger: everything pending, no stages run.
    pub fn new(all_ids: BTreeSet<InstrumentId>) -> Self {
        Self {
            pending: all_ids.clone(),
            all_ids,
            ..Self::default()
        }
    }

    /// Fold one stage's outcomes in. The outcome keys must be exactly the
    /// pending set.
    pub fn absorb_stage(
        mut self,
        stage: &str,
        outcomes: BTreeMap<InstrumentId, FetchOutcome>,
        elapsed: Duration,
    ) -> Result<Self, LedgerError> {
        let missing: Vec<InstrumentId> = self
            .pending
            .iter()
            .filter(|id| !outcomes.contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::MissingOutcomes {
                stage: stage.to_string(),
                missing,
            });
        }
        let unexpected: Vec<InstrumentId> = outcomes
            .keys()
            .filter(|id| !self.pending.contains(*id))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(LedgerError::UnexpectedOutcomes {
                stage: stage.to_string(),
                unexpected,
            });
        }

        let stage_index = self.stages.len();
        let mut record = StageRecord {
            name: stage.to_string(),
            attempted: outcomes.len(),
            succeeded: 0,
            no_data: 0,
            failures: BTreeMap::new(),
            elapsed,
        };
        let mut next_pending = BTreeSet::new();

        for (key, outcome) in outcomes {
            if outcome.id() != &key {
                return Err(LedgerError::MisfiledOutcome {
                    stage: stage.to_string(),
                    actual: outcome.id().clone(),
                    key,
                });
            }
            match outcome {
                FetchOutcome::Success(series) => {
                    record.succeeded += 1;
                    self.last_failure.remove(&key);
                    self.successes.insert(key, series);
                }
                FetchOutcome::Empty(_) => {
                    record.no_data += 1;
                    self.last_failure.remove(&key);
                    self.no_data.insert(key, stage.to_string());
                }
                FetchOutcome::Failure { reason, .. } => {
                    self.last_failure.insert(
                        key.clone(),
                        LastFailure {
                            stage: stage_index,
                            reason: reason.clone(),
                        },
                    );
                    record.failures.insert(key.clone(), reason);
                    next_pending.insert(key);
                }
            }
        }

        self.pending = next_pending;
        self.stages.push(record);
        self.check_invariants()?;
        Ok(self)
    }

    /// Every submitted id in exactly one of successes / no-data / pending,
    /// and a last-failure reason exactly for the pending ones once a stage ran.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let total = self.successes.len() + self.no_data.len() + self.pending.len();
        if total != self.all_ids.len() {
            return Err(LedgerError::Unbalanced(format!(
                "{} successes + {} no-data + {} pending != {} submitted",
                self.successes.len(),
                self.no_data.len(),
                self.pending.len(),
                self.all_ids.len()
            )));
        }
        for id in &self.all_ids {
            let homes = usize::from(self.successes.contains_key(id))
                + usize::from(self.no_data.contains_key(id))
                + usize::from(self.pending.contains(id));
            if homes != 1 {
                return Err(LedgerError::Unbalanced(format!(
                    "{id} is in {homes} buckets"
                )));
            }
        }
        if !self.stages.is_empty() {
            let with_reason: BTreeSet<&InstrumentId> = self.last_failure.keys().collect();
            let pending: BTreeSet<&InstrumentId> = self.pending.iter().collect();
            if with_reason != pending {
                return Err(LedgerError::Unbalanced(
                    "last-failure reasons do not match the pending set".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn all_ids(&self) -> &BTreeSet<InstrumentId> {
        &self.all_ids
    }

    pub fn successes(&self) -> &BTreeMap<InstrumentId, PriceSeries> {
        &self.successes
    }

    /// Ids that came back empty, with the stage that reported it.
    pub fn no_data(&self) -> &BTreeMap<InstrumentId, String> {
        &self.no_data
    }

    /// Still unresolved. After the last stage these are the final failures.
    pub fn pending(&self) -> &BTreeSet<InstrumentId> {
        &self.pending
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn last_failure(&self, id: &InstrumentId) -> Option<&LastFailure> {
        self.last_failure.get(id)
    }

    /// Final failure count: no-data plus unresolved.
    pub fn terminal_failures(&self) -> usize {
        self.no_data.len() + self.pending.len()
    }

    pub fn into_successes(self) -> BTreeMap<InstrumentId, PriceSeries> {
        self.successes
    }
}
