//! Jitter seeds.
//!
//! Every (stage, fund) pair gets its own RNG derived from one master seed
//! through BLAKE3, so the pre-fetch delay a task draws does not depend on
//! which worker thread picks it up or in what order.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::InstrumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterSeeds {
    master_seed: u64,
}

impl JitterSeeds {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Seeded from OS entropy; jitter then differs run to run.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for one task. Independent of derivation order.
    pub fn sub_seed(&self, stage: &str, id: &InstrumentId) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stage.as_bytes());
        // Separator keeps ("ab", "C") and ("a", "BC") apart.
        hasher.update(&[0]);
        hasher.update(id.as_str().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, stage: &str, id: &InstrumentId) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stage, id))
    }
}
