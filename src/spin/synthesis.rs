// ============================================================
// Layer 5a — Synthesis (self-play phase 1)
// ============================================================
// Produces the synthetic batch the second loss term is scored on.
// Kept apart from the loss computation so the only source of
// non-determinism (sampling) has its own seed and can be swapped
// for a fixed stub in tests.

use rand::{rngs::StdRng, SeedableRng};

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};
use crate::spin::config::SamplingConfig;
use crate::spin::learner::Learner;

pub trait Synthesizer<L: Learner> {
    /// Generate one continuation per row of `batch` from the learner's
    /// current weights and package them as a self-supervised batch.
    fn synthesize(&mut self, learner: &L, batch: &Batch) -> SpinResult<Batch>;
}

/// Temperature sampling seeded once per trainer.
pub struct SamplingSynthesizer {
    sampling: SamplingConfig,
    rng:      StdRng,
}

impl SamplingSynthesizer {
    pub fn new(sampling: SamplingConfig, seed: u64) -> Self {
        Self { sampling, rng: StdRng::seed_from_u64(seed) }
    }
}

impl<L: Learner> Synthesizer<L> for SamplingSynthesizer {
    fn synthesize(&mut self, learner: &L, batch: &Batch) -> SpinResult<Batch> {
        let prompts   = batch.prompts();
        let sequences = learner.generate(&prompts, &self.sampling, &mut self.rng)?;
        if sequences.len() != prompts.len() {
            return Err(SpinError::Compute(format!(
                "generation returned {} sequences for {} prompts",
                sequences.len(),
                prompts.len()
            )));
        }
        Batch::self_supervised(sequences, learner.pad_id())
    }
}
