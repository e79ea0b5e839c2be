// ============================================================
// Layer 5a — Learner (the numerical collaborator)
// ============================================================
// Everything the training core needs from a model, and nothing
// more: forward losses, sampling, gradient accumulation, the
// optimiser update, adapter attachment and persistence.
//
// Implementations:
//   - ml::learner::BurnLearner → Burn autodiff model + AdamW
//   - spin::testing            → scripted losses for unit tests

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::batch::Batch;
use crate::domain::error::SpinResult;
use crate::spin::config::{AdapterConfig, SamplingConfig};

/// A differentiable scalar loss.
///
/// `scaled` and `plus` build new graph nodes; `value` reads the
/// current scalar without affecting gradients.
pub trait LossValue: Sized {
    fn value(&self) -> f64;
    fn scaled(self, factor: f64) -> Self;
    fn plus(self, other: Self) -> Self;
}

/// Plain scalars stand in for tensors in scripted learners.
impl LossValue for f64 {
    fn value(&self) -> f64 {
        *self
    }

    fn scaled(self, factor: f64) -> Self {
        self * factor
    }

    fn plus(self, other: Self) -> Self {
        self + other
    }
}

/// What gets written next to the weights of a persisted checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub iteration: usize,
    pub eval_loss: f64,
}

pub trait Learner {
    type Loss: LossValue;

    fn pad_id(&self) -> u32;

    fn has_adapter(&self) -> bool;

    /// Freeze the current parameters and insert trainable adapters.
    /// Only called by the AdapterManager, and only when `has_adapter()`
    /// is false.
    fn attach_adapter(&mut self, config: &AdapterConfig) -> SpinResult<()>;

    /// Number of scalar parameters the optimiser may update.
    fn trainable_params(&self) -> usize;

    fn set_train_mode(&mut self, training: bool);

    /// Next-token cross entropy of `batch.labels` given `batch.input_ids`.
    fn supervised_loss(&self, batch: &Batch) -> SpinResult<Self::Loss>;

    /// Sample one continuation per prompt from the current weights.
    /// No gradients are tracked. Returned sequences include the prompt.
    fn generate(
        &self,
        prompts:  &[Vec<u32>],
        sampling: &SamplingConfig,
        rng:      &mut StdRng,
    ) -> SpinResult<Vec<Vec<u32>>>;

    /// Backpropagate and add the result to the gradient buffers.
    fn backward(&mut self, loss: Self::Loss) -> SpinResult<()>;

    /// Apply the accumulated gradients and clear the buffers.
    fn apply_update(&mut self) -> SpinResult<()>;

    /// Supervised loss in evaluation mode (no dropout, no graph).
    fn eval_loss(&self, batch: &Batch) -> SpinResult<f64>;

    /// Overwrite the checkpoint in `dir` with the full model state.
    fn persist(&self, dir: &Path, meta: CheckpointMeta) -> SpinResult<()>;
}
