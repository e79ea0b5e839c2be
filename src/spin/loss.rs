// ============================================================
// Layer 5a — Loss Composer
// ============================================================
// compose(model, batch, iteration, beta) -> (total, components)
//
//   iteration == 0 : total = real
//   iteration  > 0 : total = real + beta * synthetic
//
// Iteration 0 trains on real data only, so self-play starts from a
// reference policy instead of an untrained model's generations.

use serde::{Deserialize, Serialize};

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};
use crate::spin::learner::{Learner, LossValue};
use crate::spin::synthesis::Synthesizer;

/// Scalar view of one composed loss, for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossComponents {
    pub real:      f64,
    pub synthetic: Option<f64>,
    pub total:     f64,
}

pub struct ComposedLoss<T> {
    /// Differentiable total, ready for backpropagation
    pub total:      T,
    pub components: LossComponents,
}

/// The composition rule on plain scalars.
pub fn combine(real: f64, synthetic: Option<f64>, iteration: usize, beta: f64) -> f64 {
    match synthetic {
        Some(s) if iteration > 0 => real + beta * s,
        _ => real,
    }
}

pub trait LossComposer<L: Learner> {
    fn compose(
        &mut self,
        learner:   &L,
        batch:     &Batch,
        iteration: usize,
    ) -> SpinResult<ComposedLoss<L::Loss>>;
}

fn checked(value: f64, what: &str) -> SpinResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SpinError::Compute(format!("{what} loss is not finite ({value})")))
    }
}

// ─── SupervisedComposer ───────────────────────────────────────────────────────
/// Real loss only, whatever the iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisedComposer;

impl<L: Learner> LossComposer<L> for SupervisedComposer {
    fn compose(&mut self, learner: &L, batch: &Batch, _iteration: usize) -> SpinResult<ComposedLoss<L::Loss>> {
        batch.validate_supervised()?;
        let real  = learner.supervised_loss(batch)?;
        let value = checked(real.value(), "real")?;
        Ok(ComposedLoss {
            total:      real,
            components: LossComponents { real: value, synthetic: None, total: value },
        })
    }
}

// ─── SelfPlayComposer ─────────────────────────────────────────────────────────
pub struct SelfPlayComposer<L: Learner> {
    beta:        f64,
    synthesizer: Box<dyn Synthesizer<L>>,
}

impl<L: Learner> SelfPlayComposer<L> {
    pub fn new(beta: f64, synthesizer: Box<dyn Synthesizer<L>>) -> Self {
        Self { beta, synthesizer }
    }
}

impl<L: Learner> LossComposer<L> for SelfPlayComposer<L> {
    fn compose(&mut self, learner: &L, batch: &Batch, iteration: usize) -> SpinResult<ComposedLoss<L::Loss>> {
        batch.validate_supervised()?;
        let real       = learner.supervised_loss(batch)?;
        let real_value = checked(real.value(), "real")?;

        if iteration == 0 {
            return Ok(ComposedLoss {
                total:      real,
                components: LossComponents { real: real_value, synthetic: None, total: real_value },
            });
        }

        // Phase 1: synthesis (sampling, no gradients)
        let synthetic_batch = self.synthesizer.synthesize(learner, batch)?;

        // Phase 2: scoring
        let synthetic       = learner.supervised_loss(&synthetic_batch)?;
        let synthetic_value = checked(synthetic.value(), "synthetic")?;

        let total = real.plus(synthetic.scaled(self.beta));
        Ok(ComposedLoss {
            components: LossComponents {
                real:      real_value,
                synthetic: Some(synthetic_value),
                total:     total.value(),
            },
            total,
        })
    }
}
