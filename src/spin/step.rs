// ============================================================
// Layer 5a — Training Step Executor
// ============================================================
// One micro-batch: compose the loss, scale it for gradient
// accumulation, backpropagate. Parameters are not touched here;
// the controller applies the optimiser update on its schedule.

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};
use crate::spin::learner::{Learner, LossValue};
use crate::spin::loss::{LossComponents, LossComposer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Unscaled loss components
    pub components:  LossComponents,
    /// Detached value that was backpropagated
    pub scaled_loss: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StepExecutor {
    grad_accum_steps: usize,
}

impl StepExecutor {
    pub fn new(grad_accum_steps: usize) -> SpinResult<Self> {
        if grad_accum_steps == 0 {
            return Err(SpinError::config("grad_accum_steps must be at least 1"));
        }
        Ok(Self { grad_accum_steps })
    }

    pub fn grad_accum_steps(&self) -> usize {
        self.grad_accum_steps
    }

    /// Factor applied before backpropagation so that the sum over
    /// `grad_accum_steps` micro-batches approximates one full batch.
    pub fn loss_scale(&self) -> f64 {
        if self.grad_accum_steps > 1 {
            1.0 / self.grad_accum_steps as f64
        } else {
            1.0
        }
    }

    pub fn step<L: Learner>(
        &self,
        learner:   &mut L,
        composer:  &mut dyn LossComposer<L>,
        batch:     &Batch,
        iteration: usize,
    ) -> SpinResult<StepOutcome> {
        learner.set_train_mode(true);

        let composed = composer.compose(&*learner, batch, iteration)?;
        let loss = if self.grad_accum_steps > 1 {
            composed.total.scaled(self.loss_scale())
        } else {
            composed.total
        };
        let scaled_loss = loss.value();

        learner.backward(loss)?;

        Ok(StepOutcome { components: composed.components, scaled_loss })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spin::loss::SupervisedComposer;
    use crate::spin::testing::{supervised_batch, ScriptedLearner};

    #[test]
    fn test_accumulation_scales_loss_before_backward() {
        let mut learner = ScriptedLearner::new();
        learner.real_loss = 8.0;
        let executor = StepExecutor::new(4).unwrap();

        let outcome = executor
            .step(&mut learner, &mut SupervisedComposer, &supervised_batch(2), 0)
            .unwrap();

        assert_eq!(learner.backward_inputs, vec![2.0]);
        assert_eq!(outcome.scaled_loss, 2.0);
        assert_eq!(outcome.components.total, 8.0);
    }

    #[test]
    fn test_no_scaling_without_accumulation() {
        let mut learner = ScriptedLearner::new();
        learner.real_loss = 8.0;
        let executor = StepExecutor::new(1).unwrap();
        executor.step(&mut learner, &mut SupervisedComposer, &supervised_batch(1), 0).unwrap();
        assert_eq!(learner.backward_inputs, vec![8.0]);
    }

    #[test]
    fn test_step_sets_training_mode_and_never_updates() {
        let mut learner = ScriptedLearner::new();
        learner.training = false;
        let executor = StepExecutor::new(2).unwrap();
        executor.step(&mut learner, &mut SupervisedComposer, &supervised_batch(1), 0).unwrap();
        assert!(learner.training);
        assert_eq!(learner.updates, 0);
    }

    #[test]
    fn test_zero_accumulation_rejected() {
        assert!(StepExecutor::new(0).is_err());
    }
}
