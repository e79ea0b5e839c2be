// ============================================================
// Layer 5a — Checkpoint Policy
// ============================================================
// consider(eval_loss, best) -> (new_best, should_persist)
//
// Strict improvement only: an equal score never triggers a write.
// There is one "best" slot, so a regression after the best point
// cannot be recovered to an intermediate state.

use crate::spin::config::CheckpointMode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointDecision {
    pub new_best:       f64,
    pub should_persist: bool,
}

/// The strict-improvement rule. NaN never improves.
pub fn consider(eval_loss: f64, best_eval_loss: f64) -> (f64, bool) {
    if eval_loss < best_eval_loss {
        (eval_loss, true)
    } else {
        (best_eval_loss, false)
    }
}

pub trait CheckpointPolicy {
    fn name(&self) -> &'static str;

    fn consider(&self, eval_loss: f64, best_eval_loss: f64) -> CheckpointDecision;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BestOnly;

impl CheckpointPolicy for BestOnly {
    fn name(&self) -> &'static str {
        "best"
    }

    fn consider(&self, eval_loss: f64, best_eval_loss: f64) -> CheckpointDecision {
        let (new_best, should_persist) = consider(eval_loss, best_eval_loss);
        CheckpointDecision { new_best, should_persist }
    }
}

/// Writes the slot after every iteration; the best score is tracked
/// with the same strict rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryEpoch;

impl CheckpointPolicy for EveryEpoch {
    fn name(&self) -> &'static str {
        "every-epoch"
    }

    fn consider(&self, eval_loss: f64, best_eval_loss: f64) -> CheckpointDecision {
        let (new_best, _) = consider(eval_loss, best_eval_loss);
        CheckpointDecision { new_best, should_persist: true }
    }
}

pub fn policy_for(mode: CheckpointMode) -> Box<dyn CheckpointPolicy> {
    match mode {
        CheckpointMode::Best       => Box::new(BestOnly),
        CheckpointMode::EveryEpoch => Box::new(EveryEpoch),
    }
}
