// ============================================================
// Layer 5a — Training Events
// ============================================================
// Structured records of what the controller did. The caller
// routes them wherever it likes (tracing, CSV, a UI); the core
// itself only logs at debug level.

use serde::{Deserialize, Serialize};

use crate::spin::loss::LossComponents;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration:      usize,
    pub steps:          usize,
    /// Mean unscaled total loss over the epoch
    pub train_loss:     f64,
    pub real_loss:      f64,
    /// Mean synthetic loss, None when self-play was inactive
    pub synthetic_loss: Option<f64>,
    pub eval_loss:      f64,
    pub best_eval_loss: f64,
    pub persisted:      bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainEvent {
    AdapterAttached {
        trainable_params: usize,
        newly_attached:   bool,
    },
    IterationStarted {
        iteration: usize,
    },
    StepCompleted {
        iteration:   usize,
        step:        usize,
        components:  LossComponents,
        scaled_loss: f64,
    },
    OptimizerUpdate {
        iteration: usize,
        step:      usize,
    },
    Evaluated {
        iteration: usize,
        eval_loss: f64,
    },
    CheckpointDecided {
        iteration:      usize,
        eval_loss:      f64,
        best_eval_loss: f64,
        persisted:      bool,
    },
    IterationCompleted(IterationSummary),
}

/// Final result of one `train()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    /// Mean training loss of the last iteration
    pub training_loss:  f64,
    pub best_eval_loss: f64,
    pub iterations:     Vec<IterationSummary>,
    pub events:         Vec<TrainEvent>,
}

impl TrainReport {
    pub fn persisted_iterations(&self) -> Vec<usize> {
        self.iterations
            .iter()
            .filter(|s| s.persisted)
            .map(|s| s.iteration)
            .collect()
    }
}
