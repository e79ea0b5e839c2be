// Scripted learner for unit tests of the training core. Losses are
// plain f64 values configured per test; every call is recorded.

use rand::rngs::StdRng;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};
use crate::spin::config::{AdapterConfig, SamplingConfig};
use crate::spin::learner::{CheckpointMeta, Learner};

pub(crate) const PAD: u32 = 0;

pub(crate) struct ScriptedLearner {
    pub adapter:         bool,
    pub attach_calls:    usize,
    pub base_params:     usize,
    pub adapter_params:  usize,
    /// Loss returned for batches whose labels differ from the inputs
    pub real_loss:       f64,
    /// Loss returned for self-supervised batches (labels == inputs)
    pub synthetic_loss:  f64,
    /// Eval losses popped one per eval batch; 1.0 once exhausted
    pub eval_losses:     RefCell<VecDeque<f64>>,
    pub backward_inputs: Vec<f64>,
    pub updates:         usize,
    pub persisted:       RefCell<Vec<CheckpointMeta>>,
    pub generate_calls:  Cell<usize>,
    pub fail_generation: bool,
    pub training:        bool,
}

impl ScriptedLearner {
    pub fn new() -> Self {
        Self {
            adapter:         false,
            attach_calls:    0,
            base_params:     10_000,
            adapter_params:  256,
            real_loss:       1.0,
            synthetic_loss:  2.0,
            eval_losses:     RefCell::new(VecDeque::new()),
            backward_inputs: Vec::new(),
            updates:         0,
            persisted:       RefCell::new(Vec::new()),
            generate_calls:  Cell::new(0),
            fail_generation: false,
            training:        false,
        }
    }
}

impl Learner for ScriptedLearner {
    type Loss = f64;

    fn pad_id(&self) -> u32 {
        PAD
    }

    fn has_adapter(&self) -> bool {
        self.adapter
    }

    fn attach_adapter(&mut self, config: &AdapterConfig) -> SpinResult<()> {
        self.attach_calls  += 1;
        self.adapter        = true;
        self.adapter_params = 2 * config.rank * 8 * config.target_layers.len();
        Ok(())
    }

    fn trainable_params(&self) -> usize {
        if self.adapter { self.adapter_params } else { self.base_params }
    }

    fn set_train_mode(&mut self, training: bool) {
        self.training = training;
    }

    fn supervised_loss(&self, batch: &Batch) -> SpinResult<f64> {
        match &batch.labels {
            Some(labels) if *labels == batch.input_ids => Ok(self.synthetic_loss),
            Some(_) => Ok(self.real_loss),
            None => Err(SpinError::data("scripted learner needs labels")),
        }
    }

    fn generate(
        &self,
        prompts:   &[Vec<u32>],
        _sampling: &SamplingConfig,
        _rng:      &mut StdRng,
    ) -> SpinResult<Vec<Vec<u32>>> {
        self.generate_calls.set(self.generate_calls.get() + 1);
        if self.fail_generation {
            return Err(SpinError::Compute("scripted generation failure".into()));
        }
        Ok(prompts.iter().map(|p| [p.as_slice(), &[7, 8]].concat()).collect())
    }

    fn backward(&mut self, loss: f64) -> SpinResult<()> {
        self.backward_inputs.push(loss);
        Ok(())
    }

    fn apply_update(&mut self) -> SpinResult<()> {
        self.updates += 1;
        Ok(())
    }

    fn eval_loss(&self, _batch: &Batch) -> SpinResult<f64> {
        Ok(self.eval_losses.borrow_mut().pop_front().unwrap_or(1.0))
    }

    fn persist(&self, _dir: &Path, meta: CheckpointMeta) -> SpinResult<()> {
        self.persisted.borrow_mut().push(meta);
        Ok(())
    }
}

/// `rows` supervised rows of `[BOS] p p t t [EOS]` with the prompt
/// masked out of the labels.
pub(crate) fn supervised_batch(rows: usize) -> Batch {
    let row    = vec![2, 10, 11, 12, 13, 3];
    let labels = vec![PAD, PAD, PAD, 12, 13, 3];
    Batch {
        input_ids:      vec![row; rows],
        attention_mask: vec![vec![1; 6]; rows],
        labels:         Some(vec![labels; rows]),
        prompt_lens:    vec![3; rows],
    }
}
