// ============================================================
// Layer 5 — Burn Learner
// ============================================================
// Implements the training core's `Learner` on a Burn autodiff
// model:
//
//   supervised_loss  → CausalLm::forward_loss on the autodiff graph
//   backward         → loss.backward() → GradientsParams
//                      → GradientsAccumulator (no update yet)
//   apply_update     → AdamW step with the accumulated gradients
//   eval_loss        → model.valid() on the inner backend
//                      (no graph, dropout disabled)
//   generate         → model.valid() + ml::sampling
//   persist          → infra::checkpoint best slot
//
// Key Burn insight:
//   - optim.step takes the model by value; cloning a module
//     only clones parameter handles
//   - frozen parameters produce no gradients, so AdamW only
//     ever moves the adapter weights

use burn::{
    module::AutodiffModule,
    optim::{GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::rngs::StdRng;
use std::path::Path;

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{model::CausalLm, sampling::generate_sequence, tensors::BatchTensors};
use crate::spin::config::{AdapterConfig, SamplingConfig};
use crate::spin::learner::{CheckpointMeta, Learner, LossValue};

impl<B: Backend> LossValue for Tensor<B, 1> {
    fn value(&self) -> f64 {
        self.clone().into_scalar().elem::<f64>()
    }

    fn scaled(self, factor: f64) -> Self {
        self.mul_scalar(factor)
    }

    fn plus(self, other: Self) -> Self {
        self + other
    }
}

pub struct BurnLearner<B: AutodiffBackend, O> {
    model:       CausalLm<B>,
    optim:       O,
    accumulator: GradientsAccumulator<CausalLm<B>>,
    pending:     usize,
    lr:          f64,
    pad_id:      u32,
    eos_id:      u32,
    training:    bool,
    device:      B::Device,
}

impl<B, O> BurnLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CausalLm<B>, B>,
{
    pub fn new(model: CausalLm<B>, optim: O, lr: f64, pad_id: u32, eos_id: u32, device: B::Device) -> Self {
        Self {
            model,
            optim,
            accumulator: GradientsAccumulator::new(),
            pending: 0,
            lr,
            pad_id,
            eos_id,
            training: false,
            device,
        }
    }

    /// Number of backward passes waiting for an update
    pub fn pending_grads(&self) -> usize {
        self.pending
    }
}

impl<B, O> Learner for BurnLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CausalLm<B>, B>,
{
    type Loss = Tensor<B, 1>;

    fn pad_id(&self) -> u32 {
        self.pad_id
    }

    fn has_adapter(&self) -> bool {
        self.model.has_adapters()
    }

    fn attach_adapter(&mut self, config: &AdapterConfig) -> SpinResult<()> {
        config.validate()?;
        self.model = self.model.clone().attach_adapters(config, &self.device);
        self.accumulator = GradientsAccumulator::new();
        self.pending = 0;
        Ok(())
    }

    fn trainable_params(&self) -> usize {
        self.model.trainable_params()
    }

    // Dropout follows the backend: active on the autodiff model,
    // disabled on `valid()`. Backward passes require the flag.
    fn set_train_mode(&mut self, training: bool) {
        self.training = training;
    }

    fn supervised_loss(&self, batch: &Batch) -> SpinResult<Tensor<B, 1>> {
        let t = BatchTensors::<B>::from_batch(batch, self.model.max_seq_len, &self.device)?;
        let labels = t
            .labels
            .ok_or_else(|| SpinError::data("supervised batch has no labels"))?;
        Ok(self.model.forward_loss(t.input_ids, t.attention_mask, labels, self.pad_id))
    }

    fn generate(
        &self,
        prompts:  &[Vec<u32>],
        sampling: &SamplingConfig,
        rng:      &mut StdRng,
    ) -> SpinResult<Vec<Vec<u32>>> {
        sampling.validate()?;
        let model  = self.model.valid();
        let device = self.device.clone();

        // Synthetic rows must fit the position table when scored
        let mut sampling = sampling.clone();
        sampling.max_length = sampling.max_length.min(self.model.max_seq_len);

        prompts
            .iter()
            .map(|p| generate_sequence(&model, p, &sampling, self.eos_id, rng, &device))
            .collect()
    }

    fn backward(&mut self, loss: Tensor<B, 1>) -> SpinResult<()> {
        if !self.training {
            return Err(SpinError::Compute("backward pass outside training mode".into()));
        }
        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.accumulator.accumulate(&self.model, grads);
        self.pending += 1;
        Ok(())
    }

    fn apply_update(&mut self) -> SpinResult<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let grads = self.accumulator.grads();
        self.model = self.optim.step(self.lr, self.model.clone(), grads);
        self.pending = 0;
        Ok(())
    }

    fn eval_loss(&self, batch: &Batch) -> SpinResult<f64> {
        let model  = self.model.valid();
        let device = self.device.clone();
        let t = BatchTensors::<B::InnerBackend>::from_batch(batch, model.max_seq_len, &device)?;
        let labels = t
            .labels
            .ok_or_else(|| SpinError::data("evaluation batch has no labels"))?;
        let loss = model.forward_loss(t.input_ids, t.attention_mask, labels, self.pad_id);
        Ok(loss.into_scalar().elem::<f64>())
    }

    fn persist(&self, dir: &Path, meta: CheckpointMeta) -> SpinResult<()> {
        CheckpointManager::open(dir)
            .and_then(|ckpt| ckpt.save_best(&self.model, meta))
            .map_err(|e| SpinError::Resource(format!("{e:#}")))?;
        tracing::debug!(
            "Persisted best checkpoint (iteration {}, eval_loss {:.4})",
            meta.iteration, meta.eval_loss
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::CausalLmConfig;
    use crate::spin::config::SpinConfig;
    use crate::spin::controller::IterationController;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamWConfig,
    };
    use rand::SeedableRng;

    type TestBackend = Autodiff<NdArray>;

    fn learner() -> BurnLearner<TestBackend, impl Optimizer<CausalLm<TestBackend>, TestBackend>> {
        let device = Default::default();
        let model: CausalLm<TestBackend> = CausalLmConfig::new(16, 12, 8, 2, 1, 16, 0.0).init(&device);
        let optim = AdamWConfig::new().init::<TestBackend, CausalLm<TestBackend>>();
        BurnLearner::new(model, optim, 1e-2, 0, 3, device)
    }

    fn batch() -> Batch {
        Batch {
            input_ids:      vec![vec![2, 5, 6, 7, 8, 3], vec![2, 9, 10, 11, 3, 0]],
            attention_mask: vec![vec![1, 1, 1, 1, 1, 1], vec![1, 1, 1, 1, 1, 0]],
            labels:         Some(vec![vec![0, 0, 0, 7, 8, 3], vec![0, 0, 10, 11, 3, 0]]),
            prompt_lens:    vec![3, 2],
        }
    }

    fn adapter() -> AdapterConfig {
        AdapterConfig { rank: 2, scale: 4, ..AdapterConfig::default() }
    }

    #[test]
    fn test_attach_freezes_base() {
        let mut l = learner();
        let total = l.trainable_params();
        l.attach_adapter(&adapter()).unwrap();
        assert!(l.has_adapter());
        assert!(l.trainable_params() < total);
    }

    #[test]
    fn test_backward_requires_train_mode() {
        let mut l = learner();
        l.attach_adapter(&adapter()).unwrap();
        let loss = l.supervised_loss(&batch()).unwrap();
        assert!(matches!(l.backward(loss), Err(SpinError::Compute(_))));
        assert_eq!(l.pending_grads(), 0);
    }

    #[test]
    fn test_update_changes_eval_loss() {
        let mut l = learner();
        l.attach_adapter(&adapter()).unwrap();
        let before = l.eval_loss(&batch()).unwrap();

        l.set_train_mode(true);
        for _ in 0..5 {
            let loss = l.supervised_loss(&batch()).unwrap();
            l.backward(loss).unwrap();
            l.apply_update().unwrap();
        }
        let after = l.eval_loss(&batch()).unwrap();
        assert!(before.is_finite() && after.is_finite());
        assert!(after != before);
        assert_eq!(l.pending_grads(), 0);
    }

    #[test]
    fn test_generated_rows_fit_the_model() {
        let l = learner();
        let mut rng = StdRng::seed_from_u64(4);
        let out = l.generate(&batch().prompts(), &SamplingConfig::synthetic(512), &mut rng).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.len() <= 12));
        assert_eq!(&out[0][..3], &[2, 5, 6]);
    }

    #[test]
    fn test_loss_value_on_tensors() {
        let l = learner();
        let loss = l.supervised_loss(&batch()).unwrap();
        let value = loss.value();
        let doubled = loss.clone().plus(loss.scaled(1.0));
        assert!((doubled.value() - 2.0 * value).abs() < 1e-4);
    }

    #[test]
    fn test_controller_runs_on_burn_learner() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = learner();
        let config = SpinConfig {
            num_epochs:       2,
            grad_accum_steps: 2,
            adapter:          adapter(),
            synthesis:        SamplingConfig::synthetic(10),
            output_dir:       dir.path().to_path_buf(),
            ..SpinConfig::default()
        };
        let mut controller = IterationController::from_config(config).unwrap();

        let report = controller.train(&mut l, &[batch(), batch()], &[batch()]).unwrap();
        assert_eq!(report.iterations.len(), 2);
        assert!(report.best_eval_loss.is_finite());
        assert!(report.iterations[1].synthetic_loss.is_some());
        assert!(dir.path().join("best.json").exists());
    }
}
