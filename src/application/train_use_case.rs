// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Check the base model cache    (Layer 6 - infra)
//   Step 2: Load documents                (Layer 4 - data)
//   Step 3: Clean the text                (Layer 4 - data)
//   Step 4: Chunk into passages           (Layer 4 - data)
//   Step 5: Load the cached tokenizer     (Layer 6 - infra)
//   Step 6: Create training samples       (Layer 4 - data)
//   Step 7: Split train/eval, batch       (Layer 4 - data)
//   Step 8: Save configs + tokenizer      (Layer 6 - infra)
//   Step 9: Run the SPIN loop             (Layer 5 - spin + ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{optim::AdamWConfig, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    chunker::Chunker,
    dataset::SpinDataset,
    loader::DocumentLoader,
    preprocessor::Preprocessor,
    processor::{RequirementsProcessor, DEFAULT_MAX_LENGTH, DEFAULT_MAX_PROMPT_LEN},
    splitter::{split_train_eval, DEFAULT_TRAIN_FRACTION},
};
use crate::domain::{
    batch::Batch,
    document::RequirementsDocument,
    error::{SpinError, SpinResult},
    traits::DocumentSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::{TextCodec, TokenizerStore, TOKENIZER_FILE},
};
use crate::ml::{learner::BurnLearner, model::CausalLm, TrainBackend};
use crate::spin::{
    config::{AdapterConfig, CheckpointMode, LossMode, ProjectionKind, SamplingConfig, SpinConfig},
    controller::IterationController,
    events::{TrainEvent, TrainReport},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a fine-tuning run.
// Saved next to the best checkpoint so the generator can rebuild
// the exact adapter layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:         PathBuf,
    pub model_cache:      PathBuf,
    pub output_dir:       PathBuf,
    pub max_length:       usize,
    pub max_prompt_len:   usize,
    pub chunk_size:       usize,
    pub chunk_overlap:    usize,
    pub batch_size:       usize,
    pub epochs:           usize,
    pub lr:               f64,
    pub beta:             f64,
    pub grad_accum_steps: usize,
    pub lora_rank:        usize,
    pub lora_alpha:       usize,
    pub lora_dropout:     f64,
    pub target_layers:    Vec<ProjectionKind>,
    pub loss_mode:        LossMode,
    pub checkpoint_mode:  CheckpointMode,
    pub train_fraction:   f64,
    pub seed:             u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:         PathBuf::from("data/raw"),
            model_cache:      PathBuf::from("models/cache"),
            output_dir:       PathBuf::from("final_model"),
            max_length:       DEFAULT_MAX_LENGTH,
            max_prompt_len:   DEFAULT_MAX_PROMPT_LEN,
            chunk_size:       64,
            chunk_overlap:    16,
            batch_size:       4,
            epochs:           2,
            lr:               1e-4,
            beta:             0.1,
            grad_accum_steps: 4,
            lora_rank:        16,
            lora_alpha:       32,
            lora_dropout:     0.05,
            target_layers:    ProjectionKind::ALL.to_vec(),
            loss_mode:        LossMode::SelfPlay,
            checkpoint_mode:  CheckpointMode::Best,
            train_fraction:   DEFAULT_TRAIN_FRACTION,
            seed:             42,
        }
    }
}

impl TrainConfig {
    pub fn adapter_config(&self) -> SpinResult<AdapterConfig> {
        let adapter = AdapterConfig {
            rank:          self.lora_rank,
            scale:         self.lora_alpha,
            target_layers: self.target_layers.iter().copied().collect(),
            dropout:       self.lora_dropout,
        };
        adapter.validate()?;
        Ok(adapter)
    }

    /// The validated core configuration for a model whose context
    /// holds `max_length` tokens.
    pub fn to_spin_config(&self, max_length: usize) -> SpinResult<SpinConfig> {
        if self.batch_size == 0 {
            return Err(SpinError::config("batch_size must be at least 1"));
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(SpinError::config(format!("learning rate must be positive, got {}", self.lr)));
        }
        let spin = SpinConfig {
            num_epochs:       self.epochs,
            beta:             self.beta,
            grad_accum_steps: self.grad_accum_steps,
            adapter:          self.adapter_config()?,
            synthesis:        SamplingConfig::synthetic(max_length),
            seed:             self.seed,
            output_dir:       self.output_dir.clone(),
            loss_mode:        self.loss_mode,
            checkpoint_mode:  self.checkpoint_mode,
        };
        spin.validate()?;
        Ok(spin)
    }
}

/// Train and eval batches ready for the controller.
pub struct PreparedData {
    pub train: Vec<Batch>,
    pub eval:  Vec<Batch>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline on the WGPU device
    pub fn execute(&self) -> Result<TrainReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.run::<TrainBackend>(device)
    }

    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Base model must exist ─────────────────────────────────────
        let cache     = CheckpointManager::base_model(&cfg.model_cache)?;
        let model_cfg = cache.load_model_config()?;

        let max_length = cfg.max_length.min(model_cfg.max_seq_len);
        if max_length < cfg.max_length {
            tracing::warn!(
                "max_length {} exceeds the model context, using {}",
                cfg.max_length, max_length
            );
        }
        let spin_cfg = cfg.to_spin_config(max_length)?;

        // ── Steps 2-7: Documents → batches ────────────────────────────────────
        let codec = TokenizerStore::new(&cfg.model_cache)
            .load()
            .context("Cannot load the base model tokenizer, run 'init-model' again")?;
        let docs = DocumentLoader::new(&cfg.data_dir).load_all()?;
        let data = self.prepare_batches(&docs, &codec, max_length)?;

        // ── Step 8: Save everything the generator needs ──────────────────────
        let out = CheckpointManager::open(&cfg.output_dir)?;
        out.save_train_config(cfg)?;
        out.save_model_config(&model_cfg)?;
        codec.save(out.path(TOKENIZER_FILE))?;

        // ── Step 9: SPIN loop ─────────────────────────────────────────────────
        let model: CausalLm<B> = cache.load_model(model_cfg.init(&device), &device)?;
        let optim   = AdamWConfig::new().with_epsilon(1e-8).init::<B, CausalLm<B>>();
        let mut learner = BurnLearner::new(model, optim, cfg.lr, codec.pad_id(), codec.eos_id(), device);

        let metrics = MetricsLogger::new(&cfg.output_dir)?;
        let mut controller = IterationController::from_config(spin_cfg)?;
        let mut observer = |event: &TrainEvent| log_event(event, &metrics);
        let report = controller.train_observed(&mut learner, &data.train, &data.eval, &mut observer)?;

        tracing::info!(
            "Training complete: final train_loss={:.4}, best eval_loss={:.4}, saved to '{}'",
            report.training_loss,
            report.best_eval_loss,
            cfg.output_dir.display()
        );
        Ok(report)
    }

    /// Steps 3-7: clean, chunk, tokenise, split and batch.
    pub fn prepare_batches(
        &self,
        docs:       &[RequirementsDocument],
        codec:      &TextCodec,
        max_length: usize,
    ) -> Result<PreparedData> {
        let cfg = &self.config;
        if docs.is_empty() {
            return Err(SpinError::config(format!(
                "no documents found in '{}', run 'prepare-data' or add files",
                cfg.data_dir.display()
            ))
            .into());
        }

        let preprocessor = Preprocessor::new();
        let chunker      = Chunker::new(cfg.chunk_size, cfg.chunk_overlap)?;
        let chunks: Vec<RequirementsDocument> = docs
            .iter()
            .flat_map(|doc| {
                chunker
                    .chunk(&preprocessor.clean(&doc.text))
                    .into_iter()
                    .map(move |text| RequirementsDocument::new(&doc.source, text, doc.metadata.clone()))
            })
            .collect();
        tracing::info!("Created {} chunks from {} documents", chunks.len(), docs.len());

        let processor = RequirementsProcessor::new(max_length, cfg.max_prompt_len.min(max_length / 2))?;
        let samples   = processor.process_all(&chunks, codec);
        let targets: usize = samples.iter().map(|s| s.target_len(codec.pad_id())).sum();
        tracing::info!("Built {} training samples ({} target tokens)", samples.len(), targets);

        let (train, eval) = split_train_eval(samples, cfg.train_fraction, cfg.seed)?;
        let train = SpinDataset::new(train);
        let eval  = SpinDataset::new(eval);
        tracing::info!("Split: {} train, {} eval", train.len(), eval.len());

        Ok(PreparedData {
            train: train.batches(cfg.batch_size, codec.pad_id())?,
            eval:  eval.batches(cfg.batch_size, codec.pad_id())?,
        })
    }
}

/// Route controller events to the log and the metrics CSV.
fn log_event(event: &TrainEvent, metrics: &MetricsLogger) {
    match event {
        TrainEvent::AdapterAttached { trainable_params, newly_attached } => {
            if *newly_attached {
                tracing::info!("LoRA adapters attached: {} trainable parameters", trainable_params);
            }
        }
        TrainEvent::IterationStarted { iteration } => {
            tracing::info!("SPIN iteration {} started", iteration + 1);
        }
        TrainEvent::StepCompleted { iteration, step, components, .. } => {
            tracing::debug!(
                "iter {} step {}: total={:.4} real={:.4} synthetic={:?}",
                iteration + 1, step, components.total, components.real, components.synthetic
            );
        }
        TrainEvent::OptimizerUpdate { .. } => {}
        TrainEvent::Evaluated { iteration, eval_loss } => {
            tracing::info!("Iteration {} eval_loss={:.4}", iteration + 1, eval_loss);
        }
        TrainEvent::CheckpointDecided { eval_loss, persisted, .. } => {
            if *persisted {
                tracing::info!("New best eval_loss {:.4}, checkpoint saved", eval_loss);
            }
        }
        TrainEvent::IterationCompleted(summary) => {
            tracing::info!(
                "Iteration {} | train_loss={:.4} | eval_loss={:.4} | best={:.4}",
                summary.iteration + 1, summary.train_loss, summary.eval_loss, summary.best_eval_loss
            );
            // The CSV is a side log; the checkpoint is already decided,
            // so a write failure must not abort the run.
            if let Err(e) = metrics.log(summary) {
                tracing::warn!("Cannot write metrics: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::prepare_use_case::{InitModelConfig, InitModelUseCase, PrepareDataUseCase, SAMPLE_TEXT};
    use crate::domain::document::DocumentMetadata;
    use crate::infra::checkpoint::{BEST_FILE, MODEL_FILE};
    use crate::infra::metrics::METRICS_FILE;
    use burn::backend::{Autodiff, NdArray};

    fn requirements(text: &str) -> RequirementsDocument {
        RequirementsDocument::new(
            "r.json",
            text,
            DocumentMetadata { kind: Some("requirements".into()), title: Some("R".into()) },
        )
    }

    fn codec(dir: &std::path::Path, texts: &[&str]) -> TextCodec {
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        TokenizerStore::new(dir).build_and_save(&texts, 200).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let cfg = TrainConfig::default();
        assert!(cfg.to_spin_config(512).is_ok());
        assert_eq!(cfg.adapter_config().unwrap().target_layers.len(), 4);
    }

    #[test]
    fn test_config_errors() {
        let cfg = TrainConfig { beta: -1.0, ..TrainConfig::default() };
        assert!(matches!(cfg.to_spin_config(512), Err(SpinError::Config(_))));
        let cfg = TrainConfig { target_layers: vec![], ..TrainConfig::default() };
        assert!(cfg.adapter_config().is_err());
        let cfg = TrainConfig { batch_size: 0, ..TrainConfig::default() };
        assert!(cfg.to_spin_config(512).is_err());
    }

    #[test]
    fn test_config_json_round_trip_keeps_layer_names() {
        let cfg  = TrainConfig { target_layers: vec![ProjectionKind::Query, ProjectionKind::Value], ..TrainConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"q_proj\""));
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_partial_config_json_uses_defaults() {
        let cfg: TrainConfig = serde_json::from_str(r#"{ "epochs": 5, "loss_mode": "supervised" }"#).unwrap();
        assert_eq!(cfg.epochs, 5);
        assert_eq!(cfg.loss_mode, LossMode::Supervised);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn test_prepare_batches_yields_train_and_eval() {
        let dir = tempfile::tempdir().unwrap();
        let c   = codec(dir.path(), &["users shall log in", "the system shall export reports"]);
        let uc  = TrainUseCase::new(TrainConfig { batch_size: 2, ..TrainConfig::default() });
        let docs: Vec<_> = ["users shall log in", "the system shall export reports", "users shall log out"]
            .into_iter()
            .map(requirements)
            .collect();

        let data = uc.prepare_batches(&docs, &c, 64).unwrap();
        assert_eq!(data.train.len(), 1);
        assert_eq!(data.eval.len(), 1);
        assert!(data.train.iter().chain(&data.eval).all(|b| b.validate_supervised().is_ok()));
        assert!(data.train.iter().all(|b| b.seq_len() <= 64));
    }

    #[test]
    fn test_sample_corpus_trains_with_default_config() {
        let dir = tempfile::tempdir().unwrap();
        PrepareDataUseCase::new(dir.path()).execute().unwrap();
        let docs = DocumentLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(docs.len(), 1);

        let c    = codec(&dir.path().join("tok"), &[SAMPLE_TEXT]);
        let uc   = TrainUseCase::new(TrainConfig::default());
        let data = uc.prepare_batches(&docs, &c, DEFAULT_MAX_LENGTH).unwrap();
        assert!(!data.train.is_empty());
        assert!(!data.eval.is_empty());
    }

    #[test]
    fn test_prepare_batches_rejects_empty_or_single_document() {
        let dir = tempfile::tempdir().unwrap();
        let c   = codec(dir.path(), &["users"]);
        let uc  = TrainUseCase::new(TrainConfig::default());

        let err = uc.prepare_batches(&[], &c, 64).err().unwrap();
        assert!(matches!(err.downcast_ref::<SpinError>(), Some(SpinError::Config(_))));

        let err = uc.prepare_batches(&[requirements("users")], &c, 64).err().unwrap();
        assert!(matches!(err.downcast_ref::<SpinError>(), Some(SpinError::Config(_))));
    }

    #[test]
    fn test_only_completed_iterations_reach_the_csv() {
        use crate::spin::events::IterationSummary;

        let dir     = tempfile::tempdir().unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let summary = IterationSummary {
            iteration: 0, steps: 2, train_loss: 1.5, real_loss: 1.5, synthetic_loss: None,
            eval_loss: 1.2, best_eval_loss: 1.2, persisted: true,
        };
        log_event(&TrainEvent::IterationStarted { iteration: 0 }, &metrics);
        log_event(&TrainEvent::Evaluated { iteration: 0, eval_loss: 1.2 }, &metrics);
        log_event(&TrainEvent::IterationCompleted(summary.clone()), &metrics);

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 2);

        // A vanished output directory is logged, not fatal
        drop(dir);
        log_event(&TrainEvent::IterationCompleted(IterationSummary { iteration: 1, ..summary }), &metrics);
    }

    #[test]
    fn test_train_without_base_model_is_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let uc  = TrainUseCase::new(TrainConfig {
            model_cache: dir.path().join("missing"),
            ..TrainConfig::default()
        });
        let err = uc.run::<Autodiff<NdArray>>(Default::default()).err().unwrap();
        assert!(err.downcast_ref::<SpinError>().unwrap().is_precondition());
    }

    #[test]
    fn test_end_to_end_on_cpu() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("raw");
        let cache    = dir.path().join("cache");
        let out      = dir.path().join("final");

        PrepareDataUseCase::new(&data_dir).execute().unwrap();
        std::fs::write(data_dir.join("notes.txt"), "The portal shall let users reset passwords.").unwrap();
        InitModelUseCase::new(InitModelConfig {
            data_dir:    data_dir.clone(),
            model_cache: cache.clone(),
            vocab_size:  300,
            max_seq_len: 48,
            d_model:     16,
            num_heads:   2,
            num_layers:  1,
            d_ff:        32,
            dropout:     0.0,
        })
        .run::<NdArray>(&Default::default())
        .unwrap();

        let uc = TrainUseCase::new(TrainConfig {
            data_dir,
            model_cache:      cache,
            output_dir:       out.clone(),
            max_prompt_len:   16,
            chunk_size:       40,
            chunk_overlap:    8,
            batch_size:       2,
            epochs:           2,
            grad_accum_steps: 1,
            lora_rank:        2,
            lora_alpha:       4,
            ..TrainConfig::default()
        });
        let report = uc.run::<Autodiff<NdArray>>(Default::default()).unwrap();

        assert_eq!(report.iterations.len(), 2);
        assert!(report.best_eval_loss.is_finite());
        assert_eq!(report.persisted_iterations()[0], 0);
        for file in [MODEL_FILE, BEST_FILE, TOKENIZER_FILE, METRICS_FILE] {
            assert!(out.join(file).exists(), "{file} missing");
        }
    }
}
