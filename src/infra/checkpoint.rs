// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder
// plus the JSON side files needed to rebuild a model.
//
// Two directories use this layout:
//
//   models/cache/                 ← base model (init-model)
//     model.mpk                  weights
//     model_config.json             architecture (burn Config)
//     model_info.json               parameter counts
//
//   final_model/                  ← single best slot (train)
//     model.mpk                  weights incl. LoRA adapters
//     best.json                     { iteration, eval_loss }
//     model_config.json
//     train_config.json             hyperparameters + adapter
//     tokenizer.json
//
// Each persist overwrites the previous snapshot in place.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::{SpinError, SpinResult};
use crate::ml::model::{CausalLm, CausalLmConfig};
use crate::spin::learner::CheckpointMeta;

/// Recorder file stem; CompactRecorder appends `.mpk`
const MODEL_STEM:        &str = "model";
pub const MODEL_FILE:    &str = "model.mpk";
pub const BEST_FILE:     &str = "best.json";
pub const MODEL_CONFIG:  &str = "model_config.json";
pub const TRAIN_CONFIG:  &str = "train_config.json";
pub const MODEL_INFO:    &str = "model_info.json";

/// Summary written next to the base model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name:             String,
    pub total_params:     usize,
    pub trainable_params: usize,
    pub vocab_size:       usize,
    pub max_seq_len:      usize,
}

/// Manages one checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open `dir` for writing, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open a trained best slot for reading. Fails with
    /// `MissingArtifact` before touching any weights when the
    /// directory or its weights are absent.
    pub fn trained(dir: impl AsRef<Path>) -> SpinResult<Self> {
        let dir = dir.as_ref();
        require(dir, &[MODEL_FILE, BEST_FILE, MODEL_CONFIG, TRAIN_CONFIG], "run 'train' before 'extract'")?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    /// Open a base model cache for reading.
    pub fn base_model(dir: impl AsRef<Path>) -> SpinResult<Self> {
        let dir = dir.as_ref();
        require(dir, &[MODEL_FILE, MODEL_CONFIG], "run 'init-model' before 'train'")?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    // ── Weights ───────────────────────────────────────────────────────────────
    pub fn save_model<B: Backend>(&self, model: &CausalLm<B>) -> Result<()> {
        let path = self.dir.join(MODEL_STEM);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;
        Ok(())
    }

    /// Weights plus `best.json`, overwriting the previous best.
    pub fn save_best<B: Backend>(&self, model: &CausalLm<B>, meta: CheckpointMeta) -> Result<()> {
        self.save_model(model)?;
        self.write_json(BEST_FILE, &meta)?;
        tracing::debug!("Saved best checkpoint: iteration {}", meta.iteration);
        Ok(())
    }

    /// The model must have the saved architecture, adapters included,
    /// or loading fails.
    pub fn load_model<B: Backend>(&self, model: CausalLm<B>, device: &B::Device) -> Result<CausalLm<B>> {
        let path = self.dir.join(MODEL_STEM);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load weights from '{}'", path.display()))?;
        Ok(model.load_record(record))
    }

    pub fn load_best_meta(&self) -> Result<CheckpointMeta> {
        self.read_json(BEST_FILE)
    }

    // ── Side files ────────────────────────────────────────────────────────────
    pub fn save_model_config(&self, cfg: &CausalLmConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<CausalLmConfig> {
        let path = self.dir.join(MODEL_CONFIG);
        CausalLmConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read model config '{}': {e:?}", path.display()))
    }

    pub fn save_train_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(TRAIN_CONFIG, cfg)
    }

    pub fn load_train_config(&self) -> Result<TrainConfig> {
        self.read_json(TRAIN_CONFIG)
    }

    pub fn save_model_info(&self, info: &ModelInfo) -> Result<()> {
        self.write_json(MODEL_INFO, info)
    }

    pub fn load_model_info(&self) -> Result<ModelInfo> {
        self.read_json(MODEL_INFO)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
    }
}

fn require(dir: &Path, files: &[&str], hint: &str) -> SpinResult<()> {
    if !dir.is_dir() {
        return Err(SpinError::missing(dir, hint));
    }
    for file in files {
        let path = dir.join(file);
        if !path.is_file() {
            return Err(SpinError::missing(path, hint));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> CausalLmConfig {
        CausalLmConfig::new(10, 6, 4, 2, 1, 8, 0.0)
    }

    #[test]
    fn test_missing_directory_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = CheckpointManager::trained(dir.path().join("final_model")).err().unwrap();
        assert!(matches!(err, SpinError::MissingArtifact { .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_directory_without_weights_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = CheckpointManager::base_model(dir.path()).err().unwrap();
        assert!(matches!(err, SpinError::MissingArtifact { .. }));
    }

    #[test]
    fn test_best_slot_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::open(dir.path()).unwrap();
        let model: CausalLm<TestBackend> = tiny().init(&device);

        ckpt.save_model_config(&tiny()).unwrap();
        ckpt.save_train_config(&TrainConfig::default()).unwrap();
        ckpt.save_best(&model, CheckpointMeta { iteration: 0, eval_loss: 2.0 }).unwrap();
        ckpt.save_best(&model, CheckpointMeta { iteration: 2, eval_loss: 1.8 }).unwrap();

        assert!(dir.path().join(MODEL_FILE).exists());
        assert_eq!(ckpt.load_best_meta().unwrap(), CheckpointMeta { iteration: 2, eval_loss: 1.8 });

        let reopened = CheckpointManager::trained(dir.path()).unwrap();
        let cfg      = reopened.load_model_config().unwrap();
        assert_eq!(cfg.d_model, 4);
        let loaded = reopened.load_model(cfg.init::<TestBackend>(&device), &device).unwrap();
        assert_eq!(loaded.num_params(), model.num_params());
    }

    #[test]
    fn test_recorder_writes_the_file_preconditions_look_for() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::open(dir.path()).unwrap();
        let model: CausalLm<TestBackend> = tiny().init(&device);

        ckpt.save_model(&model).unwrap();
        ckpt.save_model_config(&tiny()).unwrap();

        let mut files: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec![MODEL_CONFIG.to_string(), MODEL_FILE.to_string()]);
        assert!(CheckpointManager::base_model(dir.path()).is_ok());
    }

    #[test]
    fn test_model_info_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::open(dir.path()).unwrap();
        let info = ModelInfo {
            name: "reqforge-causal-lm".into(),
            total_params: 1000,
            trainable_params: 1000,
            vocab_size: 10,
            max_seq_len: 6,
        };
        ckpt.save_model_info(&info).unwrap();
        assert_eq!(ckpt.load_model_info().unwrap(), info);
    }
}
