// ============================================================
// Layer 2 — Preparation Use Cases
// ============================================================
// The two steps that must run before `train`:
//
//   PrepareDataUseCase  → writes the sample requirements document
//                         into the raw data directory
//
//   InitModelUseCase    → builds the tokenizer from the corpus,
//                         initialises the base causal LM and caches
//                         it with its config and a parameter summary
//
//   models/cache/
//     model.mpk  model_config.json  model_info.json  tokenizer.json

use anyhow::{Context, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::{
    loader::DocumentLoader,
    preprocessor::Preprocessor,
    processor::RequirementsProcessor,
};
use crate::domain::{
    document::{DocumentMetadata, RequirementsDocument, REQUIREMENTS_TYPE},
    traits::DocumentSource,
};
use crate::infra::{
    checkpoint::{CheckpointManager, ModelInfo},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    generator::requirements_prompt,
    model::{CausalLm, CausalLmConfig},
    InferBackend,
};

pub const SAMPLE_FILE:  &str = "sample_requirements.json";
pub const SAMPLE_TITLE: &str = "Sample Requirements Document";
pub const MODEL_NAME:   &str = "reqforge-causal-lm";

pub const SAMPLE_TEXT: &str = "# Software Requirements Document

## Functional Requirements
1. User Authentication
   - Users must be able to log in with email and password
   - Support for password reset functionality
   - Two-factor authentication option

2. Document Management
   - Upload PDF and Word documents
   - Extract text from documents
   - Save extracted requirements

## Non-Functional Requirements
1. Performance
   - Page load time < 2 seconds
   - Support for documents up to 50MB

2. Security
   - All data must be encrypted
   - Regular security audits

## User Stories
As a user, I want to:
- Upload my requirements documents
- Extract requirements automatically
- Export requirements in different formats

## Acceptance Criteria
1. Document upload works for PDF and Word files
2. Requirements are extracted with 90% accuracy
3. Export works in markdown and JSON formats";

// ─── prepare-data ─────────────────────────────────────────────────────────────
pub struct PrepareDataUseCase {
    data_dir: PathBuf,
}

impl PrepareDataUseCase {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Write the sample document; returns its path.
    pub fn execute(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Cannot create '{}'", self.data_dir.display()))?;

        let doc = RequirementsDocument::new(
            SAMPLE_FILE,
            SAMPLE_TEXT,
            DocumentMetadata {
                kind:  Some(REQUIREMENTS_TYPE.to_string()),
                title: Some(SAMPLE_TITLE.to_string()),
            },
        );
        let path = self.data_dir.join(SAMPLE_FILE);
        fs::write(&path, serde_json::to_string_pretty(&doc)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!("Created sample data at '{}'", path.display());
        Ok(path)
    }
}

// ─── init-model ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitModelConfig {
    pub data_dir:    PathBuf,
    pub model_cache: PathBuf,
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl Default for InitModelConfig {
    fn default() -> Self {
        Self {
            data_dir:    PathBuf::from("data/raw"),
            model_cache: PathBuf::from("models/cache"),
            vocab_size:  8000,
            max_seq_len: 512,
            d_model:     256,
            num_heads:   8,
            num_layers:  6,
            d_ff:        1024,
            dropout:     0.1,
        }
    }
}

pub struct InitModelUseCase {
    config: InitModelConfig,
}

impl InitModelUseCase {
    pub fn new(config: InitModelConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ModelInfo> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        self.run::<InferBackend>(&device)
    }

    pub fn run<B: Backend>(&self, device: &B::Device) -> Result<ModelInfo> {
        let cfg = &self.config;

        // ── Tokenizer: everything the prompts and targets can contain ────────
        let preprocessor = Preprocessor::new();
        let docs: Vec<RequirementsDocument> = DocumentLoader::new(&cfg.data_dir)
            .load_all()?
            .into_iter()
            .map(|mut d| {
                d.text = preprocessor.clean(&d.text);
                d
            })
            .collect();
        if docs.is_empty() {
            tracing::warn!("No documents in '{}', vocabulary covers prompts only", cfg.data_dir.display());
        }

        let processor = RequirementsProcessor::new(cfg.max_seq_len, (cfg.max_seq_len / 2).max(2))?;
        let mut texts = processor.corpus_texts(&docs);
        texts.push(requirements_prompt(""));

        let codec = TokenizerStore::new(&cfg.model_cache).build_and_save(&texts, cfg.vocab_size)?;

        // ── Model ─────────────────────────────────────────────────────────────
        let model_cfg = CausalLmConfig::new(
            codec.vocab_size(), cfg.max_seq_len, cfg.d_model,
            cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout,
        );
        model_cfg.validate()?;
        let model: CausalLm<B> = model_cfg.init(device);

        let info = ModelInfo {
            name:             MODEL_NAME.to_string(),
            total_params:     model.num_params(),
            trainable_params: model.trainable_params(),
            vocab_size:       model_cfg.vocab_size,
            max_seq_len:      model_cfg.max_seq_len,
        };

        let ckpt = CheckpointManager::open(&cfg.model_cache)?;
        ckpt.save_model(&model)?;
        ckpt.save_model_config(&model_cfg)?;
        ckpt.save_model_info(&info)?;

        tracing::info!(
            "Base model cached in '{}': {} parameters, vocab {}",
            cfg.model_cache.display(), info.total_params, info.vocab_size
        );
        Ok(info)
    }
}
