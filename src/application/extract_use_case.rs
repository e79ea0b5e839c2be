// ============================================================
// Layer 2 — Extract Use Case
// ============================================================
// Document in, requirements markdown out:
//   1. Make sure a trained checkpoint exists (before any I/O)
//   2. Extract and clean the document text
//   3. Generate from the best checkpoint and save the result

use anyhow::Result;
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::data::{extractor::extract_text, preprocessor::Preprocessor};
use crate::domain::traits::RequirementsGenerator;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    generator::{CheckpointGenerator, DEFAULT_MAX_NEW_TOKENS},
    InferBackend,
};

pub const DEFAULT_OUTPUT: &str = "output/generated_requirements.md";

pub struct ExtractUseCase {
    checkpoint_dir: PathBuf,
    output:         PathBuf,
    max_new_tokens: usize,
}

impl ExtractUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            output:         PathBuf::from(DEFAULT_OUTPUT),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn execute(&self, input: &Path) -> Result<String> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        self.run::<InferBackend>(input, device)
    }

    pub fn run<B: Backend>(&self, input: &Path, device: B::Device) -> Result<String> {
        CheckpointManager::trained(&self.checkpoint_dir)?;

        tracing::info!("Extracting text from '{}'", input.display());
        let text = Preprocessor::new().clean(&extract_text(input)?);
        tracing::info!("Extracted {} characters", text.len());

        let generator = CheckpointGenerator::<B>::from_checkpoint(&self.checkpoint_dir, device)?
            .with_max_new_tokens(self.max_new_tokens)
            .with_output(&self.output);
        let document = generator.generate(&text)?;

        tracing::info!("Requirements written to '{}'", self.output.display());
        Ok(document)
    }
}
