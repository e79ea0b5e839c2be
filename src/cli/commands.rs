// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands, in the order they are run:
//   prepare-data → init-model → train → extract
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, ProjectionKind, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{prepare_use_case::InitModelConfig, train_use_case::TrainConfig};
use crate::spin::config::{CheckpointMode, LossMode, ProjectionKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the sample requirements document into the data directory
    PrepareData(PrepareDataArgs),

    /// Build the tokenizer and cache a freshly initialised base model
    InitModel(InitModelArgs),

    /// Fine-tune LoRA adapters on the base model with self-play
    Train(TrainArgs),

    /// Generate a requirements document from a .docx/.txt/.md file
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
pub struct PrepareDataArgs {
    #[arg(long, default_value = "data/raw")]
    pub data_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct InitModelArgs {
    /// Documents the tokenizer vocabulary is built from
    #[arg(long, default_value = "data/raw")]
    pub data_dir: PathBuf,

    /// Where the base model, its config and tokenizer are cached
    #[arg(long, default_value = "models/cache")]
    pub model_cache: PathBuf,

    /// Upper bound on the vocabulary (specials included)
    #[arg(long, default_value_t = 8000)]
    pub vocab_size: usize,

    /// Context window of the model in tokens
    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,

    /// Hidden dimension; must be divisible by num_heads
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Number of stacked decoder blocks
    #[arg(long, default_value_t = 6)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network, typically 4x d_model
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

impl From<InitModelArgs> for InitModelConfig {
    fn from(a: InitModelArgs) -> Self {
        InitModelConfig {
            data_dir:    a.data_dir,
            model_cache: a.model_cache,
            vocab_size:  a.vocab_size,
            max_seq_len: a.max_seq_len,
            d_model:     a.d_model,
            num_heads:   a.num_heads,
            num_layers:  a.num_layers,
            d_ff:        a.d_ff,
            dropout:     a.dropout,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with .json/.docx/.txt/.md training documents
    #[arg(long, default_value = "data/raw")]
    pub data_dir: PathBuf,

    /// Base model cache written by init-model
    #[arg(long, default_value = "models/cache")]
    pub model_cache: PathBuf,

    /// Best-checkpoint slot (weights, configs, tokenizer, metrics)
    #[arg(long, default_value = "final_model")]
    pub output_dir: PathBuf,

    /// Maximum tokens per sample (prompt + target), capped by the model context
    #[arg(long, default_value_t = 512)]
    pub max_length: usize,

    /// Maximum prompt tokens per sample, BOS included
    #[arg(long, default_value_t = 256)]
    pub max_prompt_len: usize,

    /// Words per document chunk
    #[arg(long, default_value_t = 64)]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks
    #[arg(long, default_value_t = 16)]
    pub chunk_overlap: usize,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Number of SPIN iterations (one pass over the data each)
    #[arg(long, default_value_t = 2)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Weight of the synthetic loss from iteration 1 onwards
    #[arg(long, default_value_t = 0.1)]
    pub beta: f64,

    /// Batches whose gradients are summed before one optimiser step
    #[arg(long, default_value_t = 4)]
    pub grad_accum_steps: usize,

    #[arg(long, default_value_t = 16)]
    pub lora_rank: usize,

    /// Adapter output is scaled by lora_alpha / lora_rank
    #[arg(long, default_value_t = 32)]
    pub lora_alpha: usize,

    #[arg(long, default_value_t = 0.05)]
    pub lora_dropout: f64,

    /// Attention projections that get adapters
    #[arg(long, value_delimiter = ',', default_value = "q_proj,k_proj,v_proj,o_proj")]
    pub target_layers: Vec<ProjectionKind>,

    /// Train on the real loss only (no self-play)
    #[arg(long)]
    pub supervised: bool,

    /// Persist after every iteration instead of only on improvement
    #[arg(long)]
    pub save_every_epoch: bool,

    /// Fraction of samples used for training; the rest is evaluation
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:         a.data_dir,
            model_cache:      a.model_cache,
            output_dir:       a.output_dir,
            max_length:       a.max_length,
            max_prompt_len:   a.max_prompt_len,
            chunk_size:       a.chunk_size,
            chunk_overlap:    a.chunk_overlap,
            batch_size:       a.batch_size,
            epochs:           a.epochs,
            lr:               a.lr,
            beta:             a.beta,
            grad_accum_steps: a.grad_accum_steps,
            lora_rank:        a.lora_rank,
            lora_alpha:       a.lora_alpha,
            lora_dropout:     a.lora_dropout,
            target_layers:    a.target_layers,
            loss_mode:        if a.supervised { LossMode::Supervised } else { LossMode::SelfPlay },
            checkpoint_mode:  if a.save_every_epoch { CheckpointMode::EveryEpoch } else { CheckpointMode::Best },
            train_fraction:   a.train_fraction,
            seed:             a.seed,
        }
    }
}

/// All arguments for the `extract` command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Document to extract requirements from
    #[arg(long)]
    pub input: PathBuf,

    /// Directory written by `train`
    #[arg(long, default_value = "final_model")]
    pub checkpoint_dir: PathBuf,

    /// Where the generated markdown is written
    #[arg(long, default_value = "output/generated_requirements.md")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 1024)]
    pub max_new_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_config(args: &[&str]) -> TrainConfig {
        let cli = Cli::try_parse_from(["reqforge", "train"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Train(a) => a.into(),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        assert_eq!(train_config(&[]), TrainConfig::default());
    }

    #[test]
    fn test_train_flags() {
        let cfg = train_config(&[
            "--target-layers", "q_proj,v_proj",
            "--supervised",
            "--save-every-epoch",
            "--beta", "0.5",
        ]);
        assert_eq!(cfg.target_layers, vec![ProjectionKind::Query, ProjectionKind::Value]);
        assert_eq!(cfg.loss_mode, LossMode::Supervised);
        assert_eq!(cfg.checkpoint_mode, CheckpointMode::EveryEpoch);
        assert_eq!(cfg.beta, 0.5);
    }

    #[test]
    fn test_unknown_target_layer_rejected() {
        assert!(Cli::try_parse_from(["reqforge", "train", "--target-layers", "gate_proj"]).is_err());
    }

    #[test]
    fn test_extract_requires_input() {
        assert!(Cli::try_parse_from(["reqforge", "extract"]).is_err());
        let cli = Cli::try_parse_from(["reqforge", "extract", "--input", "doc.docx"]).unwrap();
        assert!(matches!(cli.command, Commands::Extract(ExtractArgs { max_new_tokens: 1024, .. })));
    }
}
