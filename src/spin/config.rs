// ============================================================
// Layer 5a — Training Core Configuration
// ============================================================
// Validated hyperparameters for the self-play loop. Built from the
// application-level TrainConfig; every check here runs before the
// first iteration so a bad value never costs an epoch.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, path::PathBuf, str::FromStr};

use crate::domain::error::{SpinError, SpinResult};

// ─── Adapter targets ──────────────────────────────────────────────────────────
/// Attention projections that can carry a LoRA adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectionKind {
    #[serde(rename = "q_proj")]
    Query,
    #[serde(rename = "k_proj")]
    Key,
    #[serde(rename = "v_proj")]
    Value,
    #[serde(rename = "o_proj")]
    Output,
}

impl ProjectionKind {
    pub const ALL: [ProjectionKind; 4] = [Self::Query, Self::Key, Self::Value, Self::Output];

    pub fn layer_name(self) -> &'static str {
        match self {
            Self::Query  => "q_proj",
            Self::Key    => "k_proj",
            Self::Value  => "v_proj",
            Self::Output => "o_proj",
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.layer_name())
    }
}

impl FromStr for ProjectionKind {
    type Err = SpinError;

    fn from_str(s: &str) -> SpinResult<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.layer_name() == s.trim())
            .ok_or_else(|| SpinError::config(format!(
                "unknown adapter target layer '{s}' (expected q_proj, k_proj, v_proj or o_proj)"
            )))
    }
}

// ─── AdapterConfig ────────────────────────────────────────────────────────────
/// Low-rank adapter shape. The effective multiplier applied to the
/// adapter output is `scale / rank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub rank:          usize,
    pub scale:         usize,
    pub target_layers: BTreeSet<ProjectionKind>,
    pub dropout:       f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            rank:          16,
            scale:         32,
            target_layers: ProjectionKind::ALL.into_iter().collect(),
            dropout:       0.05,
        }
    }
}

impl AdapterConfig {
    pub fn validate(&self) -> SpinResult<()> {
        if self.rank == 0 {
            return Err(SpinError::config("adapter rank must be positive"));
        }
        if self.scale == 0 {
            return Err(SpinError::config("adapter scale must be positive"));
        }
        if self.target_layers.is_empty() {
            return Err(SpinError::config("adapter needs at least one target layer"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SpinError::config(format!(
                "adapter dropout {} is outside [0, 1)", self.dropout
            )));
        }
        Ok(())
    }

    pub fn multiplier(&self) -> f64 {
        self.scale as f64 / self.rank as f64
    }

    pub fn targets(&self, kind: ProjectionKind) -> bool {
        self.target_layers.contains(&kind)
    }
}

// ─── SamplingConfig ───────────────────────────────────────────────────────────
/// Decoding settings shared by synthesis and requirements generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Softmax temperature; 0 means greedy decoding
    pub temperature:        f32,
    /// Nucleus mass kept before sampling; 1.0 disables the filter
    pub top_p:              f32,
    /// >1.0 discourages tokens already present in the sequence
    pub repetition_penalty: f32,
    /// Forbid repeating any n-gram of this size; 0 disables
    pub no_repeat_ngram:    usize,
    /// Cap on prompt + generated tokens
    pub max_length:         usize,
    /// Cap on generated tokens alone
    pub max_new_tokens:     usize,
}

impl SamplingConfig {
    /// Self-play continuations: plain temperature sampling up to a total length.
    pub fn synthetic(max_length: usize) -> Self {
        Self {
            temperature:        0.7,
            top_p:              1.0,
            repetition_penalty: 1.0,
            no_repeat_ngram:    0,
            max_length,
            max_new_tokens:     max_length,
        }
    }

    /// Requirements documents at inference time.
    pub fn requirements(max_new_tokens: usize) -> Self {
        Self {
            temperature:        0.8,
            top_p:              0.95,
            repetition_penalty: 1.5,
            no_repeat_ngram:    3,
            max_length:         usize::MAX,
            max_new_tokens,
        }
    }

    pub fn validate(&self) -> SpinResult<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(SpinError::config("temperature must be finite and >= 0"));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(SpinError::config("top_p must be in (0, 1]"));
        }
        if !self.repetition_penalty.is_finite() || self.repetition_penalty <= 0.0 {
            return Err(SpinError::config("repetition_penalty must be positive"));
        }
        if self.max_length == 0 || self.max_new_tokens == 0 {
            return Err(SpinError::config("generation length limits must be positive"));
        }
        Ok(())
    }
}

// ─── Capability selection ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossMode {
    /// real_loss + beta * synthetic_loss after iteration 0
    #[default]
    SelfPlay,
    /// real_loss only, every iteration
    Supervised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointMode {
    /// Persist only on strict eval-loss improvement
    #[default]
    Best,
    /// Persist after every iteration (single slot, still tracks best)
    EveryEpoch,
}

// ─── SpinConfig ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinConfig {
    pub num_epochs:       usize,
    pub beta:             f64,
    pub grad_accum_steps: usize,
    pub adapter:          AdapterConfig,
    pub synthesis:        SamplingConfig,
    /// Seed for the synthesis sampler
    pub seed:             u64,
    /// Single "best" checkpoint slot
    pub output_dir:       PathBuf,
    pub loss_mode:        LossMode,
    pub checkpoint_mode:  CheckpointMode,
}

impl SpinConfig {
    pub fn validate(&self) -> SpinResult<()> {
        if self.num_epochs == 0 {
            return Err(SpinError::config("num_epochs must be at least 1"));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(SpinError::config(format!(
                "beta must be a finite value >= 0, got {}", self.beta
            )));
        }
        if self.grad_accum_steps == 0 {
            return Err(SpinError::config("grad_accum_steps must be at least 1"));
        }
        self.adapter.validate()?;
        self.synthesis.validate()?;
        Ok(())
    }
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            num_epochs:       2,
            beta:             0.1,
            grad_accum_steps: 4,
            adapter:          AdapterConfig::default(),
            synthesis:        SamplingConfig::synthetic(512),
            seed:             42,
            output_dir:       PathBuf::from("final_model"),
            loss_mode:        LossMode::SelfPlay,
            checkpoint_mode:  CheckpointMode::Best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SpinConfig::default().validate().is_ok());
        assert!((AdapterConfig::default().multiplier() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_beta_rejected() {
        let cfg = SpinConfig { beta: -0.1, ..SpinConfig::default() };
        assert!(matches!(cfg.validate(), Err(SpinError::Config(_))));
        let cfg = SpinConfig { beta: f64::NAN, ..SpinConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_beta_allowed() {
        let cfg = SpinConfig { beta: 0.0, ..SpinConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_adapter_validation() {
        let mut a = AdapterConfig::default();
        a.rank = 0;
        assert!(a.validate().is_err());

        let mut a = AdapterConfig::default();
        a.target_layers.clear();
        assert!(a.validate().is_err());

        let mut a = AdapterConfig::default();
        a.dropout = 1.0;
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_projection_names_round_trip() {
        for kind in ProjectionKind::ALL {
            assert_eq!(kind.layer_name().parse::<ProjectionKind>().unwrap(), kind);
        }
        assert!("gate_proj".parse::<ProjectionKind>().is_err());
    }

    #[test]
    fn test_zero_epochs_and_accumulation_rejected() {
        let cfg = SpinConfig { num_epochs: 0, ..SpinConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = SpinConfig { grad_accum_steps: 0, ..SpinConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
