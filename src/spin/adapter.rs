// ============================================================
// Layer 5a — Adapter Manager
// ============================================================
// attach(model, rank, scale, target_layers, dropout) -> model
//
// Idempotent: a learner that already carries adapters is left
// untouched, so the trainable parameter set cannot grow by
// calling this twice.

use crate::domain::error::SpinResult;
use crate::spin::config::AdapterConfig;
use crate::spin::learner::Learner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached { trainable_params: usize },
    AlreadyAttached { trainable_params: usize },
}

impl AttachOutcome {
    pub fn trainable_params(&self) -> usize {
        match *self {
            Self::Attached { trainable_params } | Self::AlreadyAttached { trainable_params } => {
                trainable_params
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterManager {
    config: AdapterConfig,
}

impl AdapterManager {
    pub fn new(config: AdapterConfig) -> SpinResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn attach<L: Learner>(&self, learner: &mut L) -> SpinResult<AttachOutcome> {
        attach(learner, &self.config)
    }
}

pub fn attach<L: Learner>(learner: &mut L, config: &AdapterConfig) -> SpinResult<AttachOutcome> {
    if learner.has_adapter() {
        return Ok(AttachOutcome::AlreadyAttached {
            trainable_params: learner.trainable_params(),
        });
    }
    config.validate()?;
    learner.attach_adapter(config)?;
    let trainable_params = learner.trainable_params();
    tracing::debug!(
        "Attached LoRA adapters (rank={}, scale={}, targets={:?}): {} trainable params",
        config.rank, config.scale, config.target_layers, trainable_params
    );
    Ok(AttachOutcome::Attached { trainable_params })
}
