// ============================================================
// Layer 4 — SPIN Dataset
// ============================================================
// Tokenised samples and their grouping into `Batch`es.
//
// Each batch is padded to its own longest row, not to a global
// maximum, so short documents don't pay for long ones. Samples
// keep their order; shuffling happens once, in the splitter.

use serde::{Deserialize, Serialize};

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};

/// One tokenised sample: [BOS] prompt target [EOS], with the
/// prompt masked out of `labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinSample {
    pub input_ids:  Vec<u32>,
    pub labels:     Vec<u32>,
    pub prompt_len: usize,
}

impl SpinSample {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Label positions that contribute to the loss
    pub fn target_len(&self, pad_id: u32) -> usize {
        self.labels.iter().filter(|&&l| l != pad_id).count()
    }
}

pub struct SpinDataset {
    samples: Vec<SpinSample>,
}

impl SpinDataset {
    pub fn new(samples: Vec<SpinSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Consecutive groups of `batch_size` samples, right padded.
    pub fn batches(&self, batch_size: usize, pad_id: u32) -> SpinResult<Vec<Batch>> {
        if batch_size == 0 {
            return Err(SpinError::config("batch_size must be positive"));
        }
        self.samples
            .chunks(batch_size)
            .map(|group| collate(group, pad_id))
            .collect()
    }
}

fn collate(group: &[SpinSample], pad_id: u32) -> SpinResult<Batch> {
    let seq_len = group.iter().map(SpinSample::len).max().unwrap_or(0);

    let mut input_ids      = Vec::with_capacity(group.len());
    let mut attention_mask = Vec::with_capacity(group.len());
    let mut labels         = Vec::with_capacity(group.len());
    let mut prompt_lens    = Vec::with_capacity(group.len());

    for s in group {
        if s.labels.len() != s.input_ids.len() {
            return Err(SpinError::data("sample labels and input_ids differ in length"));
        }
        let real = s.len();

        let mut ids = s.input_ids.clone();
        ids.resize(seq_len, pad_id);
        let mut mask = vec![1u32; real];
        mask.resize(seq_len, 0);
        let mut lab = s.labels.clone();
        lab.resize(seq_len, pad_id);

        input_ids.push(ids);
        attention_mask.push(mask);
        labels.push(lab);
        prompt_lens.push(s.prompt_len);
    }

    let batch = Batch { input_ids, attention_mask, labels: Some(labels), prompt_lens };
    batch.validate_supervised()?;
    Ok(batch)
}
