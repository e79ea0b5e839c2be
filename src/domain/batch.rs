// ============================================================
// Layer 3 — Batch Domain Type
// ============================================================
// A rectangular batch of token-id rows, framework agnostic.
// The ml layer turns it into Burn tensors; the training core only
// ever reads it.
//
// Layout of a supervised row (right padded to the batch length):
//
//   input_ids:      [BOS] prompt... target... [EOS] [PAD] [PAD]
//   attention_mask:   1     1...     1...      1     0     0
//   labels:         [PAD] [PAD]...  target... [EOS] [PAD] [PAD]
//   prompt_len:     ^---------------^
//
// The pad id doubles as the "ignore" marker in labels.

use crate::domain::error::{SpinError, SpinResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub input_ids:      Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
    /// Target tokens aligned with input_ids. None for prompt-only batches.
    pub labels:         Option<Vec<Vec<u32>>>,
    /// Number of leading prompt tokens in each row
    pub prompt_lens:    Vec<usize>,
}

impl Batch {
    pub fn rows(&self) -> usize {
        self.input_ids.len()
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.first().map(Vec::len).unwrap_or(0)
    }

    /// Check the shape invariants shared by every batch.
    pub fn validate(&self) -> SpinResult<()> {
        let rows = self.rows();
        if rows == 0 {
            return Err(SpinError::data("batch has no rows"));
        }
        let seq_len = self.seq_len();
        if seq_len == 0 {
            return Err(SpinError::data("batch rows are empty"));
        }
        if self.input_ids.iter().any(|r| r.len() != seq_len) {
            return Err(SpinError::data("input_ids rows have different lengths"));
        }
        if self.attention_mask.len() != rows
            || self.attention_mask.iter().any(|r| r.len() != seq_len)
        {
            return Err(SpinError::data("attention_mask does not match input_ids"));
        }
        if self.prompt_lens.len() != rows {
            return Err(SpinError::data("prompt_lens does not match row count"));
        }
        if let Some((row, len)) = self
            .prompt_lens
            .iter()
            .enumerate()
            .find(|(_, &len)| len == 0 || len > seq_len)
        {
            return Err(SpinError::data(format!(
                "row {row} has prompt length {len} outside 1..={seq_len}"
            )));
        }
        if let Some(labels) = &self.labels {
            if labels.len() != rows || labels.iter().any(|r| r.len() != seq_len) {
                return Err(SpinError::data("labels do not match input_ids"));
            }
        }
        Ok(())
    }

    /// Stricter check for batches fed to a supervised loss.
    pub fn validate_supervised(&self) -> SpinResult<()> {
        self.validate()?;
        if self.labels.is_none() {
            return Err(SpinError::data("supervised batch has no labels"));
        }
        if self.seq_len() < 2 {
            return Err(SpinError::data(
                "supervised rows need at least two tokens for next-token targets",
            ));
        }
        Ok(())
    }

    /// Leading prompt tokens of every row, used to seed generation.
    pub fn prompts(&self) -> Vec<Vec<u32>> {
        self.input_ids
            .iter()
            .zip(&self.prompt_lens)
            .map(|(row, &len)| row[..len.min(row.len())].to_vec())
            .collect()
    }

    /// Build a self-supervised batch from generated sequences: each
    /// sequence is both input and label, the mask is all ones over the
    /// generated length and zero over right padding.
    pub fn self_supervised(sequences: Vec<Vec<u32>>, pad_id: u32) -> SpinResult<Self> {
        let seq_len = sequences.iter().map(Vec::len).max().unwrap_or(0);
        if sequences.is_empty() || seq_len == 0 {
            return Err(SpinError::data("no generated sequences to score"));
        }

        let mut input_ids      = Vec::with_capacity(sequences.len());
        let mut attention_mask = Vec::with_capacity(sequences.len());
        let mut prompt_lens    = Vec::with_capacity(sequences.len());

        for seq in sequences {
            let real = seq.len();
            if real == 0 {
                return Err(SpinError::data("generated sequence is empty"));
            }
            let mut ids  = seq;
            let mut mask = vec![1u32; real];
            ids.resize(seq_len, pad_id);
            mask.resize(seq_len, 0);
            input_ids.push(ids);
            attention_mask.push(mask);
            prompt_lens.push(real);
        }

        Ok(Self {
            labels: Some(input_ids.clone()),
            input_ids,
            attention_mask,
            prompt_lens,
        })
    }
}
