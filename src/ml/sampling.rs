// ============================================================
// Layer 5 — Sampling
// ============================================================
// Autoregressive decoding, one token at a time:
//
//   logits ─► repetition penalty ─► n-gram ban ─► temperature
//          ─► top-p filter ─► weighted draw (or argmax at T = 0)
//
// The logit transforms are plain functions over f32 slices so
// they can be tested without a backend.

use burn::prelude::*;
use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::StdRng};
use std::collections::HashSet;

use crate::domain::error::{SpinError, SpinResult};
use crate::ml::model::CausalLm;
use crate::spin::config::SamplingConfig;

/// Divide positive logits (multiply negative ones) of every token
/// already present in `history`.
pub fn apply_repetition_penalty(logits: &mut [f32], history: &[u32], penalty: f32) {
    if penalty == 1.0 {
        return;
    }
    let seen: HashSet<u32> = history.iter().copied().collect();
    for token in seen {
        if let Some(l) = logits.get_mut(token as usize) {
            *l = if *l > 0.0 { *l / penalty } else { *l * penalty };
        }
    }
}

/// Forbid any token that would complete an n-gram already present
/// in `history`.
pub fn ban_repeated_ngrams(logits: &mut [f32], history: &[u32], n: usize) {
    if n == 0 || history.len() + 1 < n {
        return;
    }
    let prefix = &history[history.len() + 1 - n..];
    for window in history.windows(n) {
        if window[..n - 1] == *prefix {
            if let Some(l) = logits.get_mut(window[n - 1] as usize) {
                *l = f32::NEG_INFINITY;
            }
        }
    }
}

fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Softmax over `logits / temperature`, then keep the smallest set of
/// most likely tokens whose mass reaches `top_p`.
pub fn nucleus(logits: &[f32], temperature: f32, top_p: f32) -> Vec<(usize, f32)> {
    let max = logits
        .iter()
        .copied()
        .filter(|l| l.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Vec::new();
    }

    let mut probs: Vec<(usize, f32)> = logits
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_finite())
        .map(|(i, &l)| (i, ((l - max) / temperature).exp()))
        .collect();
    let total: f32 = probs.iter().map(|(_, p)| p).sum();
    for (_, p) in probs.iter_mut() {
        *p /= total;
    }
    probs.sort_by(|a, b| b.1.total_cmp(&a.1));

    if top_p < 1.0 {
        let mut mass = 0.0;
        let keep = probs
            .iter()
            .position(|(_, p)| {
                mass += p;
                mass >= top_p
            })
            .map(|i| i + 1)
            .unwrap_or(probs.len());
        probs.truncate(keep);
    }
    probs
}

/// Pick the next token from already-adjusted logits.
pub fn pick_token(logits: &[f32], temperature: f32, top_p: f32, rng: &mut StdRng) -> SpinResult<u32> {
    if temperature <= 0.0 {
        return argmax(logits)
            .map(|i| i as u32)
            .ok_or_else(|| SpinError::Compute("every token was filtered out".into()));
    }
    let candidates = nucleus(logits, temperature, top_p);
    if candidates.is_empty() {
        return Err(SpinError::Compute("every token was filtered out".into()));
    }
    let dist = WeightedIndex::new(candidates.iter().map(|(_, p)| *p))
        .map_err(|e| SpinError::Compute(format!("invalid sampling weights: {e}")))?;
    Ok(candidates[dist.sample(rng)].0 as u32)
}

/// Sample one continuation of `prompt`. The returned sequence starts
/// with the prompt and ends at EOS or at a length limit. The model
/// sees at most its last `max_seq_len` tokens.
pub fn generate_sequence<B: Backend>(
    model:    &CausalLm<B>,
    prompt:   &[u32],
    sampling: &SamplingConfig,
    eos_id:   u32,
    rng:      &mut StdRng,
    device:   &B::Device,
) -> SpinResult<Vec<u32>> {
    if prompt.is_empty() {
        return Err(SpinError::data("cannot generate from an empty prompt"));
    }
    let mut tokens = prompt.to_vec();
    let limit = prompt.len().saturating_add(sampling.max_new_tokens).min(sampling.max_length);

    while tokens.len() < limit {
        let start   = tokens.len().saturating_sub(model.max_seq_len);
        let context = &tokens[start..];
        let ids: Vec<i32> = context.iter().map(|&t| t as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device).unsqueeze::<2>();
        let mask  = Tensor::<B, 2, Int>::ones([1, context.len()], device);

        let mut logits: Vec<f32> = model
            .next_token_logits(input, mask)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| SpinError::Compute(format!("cannot read logits: {e:?}")))?;

        apply_repetition_penalty(&mut logits, &tokens, sampling.repetition_penalty);
        ban_repeated_ngrams(&mut logits, &tokens, sampling.no_repeat_ngram);
        let next = pick_token(&logits, sampling.temperature, sampling.top_p, rng)?;

        tokens.push(next);
        if next == eos_id {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::CausalLmConfig;
    use burn::backend::NdArray;
    use rand::SeedableRng;

    #[test]
    fn test_repetition_penalty_pushes_seen_tokens_down() {
        let mut logits = vec![2.0, -1.0, 3.0];
        apply_repetition_penalty(&mut logits, &[0, 1, 1], 2.0);
        assert_eq!(logits, vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_trigram_ban() {
        // history "5 6 7 5 6" → completing "5 6 7" again is forbidden
        let mut logits = vec![0.0; 10];
        ban_repeated_ngrams(&mut logits, &[5, 6, 7, 5, 6], 3);
        assert_eq!(logits[7], f32::NEG_INFINITY);
        assert_eq!(logits.iter().filter(|l| l.is_infinite()).count(), 1);
    }

    #[test]
    fn test_ngram_ban_disabled_for_zero() {
        let mut logits = vec![0.0; 4];
        ban_repeated_ngrams(&mut logits, &[1, 1, 1], 0);
        assert!(logits.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_top_p_keeps_smallest_covering_set() {
        let logits = vec![3.0, 2.9, -5.0, -6.0];
        let kept = nucleus(&logits, 1.0, 0.9);
        let ids: Vec<usize> = kept.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_zero_temperature_is_greedy() {
        let mut rng = StdRng::seed_from_u64(0);
        let token = pick_token(&[0.1, 4.0, f32::NEG_INFINITY, 3.9], 0.0, 1.0, &mut rng).unwrap();
        assert_eq!(token, 1);
    }

    #[test]
    fn test_all_banned_is_compute_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = pick_token(&[f32::NEG_INFINITY; 3], 0.7, 1.0, &mut rng);
        assert!(matches!(err, Err(SpinError::Compute(_))));
    }

    #[test]
    fn test_sampling_is_seeded() {
        let logits = vec![1.0, 1.1, 0.9, 1.05];
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20).map(|_| pick_token(&logits, 1.0, 1.0, &mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
    }

    #[test]
    fn test_generation_respects_limits() {
        let device = Default::default();
        let model  = CausalLmConfig::new(12, 8, 8, 2, 1, 16, 0.0).init::<NdArray>(&device);
        let mut rng = StdRng::seed_from_u64(1);

        let mut sampling = SamplingConfig::synthetic(6);
        sampling.max_new_tokens = 20;
        // EOS id outside the vocabulary so only the length limit stops decoding
        let out = generate_sequence(&model, &[2, 5], &sampling, 99, &mut rng, &device).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(&out[..2], &[2, 5]);
        assert!(out.iter().all(|&t| t < 12));
    }

    #[test]
    fn test_generation_slides_past_model_context() {
        let device = Default::default();
        let model  = CausalLmConfig::new(12, 4, 8, 2, 1, 16, 0.0).init::<NdArray>(&device);
        let mut rng = StdRng::seed_from_u64(1);
        let sampling = SamplingConfig::requirements(5);
        let out = generate_sequence(&model, &[2, 5, 6, 7, 8, 9], &sampling, 99, &mut rng, &device).unwrap();
        assert!(out.len() > 6 && out.len() <= 11);
    }
}
