// ============================================================
// Layer 4 — Train/Evaluation Splitter
// ============================================================
// Shuffles samples with a seeded RNG and splits them into:
//   - Training set:   used to update the adapter weights
//   - Evaluation set: drives the best-checkpoint decision
//
// The evaluation set is mandatory for self-play training, so
// a split that would leave either side empty is rejected.
//
// Seeded shuffling means the same corpus and seed always give
// the same split, so eval losses of two runs are comparable.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::error::{SpinError, SpinResult};

pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Shuffle `samples` and split into (train, eval).
///
/// The split index is `round(len * train_fraction)`, clamped so
/// that both sides keep at least one sample.
pub fn split_train_eval<T>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    seed:           u64,
) -> SpinResult<(Vec<T>, Vec<T>)> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(SpinError::config(format!(
            "train fraction must be in (0, 1), got {train_fraction}"
        )));
    }
    let total = samples.len();
    if total < 2 {
        return Err(SpinError::config(format!(
            "need at least 2 samples for a train/eval split, got {total}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.clamp(1, total - 1);
    let eval     = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} evaluation",
        samples.len(),
        eval.len(),
    );

    Ok((samples, eval))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, eval) = split_train_eval(items, 0.8, 42).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(eval.len(), 20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, eval) = split_train_eval(items, 0.7, 1).unwrap();
        let mut all: Vec<usize> = train.into_iter().chain(eval).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_eval((0..30).collect::<Vec<usize>>(), 0.8, 7).unwrap();
        let b = split_train_eval((0..30).collect::<Vec<usize>>(), 0.8, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_corpus_keeps_one_eval_sample() {
        let (train, eval) = split_train_eval(vec![1, 2], 0.8, 0).unwrap();
        assert_eq!((train.len(), eval.len()), (1, 1));
    }

    #[test]
    fn test_too_few_samples_rejected() {
        assert!(matches!(split_train_eval(vec![1], 0.8, 0), Err(SpinError::Config(_))));
        assert!(split_train_eval(Vec::<u8>::new(), 0.8, 0).is_err());
    }

    #[test]
    fn test_fraction_bounds() {
        assert!(split_train_eval(vec![1, 2, 3], 1.0, 0).is_err());
        assert!(split_train_eval(vec![1, 2, 3], 0.0, 0).is_err());
    }
}
