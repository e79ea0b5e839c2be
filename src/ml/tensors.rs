// ============================================================
// Layer 5 — Batch → Tensor conversion
// ============================================================
// Flattens the row-major id matrices of a `Batch` and reshapes
// them into [rows, seq_len] Int tensors on the target device.

use burn::prelude::*;

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};

pub struct BatchTensors<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,
    pub labels:         Option<Tensor<B, 2, Int>>,
}

impl<B: Backend> BatchTensors<B> {
    /// Fails with a data error when the batch is malformed or longer
    /// than the model's position table.
    pub fn from_batch(batch: &Batch, max_seq_len: usize, device: &B::Device) -> SpinResult<Self> {
        batch.validate()?;
        if batch.seq_len() > max_seq_len {
            return Err(SpinError::data(format!(
                "batch length {} exceeds model context {}",
                batch.seq_len(),
                max_seq_len
            )));
        }
        Ok(Self {
            input_ids:      int_matrix(&batch.input_ids, device),
            attention_mask: int_matrix(&batch.attention_mask, device),
            labels:         batch.labels.as_ref().map(|l| int_matrix(l, device)),
        })
    }
}

pub fn int_matrix<B: Backend>(rows: &[Vec<u32>], device: &B::Device) -> Tensor<B, 2, Int> {
    let seq_len = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<i32> = rows.iter().flatten().map(|&x| x as i32).collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([rows.len(), seq_len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_shapes_follow_batch() {
        let batch = Batch::self_supervised(vec![vec![2, 5, 6], vec![2, 7]], 0).unwrap();
        let t = BatchTensors::<TestBackend>::from_batch(&batch, 8, &Default::default()).unwrap();
        assert_eq!(t.input_ids.dims(), [2, 3]);
        assert_eq!(t.attention_mask.dims(), [2, 3]);
        assert!(t.labels.is_some());

        let masked: i64 = t.attention_mask.sum().into_scalar().elem::<i64>();
        assert_eq!(masked, 5);
    }

    #[test]
    fn test_overlong_batch_rejected() {
        let batch = Batch::self_supervised(vec![vec![2; 10]], 0).unwrap();
        let err = BatchTensors::<TestBackend>::from_batch(&batch, 8, &Default::default()).err();
        assert!(matches!(err, Some(SpinError::Data(_))));
    }
}
