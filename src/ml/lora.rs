// ============================================================
// Layer 5 — LoRA Linear
// ============================================================
//   y = W x + (alpha / r) · B(A(dropout(x)))
//
//   W : frozen base weight        [d_in, d_out]
//   A : down projection           [d_in, r]      random init
//   B : up projection             [r, d_out]     zero init
//
// B starts at zero so an adapted model computes exactly the
// same function as its base until the first update.

use burn::{
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
};

#[derive(Module, Debug)]
pub struct LoraAdapter<B: Backend> {
    pub down:    Linear<B>,
    pub up:      Linear<B>,
    pub dropout: Dropout,
    pub rank:    usize,
    pub alpha:   usize,
}

impl<B: Backend> LoraAdapter<B> {
    pub fn new(
        d_in:    usize,
        d_out:   usize,
        rank:    usize,
        alpha:   usize,
        dropout: f64,
        device:  &B::Device,
    ) -> Self {
        let down = LinearConfig::new(d_in, rank).with_bias(false).init(device);
        let up   = LinearConfig::new(rank, d_out)
            .with_bias(false)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self {
            down,
            up,
            dropout: DropoutConfig::new(dropout).init(),
            rank,
            alpha,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.alpha as f64 / self.rank as f64
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let h = self.down.forward(self.dropout.forward(x));
        self.up.forward(h).mul_scalar(self.multiplier())
    }
}

#[derive(Module, Debug)]
pub struct LoraLinear<B: Backend> {
    pub base:    Linear<B>,
    pub adapter: Option<LoraAdapter<B>>,
}

impl<B: Backend> LoraLinear<B> {
    pub fn new(d_in: usize, d_out: usize, device: &B::Device) -> Self {
        Self { base: LinearConfig::new(d_in, d_out).init(device), adapter: None }
    }

    /// [d_in, d_out] of the base projection
    pub fn dims(&self) -> [usize; 2] {
        self.base.weight.val().dims()
    }

    /// Insert an adapter unless one is present. The base weights keep
    /// whatever gradient flag they already carry.
    pub fn attach_adapter(&mut self, rank: usize, alpha: usize, dropout: f64, device: &B::Device) {
        if self.adapter.is_none() {
            let [d_in, d_out] = self.dims();
            self.adapter = Some(LoraAdapter::new(d_in, d_out, rank, alpha, dropout, device));
        }
    }

    pub fn with_adapter(mut self, rank: usize, alpha: usize, dropout: f64, device: &B::Device) -> Self {
        self.attach_adapter(rank, alpha, dropout, device);
        self
    }

    pub fn adapter_params(&self) -> usize {
        self.adapter.as_ref().map(|a| a.num_params()).unwrap_or(0)
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match &self.adapter {
            Some(adapter) => self.base.forward(x.clone()) + adapter.forward(x),
            None => self.base.forward(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_fresh_adapter_preserves_base_output() {
        let device = Default::default();
        let plain  = LoraLinear::<TestBackend>::new(8, 6, &device);
        let x      = Tensor::<TestBackend, 2>::ones([3, 8], &device);

        let before  = plain.forward(x.clone());
        let adapted = plain.with_adapter(4, 8, 0.0, &device);
        let after   = adapted.forward(x);

        let diff: f32 = (before - after).abs().sum().into_scalar().elem::<f32>();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_adapter_param_count() {
        let device = Default::default();
        let layer  = LoraLinear::<TestBackend>::new(8, 6, &device);
        assert_eq!(layer.adapter_params(), 0);

        let layer = layer.with_adapter(2, 4, 0.0, &device);
        // down: 8×2, up: 2×6, no biases
        assert_eq!(layer.adapter_params(), 8 * 2 + 2 * 6);
        assert_eq!(layer.adapter.as_ref().map(|a| a.multiplier()), Some(2.0));
    }

    #[test]
    fn test_second_adapter_is_ignored() {
        let device = Default::default();
        let layer  = LoraLinear::<TestBackend>::new(8, 6, &device)
            .with_adapter(2, 4, 0.0, &device)
            .with_adapter(4, 4, 0.0, &device);
        assert_eq!(layer.adapter.as_ref().map(|a| a.rank), Some(2));
    }
}
