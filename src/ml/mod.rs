// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn specific code lives here. The training core in
// `spin` talks to it only through the `Learner` trait.
//
//   lora.rs      — LoRA-capable linear projection
//                  frozen base Linear + optional low-rank
//                  adapter (down: d_in→r, up: r→d_out, zero init)
//
//   model.rs     — Decoder-only transformer (causal LM)
//                  token + position embeddings, causal
//                  self-attention with LoRA projections,
//                  GELU feed-forward, post-norm residuals,
//                  LM head over the vocabulary
//
//   tensors.rs   — Batch (plain token ids) → Burn tensors
//
//   sampling.rs  — Repetition penalty, n-gram ban, temperature
//                  and nucleus sampling, autoregressive decode
//
//   learner.rs   — BurnLearner: the `Learner` implementation
//                  (autodiff model + AdamW + gradient buffers)
//
//   generator.rs — Loads the best checkpoint and writes the
//                  generated requirements document
//
// Backends:
//   TrainBackend = Autodiff<Wgpu>  gradients during training
//   InferBackend = Wgpu            evaluation and generation
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Hu et al. (2021) LoRA

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type InferBackend = burn::backend::Wgpu;

/// Linear projection with an optional LoRA adapter
pub mod lora;

/// Causal transformer language model
pub mod model;

/// Batch → tensor conversion
pub mod tensors;

/// Token sampling and autoregressive generation
pub mod sampling;

/// Burn implementation of the training core's Learner
pub mod learner;

/// Requirements generation from the best checkpoint
pub mod generator;
