use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, softmax},
};

use crate::ml::lora::LoraLinear;
use crate::spin::config::{AdapterConfig, ProjectionKind};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct CausalLmConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl CausalLmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CausalLm<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<DecoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_decoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head    = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        CausalLm {
            token_embedding, position_embedding, layers,
            final_norm, lm_head, dropout,
            max_seq_len: self.max_seq_len,
        }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let d_head = self.d_model / self.num_heads;
        let self_attn = CausalSelfAttention {
            q_proj:    LoraLinear::new(self.d_model, self.d_model, device),
            k_proj:    LoraLinear::new(self.d_model, self.d_model, device),
            v_proj:    LoraLinear::new(self.d_model, self.d_model, device),
            o_proj:    LoraLinear::new(self.d_model, self.d_model, device),
            dropout:   DropoutConfig::new(self.dropout).init(),
            num_heads: self.num_heads,
            d_head,
        };
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        DecoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.vocab_size > 0, "vocab_size must be positive");
        anyhow::ensure!(self.max_seq_len > 1, "max_seq_len must be at least 2");
        anyhow::ensure!(
            self.num_heads > 0 && self.d_model % self.num_heads == 0,
            "d_model ({}) must be divisible by num_heads ({})",
            self.d_model, self.num_heads
        );
        anyhow::ensure!((0.0..1.0).contains(&self.dropout), "dropout must be in [0, 1)");
        Ok(())
    }
}

// ─── Attention ────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CausalSelfAttention<B: Backend> {
    pub q_proj:    LoraLinear<B>,
    pub k_proj:    LoraLinear<B>,
    pub v_proj:    LoraLinear<B>,
    pub o_proj:    LoraLinear<B>,
    pub dropout:   Dropout,
    pub num_heads: usize,
    pub d_head:    usize,
}

impl<B: Backend> CausalSelfAttention<B> {
    /// x: [batch, seq, d_model], mask: [batch, seq, seq] (true = blocked)
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> Tensor<B, 3> {
        let [batch, seq, d_model] = x.dims();
        let split = |t: Tensor<B, 3>| {
            t.reshape([batch, seq, self.num_heads, self.d_head]).swap_dims(1, 2)
        };

        let q = split(self.q_proj.forward(x.clone()));
        let k = split(self.k_proj.forward(x.clone()));
        let v = split(self.v_proj.forward(x));

        // [batch, heads, seq, seq]
        let scores = q
            .matmul(k.transpose())
            .div_scalar((self.d_head as f64).sqrt());
        let mask = mask
            .unsqueeze_dim::<4>(1)
            .expand([batch, self.num_heads, seq, seq]);
        let weights = self.dropout.forward(softmax(scores.mask_fill(mask, -1.0e9), 3));

        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq, d_model]);
        self.o_proj.forward(context)
    }

    fn projection(&mut self, kind: ProjectionKind) -> &mut LoraLinear<B> {
        match kind {
            ProjectionKind::Query  => &mut self.q_proj,
            ProjectionKind::Key    => &mut self.k_proj,
            ProjectionKind::Value  => &mut self.v_proj,
            ProjectionKind::Output => &mut self.o_proj,
        }
    }

    fn projections(&self) -> [&LoraLinear<B>; 4] {
        [&self.q_proj, &self.k_proj, &self.v_proj, &self.o_proj]
    }
}

// ─── Decoder block ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   CausalSelfAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> Tensor<B, 3> {
        let attn_output = self.self_attn.forward(x.clone(), mask);
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

// ─── Causal LM ────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CausalLm<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<DecoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> CausalLm<B> {
    /// input_ids, attention_mask: [batch, seq] → logits: [batch, seq, vocab]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let tok_emb = self.token_embedding.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        // A key is blocked if it lies in the future or is padding
        let causal  = generate_autoregressive_mask::<B>(batch_size, seq_len, &device);
        let padding = attention_mask
            .equal_elem(0)
            .unsqueeze_dim::<3>(1)
            .expand([batch_size, seq_len, seq_len]);
        let mask = (causal.int() + padding.int()).greater_elem(0);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, mask.clone());
        }
        self.lm_head.forward(self.final_norm.forward(x))
    }

    /// Next-token cross entropy. Position t predicts labels[t + 1];
    /// label positions equal to `pad_id` are ignored.
    pub fn forward_loss(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        labels:         Tensor<B, 2, Int>,
        pad_id:         u32,
    ) -> Tensor<B, 1> {
        let [batch_size, seq_len] = input_ids.dims();
        let logits = self.forward(input_ids, attention_mask);
        let vocab  = logits.dims()[2];
        let steps  = seq_len - 1;

        let logits  = logits
            .slice([0..batch_size, 0..steps, 0..vocab])
            .reshape([batch_size * steps, vocab]);
        let targets = labels
            .slice([0..batch_size, 1..seq_len])
            .reshape([batch_size * steps]);

        CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![pad_id as usize]))
            .init(&logits.device())
            .forward(logits, targets)
    }

    /// Logits for the token following the last position: [batch, vocab]
    pub fn next_token_logits(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();
        let logits = self.forward(input_ids, attention_mask);
        let vocab  = logits.dims()[2];
        logits
            .slice([0..batch_size, seq_len - 1..seq_len, 0..vocab])
            .reshape([batch_size, vocab])
    }

    /// Freeze every current parameter and add LoRA adapters to the
    /// targeted attention projections of every layer.
    pub fn attach_adapters(self, cfg: &AdapterConfig, device: &B::Device) -> Self {
        let mut model = self.no_grad();
        for layer in model.layers.iter_mut() {
            for kind in ProjectionKind::ALL.into_iter().filter(|&k| cfg.targets(k)) {
                layer
                    .self_attn
                    .projection(kind)
                    .attach_adapter(cfg.rank, cfg.scale, cfg.dropout, device);
            }
        }
        model
    }

    pub fn has_adapters(&self) -> bool {
        self.layers
            .iter()
            .flat_map(|l| l.self_attn.projections())
            .any(|p| p.adapter.is_some())
    }

    pub fn adapter_params(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| l.self_attn.projections())
            .map(LoraLinear::adapter_params)
            .sum()
    }

    /// Parameters the optimiser may update
    pub fn trainable_params(&self) -> usize {
        if self.has_adapters() { self.adapter_params() } else { self.num_params() }
    }
}
