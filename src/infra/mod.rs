// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs      — Model weights and side files
//                        CompactRecorder weights, burn Config
//                        model config, JSON train config,
//                        best.json and model_info.json; the
//                        precondition checks for "init-model
//                        before train" and "train before extract"
//
//   tokenizer_store.rs — Word-level tokenizer build/load and the
//                        TextCodec used for encode/decode
//
//   metrics.rs         — Per-iteration CSV log
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
