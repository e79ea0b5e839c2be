// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw files on disk all the
// way to padded token-id batches for the training core.
//
// The pipeline flows in this order:
//
//   .json / .docx / .txt / .md
//       │
//       ▼
//   DocumentLoader        → reads files, extracts raw text
//       │
//       ▼
//   Preprocessor          → cleans text (ligatures, bullets, spacing)
//       │
//       ▼
//   Chunker               → splits long docs into overlapping windows
//       │
//       ▼
//   RequirementsProcessor → prompt/target pair → token ids + labels
//       │
//       ▼
//   split_train_eval      → seeded train/eval split
//       │
//       ▼
//   SpinDataset           → pads and collates samples into Batches
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Loads documents from a directory (JSON or extractable files)
pub mod loader;

/// Per-format text extraction (.docx, .txt, .md)
pub mod extractor;

/// Cleans and normalises raw extracted text
pub mod preprocessor;

/// Splits long documents into overlapping chunks
pub mod chunker;

/// Builds prompt/target training samples
pub mod processor;

/// Shuffles and splits samples into train/eval sets
pub mod splitter;

/// Collates samples into padded batches
pub mod dataset;
