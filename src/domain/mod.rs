// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that describe what the
// system works with: requirements documents, token batches,
// and the typed error taxonomy shared by every layer.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A requirements document loaded from disk
pub mod document;

// Token-id batches consumed by the training core
pub mod batch;

// Typed error taxonomy (config / data / resource / compute / extraction)
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
