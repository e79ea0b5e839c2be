// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The collaborators the rest of the system is written against.
// The application layer only sees these traits, so a different
// document format or a different model backend is a new impl,
// not a change to the workflow.
//
// The training-side seam (Learner) lives next to the training
// core in src/spin/learner.rs.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::document::RequirementsDocument;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Any component that can load a training corpus.
///
/// Implementations:
///   - DocumentLoader → JSON documents plus extractable files in a directory
pub trait DocumentSource {
    fn load_all(&self) -> Result<Vec<RequirementsDocument>>;
}

// ─── TextExtractor ────────────────────────────────────────────────────────────
/// `extract_text(path) -> text`.
///
/// Fails with `SpinError::Extraction` when the file is not a valid
/// document of the expected format.
pub trait TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

// ─── RequirementsGenerator ────────────────────────────────────────────────────
/// `generate(text) -> markdown_document`.
///
/// Fails with `SpinError::MissingArtifact` when no trained model is
/// available; implementations check this before loading anything.
pub trait RequirementsGenerator {
    fn generate(&self, text: &str) -> Result<String>;
}
