// ============================================================
// Layer 4 — Document Loader
// ============================================================
// Loads the training corpus from a directory. Two kinds of file
// are understood:
//
//   *.json               → { "text": ..., "metadata": { "type", "title" } }
//   .docx / .txt / .md   → text via data::extractor, title from the
//                          file stem, no document type
//
// Files are visited in name order so the corpus (and everything
// seeded downstream of it) is reproducible. Anything else in the
// directory is ignored; a file that fails to parse is logged and
// skipped rather than failing the whole load.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::extractor::{extract_text, is_supported};
use crate::domain::document::{DocumentMetadata, RequirementsDocument};
use crate::domain::traits::DocumentSource;

/// Loads every readable document from a directory.
/// Implements the DocumentSource trait from Layer 3.
pub struct DocumentLoader {
    dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentSource for DocumentLoader {
    fn load_all(&self) -> Result<Vec<RequirementsDocument>> {
        // A missing directory is an empty corpus; the caller decides
        // whether that is fatal.
        if !self.dir.exists() {
            tracing::warn!(
                "Data directory '{}' does not exist, returning empty corpus",
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut docs = Vec::new();
        for path in paths {
            let loaded = if has_extension(&path, "json") {
                load_json_document(&path).map(Some)
            } else if is_supported(&path) {
                load_extracted_document(&path).map(Some)
            } else {
                Ok(None)
            };

            match loaded {
                Ok(Some(doc)) => {
                    tracing::debug!("Loaded: {} ({} chars)", doc.source, doc.text.len());
                    docs.push(doc);
                }
                Ok(None) => tracing::debug!("Ignoring '{}'", path.display()),
                Err(e) => tracing::warn!("Skipping '{}': {e:#}", path.display()),
            }
        }

        tracing::info!("Successfully loaded {} documents", docs.len());
        Ok(docs)
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn load_json_document(path: &Path) -> Result<RequirementsDocument> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    let mut doc: RequirementsDocument = serde_json::from_str(&raw)
        .with_context(|| format!("'{}' is not a requirements document", path.display()))?;
    doc.source = file_name(path);
    Ok(doc)
}

fn load_extracted_document(path: &Path) -> Result<RequirementsDocument> {
    let text  = extract_text(path)?;
    let title = path.file_stem().and_then(|s| s.to_str()).map(String::from);
    Ok(RequirementsDocument::new(
        file_name(path),
        text,
        DocumentMetadata { kind: None, title },
    ))
}
