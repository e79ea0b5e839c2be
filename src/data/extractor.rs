// ============================================================
// Layer 4 — Text Extractors
// ============================================================
// extract_text(path) -> text, one implementation per format:
//
//   .docx        → DocxExtractor       (docx-rs)
//   .txt / .md   → PlainTextExtractor  (UTF-8)
//   anything else, PDF included → unsupported format
//
// How .docx files work:
//   A .docx file is a ZIP archive of XML parts. docx-rs parses
//   it into a typed tree:
//
//   Document
//     └── children: Vec<DocumentChild>
//           └── Paragraph
//                 └── children: Vec<ParagraphChild>
//                       └── Run
//                             └── children: Vec<RunChild>
//                                   └── Text (the actual words!)
//
// We walk this tree collecting all Text nodes, one line per
// non-empty paragraph.
//
// Reference: docx-rs crate documentation

use anyhow::Result;
use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};
use std::{fs, path::Path};

use crate::domain::error::SpinError;
use crate::domain::traits::TextExtractor;

fn extraction_error(path: &Path, reason: impl Into<String>) -> anyhow::Error {
    SpinError::Extraction { path: path.to_path_buf(), reason: reason.into() }.into()
}

// ─── DocxExtractor ────────────────────────────────────────────────────────────
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| extraction_error(path, e.to_string()))?;
        let docx  = read_docx(&bytes)
            .map_err(|e| extraction_error(path, format!("docx-rs parse error: {e:?}")))?;

        let paragraphs: Vec<String> = docx
            .document
            .children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
                _ => None,
            })
            .filter(|text| !text.trim().is_empty())
            .collect();

        Ok(paragraphs.join("\n"))
    }
}

/// Paragraph → Run → Text. Runs of one paragraph are parts of the
/// same sentence, so they are joined without a separator.
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut parts = Vec::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    parts.push(t.text.clone());
                }
            }
        }
    }
    parts.join("")
}

// ─── PlainTextExtractor ───────────────────────────────────────────────────────
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| extraction_error(path, e.to_string()))?;
        String::from_utf8(bytes).map_err(|_| extraction_error(path, "file is not valid UTF-8"))
    }
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────
/// The extractor for `path`'s extension, if the format is supported.
pub fn extractor_for(path: &Path) -> Option<Box<dyn TextExtractor>> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "docx"        => Some(Box::new(DocxExtractor)),
        "txt" | "md"  => Some(Box::new(PlainTextExtractor)),
        _ => None,
    }
}

pub fn is_supported(path: &Path) -> bool {
    extractor_for(path).is_some()
}

/// Extract text from any supported document.
pub fn extract_text(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(extraction_error(path, "file not found"));
    }
    let extractor = extractor_for(path).ok_or_else(|| {
        extraction_error(path, "unsupported format (expected .docx, .txt or .md)")
    })?;
    extractor.extract_text(path)
}
