// ============================================================
// Layer 3 — Requirements Document Domain Type
// ============================================================
// A document loaded from disk: where it came from, its extracted
// text, and a little metadata (document type and title) that is
// folded into the training prompt.
//
// On disk a document is either a JSON file of the form
//   { "text": "...", "metadata": { "type": "...", "title": "..." } }
// or any file a TextExtractor understands (.docx, .txt, .md),
// in which case the metadata is derived from the file name.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// Document type that marks a file as an already structured
/// requirements document. Such documents are their own target.
pub const REQUIREMENTS_TYPE: &str = "requirements";

/// Free-form metadata attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document category, e.g. "requirements", "meeting-notes"
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Human readable title
    #[serde(default)]
    pub title: Option<String>,
}

impl DocumentMetadata {
    pub fn kind_or_unknown(&self) -> &str {
        self.kind.as_deref().unwrap_or("Unknown")
    }

    pub fn title_or_untitled(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    pub fn is_requirements(&self) -> bool {
        self.kind
            .as_deref()
            .map(|k| k.eq_ignore_ascii_case(REQUIREMENTS_TYPE))
            .unwrap_or(false)
    }
}

/// A document with its extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementsDocument {
    /// The filename the document was read from.
    /// Not part of the JSON payload, filled in by the loader.
    #[serde(skip)]
    pub source: String,

    /// The full extracted text before cleaning or tokenisation
    pub text: String,

    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl RequirementsDocument {
    pub fn new(
        source:   impl Into<String>,
        text:     impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
            metadata,
        }
    }
}
